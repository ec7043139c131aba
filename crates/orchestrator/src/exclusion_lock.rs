//! Single-producer file lock (§5 shared-resource policy): held for the
//! duration of one `run_once()`, released on exit or crash. `fs2`-backed,
//! exclusive and non-blocking — a producer that cannot acquire it exits
//! immediately rather than waiting.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use orc_domain::error::{Error, Result};

/// Holds an exclusive, non-blocking lock on a file for as long as it lives.
/// Dropping it releases the lock (also happens implicitly on process exit
/// or crash, since the OS reclaims file locks from a dead process).
pub struct ExclusionLock {
    file: File,
    path: PathBuf,
}

impl ExclusionLock {
    /// Attempt to acquire the lock at `path`, creating the file if absent.
    /// Returns `Ok(None)` (not an error) if another producer already holds
    /// it — the caller's `run_once()` should exit cleanly in that case.
    pub fn try_acquire(path: impl Into<PathBuf>) -> Result<Option<Self>> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        #[cfg(unix)]
        let file = {
            use std::os::unix::fs::OpenOptionsExt;
            OpenOptions::new()
                .write(true)
                .create(true)
                .mode(0o600)
                .open(&path)?
        };
        #[cfg(not(unix))]
        let file = OpenOptions::new().write(true).create(true).open(&path)?;

        match fs2::FileExt::try_lock_exclusive(&file) {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::Other(format!("exclusion lock at {}: {e}", path.display()))),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ExclusionLock {
    fn drop(&mut self) {
        let _ = fs2::FileExt::unlock(&self.file);
    }
}
