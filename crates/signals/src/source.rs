//! [`SignalSource`] abstracts "is a pause signal present" behind a trait so
//! tests can substitute an in-memory flag instead of touching the
//! filesystem (§9 redesign flag).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait SignalSource: Send + Sync {
    /// True if the signal is currently asserted. Called at every checkpoint;
    /// must be cheap and non-blocking.
    fn is_present(&self) -> bool;
}

/// Presence of a file on disk is the signal. The file is never created or
/// deleted by the manager that reads it — only an operator or a fleetwide
/// command toggles it.
pub struct FileSignalSource {
    path: PathBuf,
}

impl FileSignalSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SignalSource for FileSignalSource {
    fn is_present(&self) -> bool {
        self.path.exists()
    }
}

/// In-memory flag, for tests and for in-process fleetwide toggles.
#[derive(Clone, Default)]
pub struct InMemorySignalSource {
    flag: Arc<AtomicBool>,
}

impl InMemorySignalSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, value: bool) {
        self.flag.store(value, Ordering::SeqCst);
    }
}

impl SignalSource for InMemorySignalSource {
    fn is_present(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_signal_source_reflects_filesystem_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pause_signal");
        let source = FileSignalSource::new(&path);
        assert!(!source.is_present());
        std::fs::write(&path, b"").unwrap();
        assert!(source.is_present());
    }

    #[test]
    fn in_memory_signal_source_toggles() {
        let source = InMemorySignalSource::new();
        assert!(!source.is_present());
        source.set(true);
        assert!(source.is_present());
        source.set(false);
        assert!(!source.is_present());
    }
}
