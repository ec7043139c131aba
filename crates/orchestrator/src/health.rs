//! Liveness files (§5): `healthcheck/{producer,consumer}.health`, mtime-
//! updated once per outer-loop iteration, consulted by orchestration
//! external to this process to detect a stalled or dead loop.

use std::path::Path;

use orc_domain::error::Result;

/// Touch (create-or-update-mtime) the health file at `path`.
pub fn touch_health_file(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let now = chrono::Utc::now().to_rfc3339();
    std::fs::write(path, now)?;
    Ok(())
}
