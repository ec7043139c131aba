//! `metadata.json` — immutable task metadata written once at task creation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orc_domain::error::Result;
use orc_domain::task::TaskKey;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    pub task_key: TaskKey,
    pub uuid: Uuid,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub process_id: u32,
    pub hostname: String,
    pub model: String,
    pub provider: String,
    pub context_length: u32,
    pub creator: String,
}

impl Metadata {
    pub fn new(
        task_key: TaskKey,
        uuid: Uuid,
        provider: impl Into<String>,
        model: impl Into<String>,
        context_length: u32,
        creator: impl Into<String>,
    ) -> Self {
        Self {
            task_key,
            uuid,
            created_at: chrono::Utc::now(),
            process_id: std::process::id(),
            hostname: hostname(),
            model: model.into(),
            provider: provider.into(),
            context_length,
            creator: creator.into(),
        }
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join("metadata.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join("metadata.json");
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown-host".into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKind};

    #[test]
    fn metadata_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let key = TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1);
        let meta = Metadata::new(key, Uuid::new_v4(), "anthropic", "claude-sonnet-4-20250514", 200_000, "alice");
        meta.write(dir.path()).unwrap();
        let read_back = Metadata::read(dir.path()).unwrap();
        assert_eq!(read_back.uuid, meta.uuid);
        assert_eq!(read_back.creator, "alice");
    }
}
