//! Planning mode history (`planning/{uuid}.jsonl`, §4.9): one line per
//! `plan`/`revision`/`reflection` event, append-only. The Planning
//! coordinator recovers `current_plan` and its position in
//! `execution_order` by reading the latest `plan`/`revision` line back out
//! on task start.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use orc_domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanningEventKind {
    Plan,
    Revision,
    Reflection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningEvent {
    #[serde(rename = "type")]
    pub kind: PlanningEventKind,
    pub timestamp: chrono::DateTime<Utc>,
    pub payload: Value,
}

/// Append-only store rooted at `<context_dir>/planning/{uuid}.jsonl`.
pub struct PlanningStore {
    path: PathBuf,
}

impl PlanningStore {
    pub fn open(dir: impl Into<PathBuf>, uuid: uuid::Uuid) -> Result<Self> {
        let dir = dir.into().join("planning");
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            path: dir.join(format!("{uuid}.jsonl")),
        })
    }

    pub fn append(&self, kind: PlanningEventKind, payload: Value) -> Result<()> {
        let record = PlanningEvent {
            kind,
            timestamp: Utc::now(),
            payload,
        };
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        file.sync_data()?;
        Ok(())
    }

    pub fn read_all(&self) -> Result<Vec<PlanningEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            out.push(serde_json::from_str(&line)?);
        }
        Ok(out)
    }

    /// The most recent `plan` or `revision` event, whichever is later in
    /// the log — the current authoritative plan to resume execution
    /// against.
    pub fn latest_plan(&self) -> Result<Option<PlanningEvent>> {
        let events = self.read_all()?;
        Ok(events
            .into_iter()
            .rev()
            .find(|e| matches!(e.kind, PlanningEventKind::Plan | PlanningEventKind::Revision)))
    }

    /// Count of `revision` events recorded so far, used to enforce
    /// `max_revisions + 1` total plan entries (§8).
    pub fn revision_count(&self) -> Result<usize> {
        Ok(self
            .read_all()?
            .iter()
            .filter(|e| matches!(e.kind, PlanningEventKind::Revision))
            .count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_and_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let uuid = uuid::Uuid::new_v4();
        let store = PlanningStore::open(dir.path(), uuid).unwrap();
        store.append(PlanningEventKind::Plan, serde_json::json!({"goal": "x"})).unwrap();
        store
            .append(PlanningEventKind::Reflection, serde_json::json!({"status": "success"}))
            .unwrap();

        let events = store.read_all().unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0].kind, PlanningEventKind::Plan));
    }

    #[test]
    fn latest_plan_skips_reflections() {
        let dir = tempfile::tempdir().unwrap();
        let uuid = uuid::Uuid::new_v4();
        let store = PlanningStore::open(dir.path(), uuid).unwrap();
        store.append(PlanningEventKind::Plan, serde_json::json!({"v": 1})).unwrap();
        store
            .append(PlanningEventKind::Reflection, serde_json::json!({"status": "partial"}))
            .unwrap();
        store
            .append(PlanningEventKind::Revision, serde_json::json!({"v": 2}))
            .unwrap();

        let latest = store.latest_plan().unwrap().unwrap();
        assert_eq!(latest.payload["v"], 2);
        assert_eq!(store.revision_count().unwrap(), 1);
    }

    #[test]
    fn empty_store_has_no_latest_plan() {
        let dir = tempfile::tempdir().unwrap();
        let store = PlanningStore::open(dir.path(), uuid::Uuid::new_v4()).unwrap();
        assert!(store.latest_plan().unwrap().is_none());
    }
}
