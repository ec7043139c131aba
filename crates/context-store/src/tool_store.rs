//! Tool-call audit log (`tools.jsonl`): append-only, no read-side API
//! beyond audit — the handler never replays it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use orc_domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolCallStatus {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub seq: i64,
    pub tool: String,
    pub args: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub status: ToolCallStatus,
    pub duration_ms: u64,
    pub timestamp: chrono::DateTime<Utc>,
}

pub struct ToolStore {
    path: PathBuf,
}

impl ToolStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("tools.jsonl"),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn append(
        &self,
        seq: i64,
        tool: &str,
        args: Value,
        result: Option<Value>,
        error: Option<String>,
        status: ToolCallStatus,
        duration_ms: u64,
    ) -> Result<()> {
        let record = ToolCallRecord {
            seq,
            tool: tool.to_string(),
            args,
            result,
            error,
            status,
            duration_ms,
            timestamp: Utc::now(),
        };
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        file.sync_data()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_writes_one_line_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let store = ToolStore::open(dir.path());
        store
            .append(
                1,
                "read_file",
                serde_json::json!({"path": "a.rs"}),
                Some(serde_json::json!("contents")),
                None,
                ToolCallStatus::Success,
                12,
            )
            .unwrap();
        store
            .append(
                2,
                "read_file",
                serde_json::json!({"path": "missing.rs"}),
                None,
                Some("not found".into()),
                ToolCallStatus::Error,
                3,
            )
            .unwrap();
        let contents = std::fs::read_to_string(dir.path().join("tools.jsonl")).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
