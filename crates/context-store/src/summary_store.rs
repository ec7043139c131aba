//! Compression history (`summaries.jsonl`): one line per summarization
//! event. Append-only; the pre-compression content it records remains the
//! audit trail after `MessageStore::rewrite_after_compression` replaces
//! `current.jsonl`.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orc_domain::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub id: Uuid,
    pub start_seq: i64,
    pub end_seq: i64,
    pub summary: String,
    pub original_tokens: u32,
    pub summary_tokens: u32,
    pub ratio: f64,
    pub timestamp: chrono::DateTime<Utc>,
}

pub struct SummaryStore {
    path: PathBuf,
}

impl SummaryStore {
    pub fn open(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("summaries.jsonl"),
        }
    }

    pub fn append(
        &self,
        start_seq: i64,
        end_seq: i64,
        summary: &str,
        original_tokens: u32,
        summary_tokens: u32,
    ) -> Result<SummaryRecord> {
        let ratio = if original_tokens == 0 {
            0.0
        } else {
            summary_tokens as f64 / original_tokens as f64
        };
        let record = SummaryRecord {
            id: Uuid::new_v4(),
            start_seq,
            end_seq,
            summary: summary.to_string(),
            original_tokens,
            summary_tokens,
            ratio,
            timestamp: Utc::now(),
        };
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(&record)?)?;
        file.sync_data()?;
        Ok(record)
    }

    pub fn get_latest(&self) -> Result<Option<SummaryRecord>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut last = None;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            last = Some(line);
        }
        match last {
            Some(line) => Ok(Some(serde_json::from_str(&line)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_latest_returns_last_appended_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = SummaryStore::open(dir.path());
        store.append(1, 10, "first summary", 800, 100).unwrap();
        store.append(11, 20, "second summary", 900, 120).unwrap();

        let latest = store.get_latest().unwrap().unwrap();
        assert_eq!(latest.summary, "second summary");
        assert_eq!(latest.start_seq, 11);
    }

    #[test]
    fn get_latest_on_empty_store_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SummaryStore::open(dir.path());
        assert!(store.get_latest().unwrap().is_none());
    }
}
