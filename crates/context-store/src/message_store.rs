//! The LLM-facing conversation log (`current.jsonl`) and its compression
//! rewrite. One JSON object per line, append-only except when rewritten on
//! compression (§4.4).

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use orc_domain::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
    Tool,
    Summary,
}

/// One line of `current.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub seq: i64,
    pub role: MessageRole,
    pub content: String,
    pub tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

/// Estimate token count as `ceil(len(content) / 4)`, per §4.4.
pub fn estimate_tokens(content: &str) -> u32 {
    ((content.len() as u64 + 3) / 4) as u32
}

/// Append-oriented view over one task's `current.jsonl`.
///
/// The store holds no in-memory conversation buffer — its only state is
/// `next_seq`, a cache of the next sequence number to assign, kept in sync
/// with the file on disk. This lets the LLM client capability be crash-safe
/// on resume.
pub struct MessageStore {
    dir: PathBuf,
    next_seq: AtomicI64,
}

impl MessageStore {
    /// Open (and, if absent, create) the store rooted at `dir`, which is
    /// the task's context directory (e.g. `running/<uuid>/`). Scans any
    /// existing `current.jsonl` to recover the next sequence number.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let next_seq = Self::scan_next_seq(&dir)?;
        Ok(Self {
            dir,
            next_seq: AtomicI64::new(next_seq),
        })
    }

    pub fn current_file_path(&self) -> PathBuf {
        self.dir.join("current.jsonl")
    }

    fn scan_next_seq(dir: &Path) -> Result<i64> {
        let path = dir.join("current.jsonl");
        if !path.exists() {
            return Ok(1);
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut max_seq = 0i64;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record: MessageRecord = serde_json::from_str(&line)?;
            max_seq = max_seq.max(record.seq);
        }
        Ok(max_seq + 1)
    }

    /// Append one message, returning its assigned `seq`.
    pub fn append(
        &self,
        role: MessageRole,
        content: &str,
        tool_name: Option<&str>,
    ) -> Result<i64> {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let record = MessageRecord {
            seq,
            role,
            content: content.to_string(),
            tokens: estimate_tokens(content),
            tool_name: tool_name.map(String::from),
            timestamp: Utc::now(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.current_file_path())?;
        let line = serde_json::to_string(&record)?;
        writeln!(file, "{line}")?;
        file.sync_data()?;
        Ok(seq)
    }

    /// Read every record currently in `current.jsonl`, in order.
    pub fn read_all(&self) -> Result<Vec<MessageRecord>> {
        let path = self.current_file_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(path)?;
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

    /// Sum the `tokens` field across every line in `current.jsonl`.
    pub fn current_token_count(&self) -> Result<u64> {
        Ok(self.read_all()?.iter().map(|r| r.tokens as u64).sum())
    }

    /// Atomically replace `current.jsonl` with a `role:summary, seq:0`
    /// record followed by the retained tail, via write-temp-then-rename.
    pub fn rewrite_after_compression(
        &self,
        summary_text: &str,
        summary_tokens: u32,
        retained_tail: &[MessageRecord],
    ) -> Result<()> {
        let tmp_path = self.dir.join("current.jsonl.tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            let summary_record = MessageRecord {
                seq: 0,
                role: MessageRole::Summary,
                content: summary_text.to_string(),
                tokens: summary_tokens,
                tool_name: None,
                timestamp: Utc::now(),
            };
            writeln!(tmp, "{}", serde_json::to_string(&summary_record)?)?;
            for record in retained_tail {
                writeln!(tmp, "{}", serde_json::to_string(record)?)?;
            }
            tmp.sync_data()?;
        }
        std::fs::rename(&tmp_path, self.current_file_path())?;

        let next_seq = retained_tail.iter().map(|r| r.seq).max().unwrap_or(0) + 1;
        self.next_seq.store(next_seq.max(1), Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_assigns_dense_increasing_seq() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        let s1 = store.append(MessageRole::System, "be concise", None).unwrap();
        let s2 = store.append(MessageRole::User, "hello", None).unwrap();
        assert_eq!(s1, 1);
        assert_eq!(s2, 2);
    }

    #[test]
    fn current_token_count_sums_estimated_tokens() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        store.append(MessageRole::User, "abcd", None).unwrap(); // 1 token
        store.append(MessageRole::User, "abcdefgh", None).unwrap(); // 2 tokens
        assert_eq!(store.current_token_count().unwrap(), 3);
    }

    #[test]
    fn reopening_recovers_next_seq() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = MessageStore::open(dir.path()).unwrap();
            store.append(MessageRole::User, "one", None).unwrap();
            store.append(MessageRole::User, "two", None).unwrap();
        }
        let reopened = MessageStore::open(dir.path()).unwrap();
        let seq = reopened.append(MessageRole::User, "three", None).unwrap();
        assert_eq!(seq, 3);
    }

    #[test]
    fn rewrite_after_compression_starts_with_summary_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = MessageStore::open(dir.path()).unwrap();
        store.append(MessageRole::User, "one", None).unwrap();
        store.append(MessageRole::Assistant, "two", None).unwrap();
        store.append(MessageRole::User, "three", None).unwrap();

        let tail = vec![store.read_all().unwrap().pop().unwrap()];
        store.rewrite_after_compression("summary text", 5, &tail).unwrap();

        let records = store.read_all().unwrap();
        assert_eq!(records[0].seq, 0);
        assert!(matches!(records[0].role, MessageRole::Summary));
        assert_eq!(records.len(), 2);

        let next_seq = store.append(MessageRole::User, "four", None).unwrap();
        assert!(next_seq > records[1].seq);
    }
}
