//! Task identity: stable encoding of a forge work-item reference across the
//! queue boundary (C1).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Github,
    Gitlab,
}

impl Platform {
    fn as_str(self) -> &'static str {
        match self {
            Platform::Github => "github",
            Platform::Gitlab => "gitlab",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "github" => Ok(Platform::Github),
            "gitlab" => Ok(Platform::Gitlab),
            other => Err(Error::Other(format!("unknown platform: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Issue,
    Pr,
    Mr,
}

impl TaskKind {
    fn as_str(self) -> &'static str {
        match self {
            TaskKind::Issue => "issue",
            TaskKind::Pr => "pr",
            TaskKind::Mr => "mr",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "issue" => Ok(TaskKind::Issue),
            "pr" => Ok(TaskKind::Pr),
            "mr" => Ok(TaskKind::Mr),
            other => Err(Error::Other(format!("unknown task kind: {other}"))),
        }
    }
}

/// A platform-tagged, discriminated reference to a forge work item.
///
/// Unique per forge object; round-trips to a string for use as a queue
/// payload field or a directory/log key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskKey {
    pub platform: Platform,
    pub kind: TaskKind,
    pub owner: String,
    pub repo_or_project: String,
    pub number: u64,
}

impl TaskKey {
    pub fn new(
        platform: Platform,
        kind: TaskKind,
        owner: impl Into<String>,
        repo_or_project: impl Into<String>,
        number: u64,
    ) -> Self {
        Self {
            platform,
            kind,
            owner: owner.into(),
            repo_or_project: repo_or_project.into(),
            number,
        }
    }

    /// Render as `platform:kind:owner/repo#number`, the canonical form used
    /// in logs and as a human-readable queue/forge correlation id.
    pub fn encode(&self) -> String {
        format!(
            "{}:{}:{}/{}#{}",
            self.platform.as_str(),
            self.kind.as_str(),
            self.owner,
            self.repo_or_project,
            self.number
        )
    }

    pub fn decode(s: &str) -> Result<Self> {
        let (platform, rest) = s
            .split_once(':')
            .ok_or_else(|| Error::Other(format!("malformed task key: {s}")))?;
        let (kind, rest) = rest
            .split_once(':')
            .ok_or_else(|| Error::Other(format!("malformed task key: {s}")))?;
        let (owner_repo, number) = rest
            .rsplit_once('#')
            .ok_or_else(|| Error::Other(format!("malformed task key: {s}")))?;
        let (owner, repo_or_project) = owner_repo
            .split_once('/')
            .ok_or_else(|| Error::Other(format!("malformed task key: {s}")))?;
        let number: u64 = number
            .parse()
            .map_err(|_| Error::Other(format!("malformed task key number: {s}")))?;
        Ok(TaskKey {
            platform: Platform::parse(platform)?,
            kind: TaskKind::parse(kind)?,
            owner: owner.to_string(),
            repo_or_project: repo_or_project.to_string(),
            number,
        })
    }
}

impl std::fmt::Display for TaskKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// Queue payload identifying a task plus resume hints. The `uuid` is minted
/// exactly once at first enqueue and persists across pause/resume cycles; it
/// is the sole source of identity once the descriptor reaches a consumer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub task_key: TaskKey,
    pub uuid: Uuid,
    pub user: String,
    #[serde(default)]
    pub is_resumed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paused_context_path: Option<String>,
}

impl TaskDescriptor {
    pub fn fresh(task_key: TaskKey, user: impl Into<String>) -> Self {
        Self {
            task_key,
            uuid: Uuid::new_v4(),
            user: user.into(),
            is_resumed: false,
            paused_context_path: None,
        }
    }

    pub fn resumed(task_key: TaskKey, uuid: Uuid, user: impl Into<String>, paused_context_path: impl Into<String>) -> Self {
        Self {
            task_key,
            uuid,
            user: user.into(),
            is_resumed: true,
            paused_context_path: Some(paused_context_path.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_key_roundtrips_through_encode_decode() {
        let key = TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 101);
        let encoded = key.encode();
        assert_eq!(encoded, "github:issue:acme/widgets#101");
        assert_eq!(TaskKey::decode(&encoded).unwrap(), key);
    }

    #[test]
    fn task_key_decode_rejects_malformed_input() {
        assert!(TaskKey::decode("not-a-task-key").is_err());
        assert!(TaskKey::decode("github:issue:acme/widgets#notanumber").is_err());
    }

    #[test]
    fn task_descriptor_serde_roundtrip_preserves_uuid() {
        let key = TaskKey::new(Platform::Gitlab, TaskKind::Mr, "acme", "widgets", 7);
        let desc = TaskDescriptor::fresh(key, "alice");
        let json = serde_json::to_string(&desc).unwrap();
        let back: TaskDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, desc);
    }

    #[test]
    fn resumed_descriptor_carries_paused_context_path() {
        let key = TaskKey::new(Platform::Github, TaskKind::Pr, "acme", "widgets", 9);
        let uuid = Uuid::new_v4();
        let desc = TaskDescriptor::resumed(key, uuid, "bob", "paused/abc");
        assert!(desc.is_resumed);
        assert_eq!(desc.paused_context_path.as_deref(), Some("paused/abc"));
        assert_eq!(desc.uuid, uuid);
    }
}
