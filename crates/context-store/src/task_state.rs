//! `task_state.json` — present only under `paused/`: pause metadata plus
//! whatever Planning and comment-detection state must survive a pause to
//! keep a resumed task identical to the pre-pause one.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use orc_domain::error::Result;
use orc_domain::task::TaskKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PausedStatus {
    Paused,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningState {
    pub current_phase: String,
    pub action_counter: usize,
    pub revision_counter: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checklist_comment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CommentState {
    pub last_fetched_comment_ids: HashSet<String>,
    #[serde(default)]
    pub last_fetch_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskState {
    pub task_key: TaskKey,
    pub uuid: Uuid,
    pub user: String,
    pub paused_at: DateTime<Utc>,
    pub status: PausedStatus,
    pub resume_count: u32,
    pub context_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planning_state: Option<PlanningState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment_state: Option<CommentState>,
}

impl TaskState {
    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join("task_state.json");
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join("task_state.json");
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn exists(dir: &Path) -> bool {
        dir.join("task_state.json").exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKind};

    #[test]
    fn task_state_round_trips_with_planning_and_comment_state() {
        let dir = tempfile::tempdir().unwrap();
        let key = TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1);
        let mut ids = HashSet::new();
        ids.insert("c1".to_string());

        let state = TaskState {
            task_key: key,
            uuid: Uuid::new_v4(),
            user: "alice".into(),
            paused_at: Utc::now(),
            status: PausedStatus::Paused,
            resume_count: 0,
            context_path: "paused/abc".into(),
            planning_state: Some(PlanningState {
                current_phase: "Execution".into(),
                action_counter: 3,
                revision_counter: 0,
                checklist_comment_id: Some("comment-1".into()),
            }),
            comment_state: Some(CommentState {
                last_fetched_comment_ids: ids,
                last_fetch_timestamp: Some(Utc::now()),
            }),
        };

        state.write(dir.path()).unwrap();
        assert!(TaskState::exists(dir.path()));
        let back = TaskState::read(dir.path()).unwrap();
        assert_eq!(back.resume_count, 0);
        assert_eq!(back.planning_state.unwrap().action_counter, 3);
    }
}
