//! Comment detection (§4.6): watches a task's comment thread for new,
//! non-bot comments and turns them into synthetic user messages so the
//! handler can react to mid-task human feedback.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use orc_context_store::CommentState;
use orc_domain::error::Result;
use orc_domain::task::TaskKey;
use orc_forge::{CommentRef, ForgeClient};

pub struct CommentDetectionManager {
    forge: Arc<dyn ForgeClient>,
    bot_username: String,
    known_ids: Mutex<HashSet<String>>,
}

impl CommentDetectionManager {
    pub fn new(forge: Arc<dyn ForgeClient>, bot_username: impl Into<String>) -> Self {
        Self {
            forge,
            bot_username: bot_username.into(),
            known_ids: Mutex::new(HashSet::new()),
        }
    }

    /// Seed the known-comment set from a resumed task's persisted state,
    /// so comments already seen before a pause are not re-surfaced.
    pub fn restore(forge: Arc<dyn ForgeClient>, bot_username: impl Into<String>, state: &CommentState) -> Self {
        Self {
            forge,
            bot_username: bot_username.into(),
            known_ids: Mutex::new(state.last_fetched_comment_ids.clone()),
        }
    }

    pub fn snapshot(&self) -> CommentState {
        CommentState {
            last_fetched_comment_ids: self.known_ids.lock().clone(),
            last_fetch_timestamp: Some(chrono::Utc::now()),
        }
    }

    /// Diff the forge's current comment list against the known-IDs set,
    /// excluding bot-authored comments, and return only the new ones.
    /// Updates the known-IDs set as a side effect.
    /// Render a detected comment for injection into the conversation
    /// (§4.6: "formatted for LLM consumption"). The marker lets the LLM
    /// (and anyone reading `current.jsonl`) tell a detected forge comment
    /// apart from the task's original prompt or its own prior turns.
    pub fn format_comment(comment: &CommentRef) -> String {
        format!(
            "[detected new comment from {}]: {}",
            comment.author, comment.body
        )
    }

    pub async fn poll_new_comments(&self, key: &TaskKey) -> Result<Vec<CommentRef>> {
        let comments = self.forge.list_comments(key).await?;
        let mut known = self.known_ids.lock();
        let mut fresh = Vec::new();
        for comment in comments {
            if known.contains(&comment.id) {
                continue;
            }
            known.insert(comment.id.clone());
            if comment.author == self.bot_username || comment.is_bot_guess {
                continue;
            }
            fresh.push(comment);
        }
        Ok(fresh)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKind};
    use orc_forge::MockForgeClient;

    fn key() -> TaskKey {
        TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1)
    }

    #[tokio::test]
    async fn poll_surfaces_only_new_non_bot_comments() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(), "t", "b", vec![], "alice");
        forge.inject_user_comment(&key(), "alice", "please add tests");
        let _bot_comment_id = forge.add_comment(&key(), "working on it").await.unwrap();

        let manager = CommentDetectionManager::new(forge.clone(), "coding-agent-bot");
        let fresh = manager.poll_new_comments(&key()).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].body, "please add tests");

        // Second poll with no new comments returns nothing.
        let fresh_again = manager.poll_new_comments(&key()).await.unwrap();
        assert!(fresh_again.is_empty());
    }

    #[tokio::test]
    async fn restore_seeds_known_ids_from_persisted_state() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(), "t", "b", vec![], "alice");
        forge.inject_user_comment(&key(), "alice", "already seen");

        let comments = forge.list_comments(&key()).await.unwrap();
        let mut seen = HashSet::new();
        seen.insert(comments[0].id.clone());
        let state = CommentState {
            last_fetched_comment_ids: seen,
            last_fetch_timestamp: None,
        };

        let manager = CommentDetectionManager::restore(forge.clone(), "coding-agent-bot", &state);
        let fresh = manager.poll_new_comments(&key()).await.unwrap();
        assert!(fresh.is_empty());
    }
}
