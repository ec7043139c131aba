//! The `ForgeClient` capability boundary (§6.3): the set of operations the
//! core requires from a code-forge platform. Implementations are opaque to
//! the core — no transactional guarantees across calls are assumed.

use orc_domain::error::Result;
use orc_domain::task::TaskKey;

/// A comment on a forge object, platform-normalized.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CommentRef {
    pub id: String,
    pub author: String,
    pub body: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Best-effort guess of whether the comment was authored by the bot
    /// account itself (used to exclude self-authored comments from
    /// comment-detection).
    pub is_bot_guess: bool,
}

/// The full detail view of a forge work item, as fetched on dequeue.
#[derive(Debug, Clone)]
pub struct TaskDetails {
    pub title: String,
    pub body: String,
    pub labels: Vec<String>,
    pub assignees: Vec<String>,
    pub creator: String,
    pub existing_comments: Vec<CommentRef>,
}

#[async_trait::async_trait]
pub trait ForgeClient: Send + Sync {
    /// Enumerate candidate work items matching a saved label/search query.
    async fn list_tasks(&self, query: &str) -> Result<Vec<TaskKey>>;

    /// Fetch the full detail view of one work item.
    async fn get_task(&self, key: &TaskKey) -> Result<TaskDetails>;

    async fn add_label(&self, key: &TaskKey, label: &str) -> Result<()>;
    async fn remove_label(&self, key: &TaskKey, label: &str) -> Result<()>;
    async fn set_labels(&self, key: &TaskKey, labels: &[String]) -> Result<()>;

    async fn list_comments(&self, key: &TaskKey) -> Result<Vec<CommentRef>>;
    async fn add_comment(&self, key: &TaskKey, body: &str) -> Result<String>;
    async fn update_comment(&self, key: &TaskKey, comment_id: &str, body: &str) -> Result<()>;

    async fn get_assignees(&self, key: &TaskKey) -> Result<Vec<String>>;

    /// Optional capability (§4.8 step 1): attempt to open a draft PR/MR for
    /// an issue. Returns the new object's key on success, `Ok(None)` if the
    /// forge declines or doesn't support the conversion. Most `ForgeClient`
    /// implementations never need to override this default.
    async fn open_draft_pr(&self, _key: &TaskKey, _title: &str, _body: &str) -> Result<Option<TaskKey>> {
        Ok(None)
    }
}
