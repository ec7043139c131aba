//! In-memory `ForgeClient` used by tests and local development. Models
//! enough of a real forge's behavior (labels, comments, assignees) to drive
//! the producer/consumer and signal-manager test suites without a network.

use std::collections::HashMap;

use parking_lot::Mutex;

use orc_domain::error::{Error, Result};
use orc_domain::task::TaskKey;

use crate::client::{CommentRef, ForgeClient, TaskDetails};

struct MockTask {
    title: String,
    body: String,
    labels: Vec<String>,
    assignees: Vec<String>,
    creator: String,
    comments: Vec<CommentRef>,
}

#[derive(Default)]
pub struct MockForgeClient {
    tasks: Mutex<HashMap<TaskKey, MockTask>>,
    next_comment_id: Mutex<u64>,
    /// Configured response for `open_draft_pr`; `None` (the default) means
    /// the mock behaves like a forge that doesn't support conversion, same
    /// as the trait's own default.
    draft_pr_result: Mutex<Option<TaskKey>>,
}

impl MockForgeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_task(
        &self,
        key: TaskKey,
        title: impl Into<String>,
        body: impl Into<String>,
        labels: Vec<String>,
        creator: impl Into<String>,
    ) {
        self.tasks.lock().insert(
            key,
            MockTask {
                title: title.into(),
                body: body.into(),
                labels,
                assignees: Vec::new(),
                creator: creator.into(),
                comments: Vec::new(),
            },
        );
    }

    pub fn set_assignees(&self, key: &TaskKey, assignees: Vec<String>) {
        if let Some(task) = self.tasks.lock().get_mut(key) {
            task.assignees = assignees;
        }
    }

    /// Configure `open_draft_pr` to succeed and hand back `new_key` for any
    /// future call. Leave unconfigured (the default) to exercise the
    /// "conversion unsupported/declined" path.
    pub fn set_open_draft_pr_result(&self, new_key: Option<TaskKey>) {
        *self.draft_pr_result.lock() = new_key;
    }

    /// Append a comment as if posted by an outside user (not the bot).
    pub fn inject_user_comment(&self, key: &TaskKey, author: &str, body: &str) {
        let id = {
            let mut counter = self.next_comment_id.lock();
            *counter += 1;
            counter.to_string()
        };
        if let Some(task) = self.tasks.lock().get_mut(key) {
            task.comments.push(CommentRef {
                id,
                author: author.to_string(),
                body: body.to_string(),
                created_at: chrono::Utc::now(),
                is_bot_guess: false,
            });
        }
    }
}

#[async_trait::async_trait]
impl ForgeClient for MockForgeClient {
    async fn list_tasks(&self, query: &str) -> Result<Vec<TaskKey>> {
        let tasks = self.tasks.lock();
        Ok(tasks
            .iter()
            .filter(|(_, t)| t.labels.iter().any(|l| l == query))
            .map(|(k, _)| k.clone())
            .collect())
    }

    async fn get_task(&self, key: &TaskKey) -> Result<TaskDetails> {
        let tasks = self.tasks.lock();
        let task = tasks
            .get(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        Ok(TaskDetails {
            title: task.title.clone(),
            body: task.body.clone(),
            labels: task.labels.clone(),
            assignees: task.assignees.clone(),
            creator: task.creator.clone(),
            existing_comments: task.comments.clone(),
        })
    }

    async fn add_label(&self, key: &TaskKey, label: &str) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        if !task.labels.iter().any(|l| l == label) {
            task.labels.push(label.to_string());
        }
        Ok(())
    }

    async fn remove_label(&self, key: &TaskKey, label: &str) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        task.labels.retain(|l| l != label);
        Ok(())
    }

    async fn set_labels(&self, key: &TaskKey, labels: &[String]) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        task.labels = labels.to_vec();
        Ok(())
    }

    async fn list_comments(&self, key: &TaskKey) -> Result<Vec<CommentRef>> {
        let tasks = self.tasks.lock();
        let task = tasks
            .get(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        Ok(task.comments.clone())
    }

    async fn add_comment(&self, key: &TaskKey, body: &str) -> Result<String> {
        let id = {
            let mut counter = self.next_comment_id.lock();
            *counter += 1;
            counter.to_string()
        };
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        task.comments.push(CommentRef {
            id: id.clone(),
            author: "coding-agent-bot".into(),
            body: body.to_string(),
            created_at: chrono::Utc::now(),
            is_bot_guess: true,
        });
        Ok(id)
    }

    async fn update_comment(&self, key: &TaskKey, comment_id: &str, body: &str) -> Result<()> {
        let mut tasks = self.tasks.lock();
        let task = tasks
            .get_mut(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        let comment = task
            .comments
            .iter_mut()
            .find(|c| c.id == comment_id)
            .ok_or_else(|| Error::Forge(format!("unknown comment: {comment_id}")))?;
        comment.body = body.to_string();
        Ok(())
    }

    async fn get_assignees(&self, key: &TaskKey) -> Result<Vec<String>> {
        let tasks = self.tasks.lock();
        let task = tasks
            .get(key)
            .ok_or_else(|| Error::Forge(format!("unknown task: {key}")))?;
        Ok(task.assignees.clone())
    }

    async fn open_draft_pr(&self, key: &TaskKey, title: &str, body: &str) -> Result<Option<TaskKey>> {
        let configured = self.draft_pr_result.lock().clone();
        if let Some(new_key) = configured.clone() {
            let mut tasks = self.tasks.lock();
            let creator = tasks.get(key).map(|t| t.creator.clone()).unwrap_or_default();
            tasks.insert(
                new_key,
                MockTask {
                    title: title.to_string(),
                    body: body.to_string(),
                    labels: Vec::new(),
                    assignees: Vec::new(),
                    creator,
                    comments: Vec::new(),
                },
            );
        }
        Ok(configured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKind};

    fn key() -> TaskKey {
        TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1)
    }

    #[tokio::test]
    async fn list_tasks_filters_by_label() {
        let mock = MockForgeClient::new();
        mock.seed_task(key(), "t", "b", vec!["coding agent".into()], "alice");
        let found = mock.list_tasks("coding agent").await.unwrap();
        assert_eq!(found, vec![key()]);
        let not_found = mock.list_tasks("other").await.unwrap();
        assert!(not_found.is_empty());
    }

    #[tokio::test]
    async fn comments_round_trip() {
        let mock = MockForgeClient::new();
        mock.seed_task(key(), "t", "b", vec![], "alice");
        let id = mock.add_comment(&key(), "hello").await.unwrap();
        mock.update_comment(&key(), &id, "hello edited").await.unwrap();
        let comments = mock.list_comments(&key()).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].body, "hello edited");
    }

    #[tokio::test]
    async fn open_draft_pr_declines_unless_configured() {
        let mock = MockForgeClient::new();
        mock.seed_task(key(), "t", "b", vec![], "alice");
        let result = mock.open_draft_pr(&key(), "draft title", "draft body").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn open_draft_pr_creates_the_configured_pr_when_set() {
        let mock = MockForgeClient::new();
        mock.seed_task(key(), "t", "b", vec![], "alice");
        let pr_key = TaskKey::new(Platform::Github, TaskKind::Pr, "acme", "widgets", 202);
        mock.set_open_draft_pr_result(Some(pr_key.clone()));

        let result = mock.open_draft_pr(&key(), "draft title", "draft body").await.unwrap();
        assert_eq!(result, Some(pr_key.clone()));

        let details = mock.get_task(&pr_key).await.unwrap();
        assert_eq!(details.title, "draft title");
        assert_eq!(details.creator, "alice");
    }
}
