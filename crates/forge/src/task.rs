//! Forge-task abstraction (C3): a uniform view over issues/PRs/MRs
//! reconstructed by a consumer from a `TaskDescriptor` plus forge
//! credentials. Lifecycle: constructed on dequeue, destroyed at handler
//! exit.

use std::sync::Arc;

use orc_domain::error::Result;
use orc_domain::task::{TaskDescriptor, TaskKey};

use crate::client::{CommentRef, ForgeClient, TaskDetails};

/// A live handle onto one forge work item, reconstructed by the consumer
/// from the queue descriptor.
pub struct ForgeTask {
    client: Arc<dyn ForgeClient>,
    pub descriptor: TaskDescriptor,
    details: TaskDetails,
}

impl ForgeTask {
    /// Reconstruct from a dequeued descriptor, fetching the current detail
    /// view from the forge.
    pub async fn reconstruct(
        client: Arc<dyn ForgeClient>,
        descriptor: TaskDescriptor,
    ) -> Result<Self> {
        let details = client.get_task(&descriptor.task_key).await?;
        Ok(Self {
            client,
            descriptor,
            details,
        })
    }

    pub fn key(&self) -> &TaskKey {
        &self.descriptor.task_key
    }

    pub fn details(&self) -> &TaskDetails {
        &self.details
    }

    /// Build the initial user-facing prompt handed to the LLM: the work
    /// item's title and body, quoted plainly.
    pub fn build_prompt(&self) -> String {
        format!(
            "# {}\n\n{}",
            self.details.title.trim(),
            self.details.body.trim()
        )
    }

    /// Atomically transition the object from the trigger label to the
    /// processing label. Returns `false` (without error) if the trigger
    /// label is already gone, meaning another actor grabbed it first.
    pub async fn prepare(&self, bot_label: &str, processing_label: &str) -> Result<bool> {
        let current = self.client.get_task(self.key()).await?.labels;
        if !current.iter().any(|l| l == bot_label) {
            return Ok(false);
        }
        self.client.remove_label(self.key(), bot_label).await?;
        self.client.add_label(self.key(), processing_label).await?;
        Ok(true)
    }

    pub async fn add_comment(&self, body: &str) -> Result<String> {
        self.client.add_comment(self.key(), body).await
    }

    pub async fn update_comment(&self, comment_id: &str, body: &str) -> Result<()> {
        self.client.update_comment(self.key(), comment_id, body).await
    }

    pub async fn list_comments(&self) -> Result<Vec<CommentRef>> {
        self.client.list_comments(self.key()).await
    }

    pub async fn get_assignees(&self) -> Result<Vec<String>> {
        self.client.get_assignees(self.key()).await
    }

    pub async fn set_labels(&self, labels: &[String]) -> Result<()> {
        self.client.set_labels(self.key(), labels).await
    }

    /// §4.8 step 1: attempt the issue→draft-PR/MR pre-check. Returns the
    /// new object's key if the forge opened one.
    pub async fn open_draft_pr(&self, title: &str, body: &str) -> Result<Option<TaskKey>> {
        self.client.open_draft_pr(self.key(), title, body).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockForgeClient;
    use orc_domain::task::{Platform, TaskKind};

    fn key() -> TaskKey {
        TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 101)
    }

    #[tokio::test]
    async fn prepare_transitions_label_once() {
        let mock = Arc::new(MockForgeClient::new());
        mock.seed_task(
            key(),
            "Add hello",
            "please add a hello endpoint",
            vec!["coding agent".into()],
            "alice",
        );
        let descriptor = TaskDescriptor::fresh(key(), "alice");
        let task = ForgeTask::reconstruct(mock.clone(), descriptor).await.unwrap();

        let grabbed = task.prepare("coding agent", "coding agent processing").await.unwrap();
        assert!(grabbed);

        let details = mock.get_task(&key()).await.unwrap();
        assert!(details.labels.contains(&"coding agent processing".to_string()));
        assert!(!details.labels.contains(&"coding agent".to_string()));

        // Second prepare: the trigger label is already gone.
        let task2 = ForgeTask::reconstruct(mock.clone(), TaskDescriptor::fresh(key(), "alice"))
            .await
            .unwrap();
        let grabbed_again = task2
            .prepare("coding agent", "coding agent processing")
            .await
            .unwrap();
        assert!(!grabbed_again);
    }

    #[tokio::test]
    async fn build_prompt_combines_title_and_body() {
        let mock = Arc::new(MockForgeClient::new());
        mock.seed_task(key(), "Add hello", "body text", vec![], "alice");
        let task = ForgeTask::reconstruct(mock, TaskDescriptor::fresh(key(), "alice"))
            .await
            .unwrap();
        let prompt = task.build_prompt();
        assert!(prompt.contains("Add hello"));
        assert!(prompt.contains("body text"));
    }
}
