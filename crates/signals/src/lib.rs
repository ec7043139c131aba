//! The cooperative-cancellation signal mesh (C6, §4.6): three independently
//! pollable signals — pause/resume, stop-on-unassign, and comment
//! detection — checked only at designated checkpoints (between loop
//! iterations, between tool calls, between Planning transitions), never
//! mid-tool-call or mid-LLM-call.
//!
//! Precedence when more than one signal fires at the same checkpoint:
//! stop > pause > comment-detection. A stop observed while a task is being
//! paused resolves as a stop (terminal) rather than a pause (resumable).

pub mod comment_detection;
pub mod pause_resume;
pub mod source;
pub mod task_stop;

pub use comment_detection::CommentDetectionManager;
pub use pause_resume::PauseResumeManager;
pub use source::{FileSignalSource, InMemorySignalSource, SignalSource};
pub use task_stop::TaskStopManager;

use std::sync::Arc;

use orc_domain::error::Result;
use orc_domain::task::TaskKey;
use orc_forge::CommentRef;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointDecision {
    Continue,
    Pause,
    Stop,
}

/// Bundles the three signal managers behind the precedence rule a
/// checkpoint must apply. `stop` and `comments` are optional because both
/// `TaskStopConfig` and `CommentDetectionConfig` can be disabled; pause is
/// always active (it is the fleetwide kill switch).
pub struct SignalMesh {
    pub pause: PauseResumeManager,
    pub stop: Option<TaskStopManager>,
    pub comments: Option<CommentDetectionManager>,
}

impl SignalMesh {
    pub fn new(pause: PauseResumeManager, stop: Option<TaskStopManager>, comments: Option<CommentDetectionManager>) -> Self {
        Self { pause, stop, comments }
    }

    /// Evaluate the mesh at a checkpoint. Stop wins over pause; both win
    /// over comment detection, which is never consulted once either fires.
    pub async fn evaluate(&self, key: &TaskKey) -> Result<CheckpointDecision> {
        if let Some(stop) = &self.stop {
            if stop.should_stop(key).await? {
                return Ok(CheckpointDecision::Stop);
            }
        }
        if self.pause.should_pause() {
            return Ok(CheckpointDecision::Pause);
        }
        Ok(CheckpointDecision::Continue)
    }

    /// Only meaningful when [`Self::evaluate`] returned `Continue` — comment
    /// injection happens on the normal execution path, not during a
    /// pause/stop transition.
    pub async fn poll_new_comments(&self, key: &TaskKey) -> Result<Vec<CommentRef>> {
        match &self.comments {
            Some(manager) => manager.poll_new_comments(key).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::config::ApiRetryConfig;
    use orc_domain::task::{Platform, TaskKind};
    use orc_forge::MockForgeClient;

    fn key() -> TaskKey {
        TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1)
    }

    #[tokio::test]
    async fn stop_takes_precedence_over_pause() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(), "t", "b", vec![], "alice");
        forge.set_assignees(&key(), vec!["someone-else".to_string()]);

        let pause_signal = InMemorySignalSource::new();
        pause_signal.set(true);

        let mesh = SignalMesh::new(
            PauseResumeManager::new(Arc::new(pause_signal)),
            Some(TaskStopManager::new(forge, "agent-bot", 0, ApiRetryConfig::default())),
            None,
        );

        assert_eq!(mesh.evaluate(&key()).await.unwrap(), CheckpointDecision::Stop);
    }

    #[tokio::test]
    async fn pause_fires_when_stop_is_disabled() {
        let pause_signal = InMemorySignalSource::new();
        pause_signal.set(true);
        let mesh = SignalMesh::new(PauseResumeManager::new(Arc::new(pause_signal)), None, None);
        assert_eq!(mesh.evaluate(&key()).await.unwrap(), CheckpointDecision::Pause);
    }

    #[tokio::test]
    async fn continues_when_nothing_fires() {
        let mesh = SignalMesh::new(PauseResumeManager::new(Arc::new(InMemorySignalSource::new())), None, None);
        assert_eq!(mesh.evaluate(&key()).await.unwrap(), CheckpointDecision::Continue);
    }
}
