//! Consumer driver (C9b, §4.3): dequeues descriptors, reconstructs a
//! [`ForgeTask`], applies the per-user config overlay, and drives a task to
//! completion through a freshly-built [`TaskHandler`] and [`SignalMesh`]
//! (§9 redesign flag — these are built per dequeued descriptor, never as
//! process-wide singletons, so state from one task can never leak into the
//! next).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};

use orc_context_store::{Compressor, Database, TaskContextManager};
use orc_domain::config::Config;
use orc_domain::error::{Error, Result};
use orc_domain::task::TaskDescriptor;
use orc_forge::{ForgeClient, ForgeTask};
use orc_mcp_client::{McpConfig, McpManager};
use orc_queue::TaskQueue;
use orc_signals::{
    CommentDetectionManager, FileSignalSource, InMemorySignalSource, PauseResumeManager,
    SignalMesh, SignalSource, TaskStopManager,
};

use crate::handler::{build_pause_state, ExecutionStrategy, HandleOutcome, TaskHandler, TaskHandlerConfig};
use crate::user_config::UserConfigFetcher;

/// §6.4: the LLM is instructed to answer with one of three JSON shapes —
/// a tool call, a Planning-phase message, or a `{done:true, comment}`
/// completion. Concrete tool schemas are appended by `ToolRegistry` at
/// request time; this is the fixed preamble every strategy shares.
const SYSTEM_PROMPT: &str = "You are an autonomous coding agent working a single forge task to completion.\n\
Respond with exactly one JSON object per turn, one of:\n\
  {\"function_call\": {\"name\": <tool name>, \"arguments\": <object>}} to invoke a tool,\n\
  {\"done\": true, \"comment\": <string>} once the task is finished and a human-readable summary is ready.\n\
`arguments` must always be a JSON object, never a string. Any other shape is treated as a parse failure.";

fn queue_err(e: orc_queue::QueueError) -> Error {
    Error::Other(e.to_string())
}

pub struct ConsumerDriver {
    forge: Arc<dyn ForgeClient>,
    queue: Arc<dyn TaskQueue>,
    db: Arc<Database>,
    base_dir: PathBuf,
    base_config: Config,
    mcp_config: McpConfig,
    user_config: Arc<dyn UserConfigFetcher>,
}

impl ConsumerDriver {
    pub fn new(
        forge: Arc<dyn ForgeClient>,
        queue: Arc<dyn TaskQueue>,
        db: Arc<Database>,
        base_dir: impl Into<PathBuf>,
        base_config: Config,
        mcp_config: McpConfig,
        user_config: Arc<dyn UserConfigFetcher>,
    ) -> Self {
        Self {
            forge,
            queue,
            db,
            base_dir: base_dir.into(),
            base_config,
            mcp_config,
            user_config,
        }
    }

    /// Dequeue until the queue is empty or `timeout` expires.
    pub async fn run_once(&self, timeout: Duration) -> Result<()> {
        loop {
            let handle = match self.queue.dequeue(timeout).await.map_err(queue_err)? {
                Some(handle) => handle,
                None => return Ok(()),
            };
            let descriptor = handle.descriptor().clone();
            if let Err(err) = self.process(descriptor).await {
                error!(error = %err, "unhandled error processing dequeued task");
            }
            if let Err(err) = self.queue.ack(handle).await {
                warn!(error = %err, "failed to ack delivered task");
            }
        }
    }

    /// Loop `run_once()` with no inter-iteration sleep beyond the queue's
    /// own blocking timeout; checks the pause signal between tasks and
    /// exits cleanly once it fires, letting any in-flight task finish first.
    pub async fn run_continuous(&self, timeout: Duration, pause: &dyn SignalSource) -> Result<()> {
        loop {
            self.run_once(timeout).await?;
            if pause.is_present() {
                return Ok(());
            }
        }
    }

    async fn process(&self, descriptor: TaskDescriptor) -> Result<()> {
        let config = crate::user_config::apply_overlay(&self.base_config, &*self.user_config, &descriptor.user).await?;
        let forge_cfg = config
            .forge_config()
            .ok_or_else(|| Error::Config("no forge section for configured task_source".into()))?
            .clone();
        let active_llm = config
            .llm
            .active()
            .ok_or_else(|| Error::Config(format!("no llm.providers entry for `{}`", config.llm.provider)))?
            .clone();

        let provider = orc_providers::build_provider(&config.llm)?;
        let mcp = Arc::new(McpManager::from_config(&self.mcp_config).await);

        let task = ForgeTask::reconstruct(self.forge.clone(), descriptor.clone()).await?;

        let (ctx, resume_state) = if descriptor.is_resumed {
            let (ctx, state) = TaskContextManager::resume_from_paused(&self.base_dir, self.db.clone(), descriptor.uuid)?;
            (ctx, Some(state))
        } else {
            let ctx = TaskContextManager::init_fresh(
                &self.base_dir,
                self.db.clone(),
                descriptor.task_key.clone(),
                descriptor.uuid,
                &descriptor.user,
                &config.llm.provider,
                &active_llm.model,
                active_llm.context_length,
            )?;
            (ctx, None)
        };

        let pause_source: Arc<dyn SignalSource> = if config.pause_resume.enabled {
            Arc::new(FileSignalSource::new(self.base_dir.join(&config.pause_resume.signal_file)))
        } else {
            Arc::new(InMemorySignalSource::new())
        };
        let pause_mgr = PauseResumeManager::new(pause_source);

        let stop_mgr = config.task_stop.enabled.then(|| {
            TaskStopManager::new(
                self.forge.clone(),
                forge_cfg.bot_name.clone(),
                config.task_stop.min_check_interval_seconds,
                config.task_stop.api_retry.clone(),
            )
        });

        let comments_mgr = config.comment_detection.enabled.then(|| {
            match resume_state.as_ref().and_then(|s| s.comment_state.as_ref()) {
                Some(state) => CommentDetectionManager::restore(self.forge.clone(), forge_cfg.bot_name.clone(), state),
                None => CommentDetectionManager::new(self.forge.clone(), forge_cfg.bot_name.clone()),
            }
        });

        let signals = Arc::new(SignalMesh::new(pause_mgr, stop_mgr, comments_mgr));

        let compressor = config.context_storage.enabled.then(|| {
            Compressor::new(
                provider.clone(),
                active_llm.context_length,
                config.context_storage.compression_threshold,
                config.context_storage.retained_tail,
                config.context_storage.summary_prompt.clone(),
            )
        });

        let strategy = if !config.context_storage.enabled {
            ExecutionStrategy::Legacy
        } else if config.planning.enabled {
            ExecutionStrategy::Planning
        } else {
            ExecutionStrategy::ContextStorage
        };

        let handler = TaskHandler::new(
            provider,
            mcp.clone(),
            signals.clone(),
            compressor,
            TaskHandlerConfig {
                max_llm_process_num: config.max_llm_process_num,
                planning: config.planning.clone(),
                issue_conversion: config.issue_conversion.clone(),
            },
            SYSTEM_PROMPT,
        );

        let resume_planning_state = resume_state.as_ref().and_then(|s| s.planning_state.clone());
        let resume_count = resume_state.as_ref().map(|s| s.resume_count).unwrap_or(0);

        let outcome = handler.handle(&task, &ctx, strategy, resume_planning_state).await;
        mcp.shutdown().await;

        match outcome {
            Ok(HandleOutcome::Completed { comment }) => {
                task.add_comment(&comment).await?;
                self.forge.remove_label(task.key(), &forge_cfg.processing_label).await?;
                self.forge.add_label(task.key(), &forge_cfg.done_label).await?;
                ctx.complete()?;
                info!(uuid = %ctx.uuid(), "task completed");
                Ok(())
            }
            Ok(HandleOutcome::Paused { planning_state }) => {
                let mut state = build_pause_state(&task, &ctx, resume_count + u32::from(descriptor.is_resumed));
                state.planning_state = planning_state;
                state.comment_state = signals.comments.as_ref().map(|m| m.snapshot());
                ctx.pause(&state)?;
                self.forge.remove_label(task.key(), &forge_cfg.processing_label).await?;
                self.forge.add_label(task.key(), &forge_cfg.paused_label).await?;
                task.add_comment("Pausing: will resume once the pause signal clears.").await?;
                info!(uuid = %ctx.uuid(), "task paused");
                Ok(())
            }
            Ok(HandleOutcome::Stopped) => {
                self.forge.remove_label(task.key(), &forge_cfg.processing_label).await?;
                if !forge_cfg.stopped_label.is_empty() {
                    self.forge.add_label(task.key(), &forge_cfg.stopped_label).await?;
                }
                task.add_comment("Stopping: the bot is no longer assigned to this task.").await?;
                if config.task_stop.cleanup_context {
                    std::fs::remove_dir_all(ctx.current_dir())?;
                }
                info!(uuid = %ctx.uuid(), "task stopped");
                Ok(())
            }
            Ok(HandleOutcome::Failed { error }) => {
                task.add_comment(&format!("Task failed: {error}")).await?;
                ctx.fail(&error)?;
                Ok(())
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(comment_err) = task.add_comment(&format!("Task failed: {message}")).await {
                    warn!(error = %comment_err, "failed to post failure comment");
                }
                ctx.fail(&message)?;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_context_store::TaskStatus;
    use orc_domain::task::{Platform, TaskKind};
    use orc_forge::MockForgeClient;
    use orc_queue::InMemoryQueue;
    use crate::user_config::NoopUserConfigFetcher;

    fn key(n: u64) -> orc_domain::task::TaskKey {
        orc_domain::task::TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", n)
    }

    fn base_config() -> Config {
        let mut config = Config::default();
        config.github = Some(orc_domain::config::ForgeConfig {
            bot_name: "agent-bot".into(),
            ..Default::default()
        });
        config.llm.provider = "stub".into();
        config.llm.providers.insert(
            "stub".into(),
            orc_domain::config::ProviderSettings {
                model: "stub-model".into(),
                // Port 1 is reserved and never has a listener: the chat
                // call fails fast with connection-refused rather than
                // hanging or reaching the network.
                base_url: "http://127.0.0.1:1".into(),
                api_key: Some("test-key".into()),
                api_key_env: None,
                context_length: 200_000,
                max_token: 4096,
            },
        );
        config.task_stop.enabled = false;
        config.comment_detection.enabled = false;
        config
    }

    /// A failed LLM call surfaces as `Err` from `process`, and the task's
    /// context directory is archived as failed rather than left dangling in
    /// `running/`.
    #[tokio::test]
    async fn process_archives_as_failed_when_the_llm_call_errors() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(1), "t", "b", vec!["coding agent processing".into()], "alice");
        forge.set_assignees(&key(1), vec!["agent-bot".into()]);

        let queue = Arc::new(InMemoryQueue::new());
        let db = Arc::new(Database::open_in_memory().unwrap());
        let dir = tempfile::tempdir().unwrap();

        let driver = ConsumerDriver::new(
            forge.clone(),
            queue,
            db.clone(),
            dir.path(),
            base_config(),
            McpConfig::default(),
            Arc::new(NoopUserConfigFetcher),
        );

        let descriptor = TaskDescriptor::fresh(key(1), "alice");
        let uuid = descriptor.uuid;

        let result = driver.process(descriptor).await;
        assert!(result.is_err());

        let row = db.get(uuid).unwrap().unwrap();
        assert_eq!(row.status, TaskStatus::Failed);
        assert!(dir.path().join("completed").join(uuid.to_string()).exists());

        let comments = forge.list_comments(&key(1)).await.unwrap();
        assert!(comments.iter().any(|c| c.body.contains("Task failed")));
    }

    #[test]
    fn queue_err_wraps_transport_errors() {
        let err = queue_err(orc_queue::QueueError::Transport("broker down".into()));
        assert!(matches!(err, Error::Other(_)));
    }
}
