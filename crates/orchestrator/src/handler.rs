//! Task handler (C7, §4.8): the per-task execution loop. Selects a
//! strategy (Legacy / Context-Storage / Planning), runs it to
//! completion/pause/stop/failure, and applies the bounded error-recovery
//! policy from §4.8 along the way.

use std::sync::Arc;

use tracing::{info, warn};

use orc_context_store::{Compressor, MessageRole, PlanningState, TaskContextManager, TaskState};
use orc_domain::config::{IssueConversionConfig, PlanningConfig};
use orc_domain::error::Result;
use orc_domain::task::TaskKind;
use orc_domain::tool::Message;
use orc_forge::ForgeTask;
use orc_mcp_client::McpManager;
use orc_providers::{ChatRequest, LlmProvider};
use orc_signals::{CheckpointDecision, SignalMesh};

use crate::planning::{PlanningCoordinator, PlanningOutcome};
use crate::response::{parse_handler_response, HandlerResponse};
use crate::tooling::ToolRegistry;

/// Consecutive malformed-JSON responses tolerated before the handler bails
/// (§4.8).
const MAX_CONSECUTIVE_PARSE_FAILURES: u32 = 5;

/// Consecutive failures of the *same* tool tolerated before the handler
/// bails (§4.8).
const MAX_CONSECUTIVE_TOOL_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStrategy {
    /// In-memory only, no context directory. Only used when context
    /// storage is disabled in configuration.
    Legacy,
    /// Persisted via [`TaskContextManager`]; pause/stop/comment-detection
    /// checked at the top of the loop, compression checked before each
    /// LLM call. The default strategy.
    ContextStorage,
    /// Nested Plan/Execute/Reflect/Revise FSM (§4.9) sharing the same
    /// message store and signal managers as Context-Storage.
    Planning,
}

#[derive(Debug, Clone)]
pub struct TaskHandlerConfig {
    pub max_llm_process_num: usize,
    pub planning: PlanningConfig,
    pub issue_conversion: IssueConversionConfig,
}

impl Default for TaskHandlerConfig {
    fn default() -> Self {
        Self {
            max_llm_process_num: 1000,
            planning: PlanningConfig::default(),
            issue_conversion: IssueConversionConfig::default(),
        }
    }
}

#[derive(Debug)]
pub enum HandleOutcome {
    Completed { comment: String },
    /// `planning_state` is `Some` only when the Planning strategy paused
    /// mid-state-machine; Legacy/Context-Storage carry no planning state.
    Paused { planning_state: Option<PlanningState> },
    Stopped,
    Failed { error: String },
}

pub struct TaskHandler {
    provider: Arc<dyn LlmProvider>,
    mcp: Arc<McpManager>,
    signals: Arc<SignalMesh>,
    compressor: Option<Compressor>,
    config: TaskHandlerConfig,
    system_prompt: String,
}

impl TaskHandler {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        mcp: Arc<McpManager>,
        signals: Arc<SignalMesh>,
        compressor: Option<Compressor>,
        config: TaskHandlerConfig,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            mcp,
            signals,
            compressor,
            config,
            system_prompt: system_prompt.into(),
        }
    }

    /// Run `task` to a terminal outcome under the given strategy. The
    /// caller is responsible for the directory transition that follows
    /// (complete/fail/pause on `ctx`, and posting `HandleOutcome::Stopped`'s
    /// forge-side effects — those live one layer up, where the forge
    /// client and label config are available).
    pub async fn handle(
        &self,
        task: &ForgeTask,
        ctx: &TaskContextManager,
        strategy: ExecutionStrategy,
        resume_planning_state: Option<PlanningState>,
    ) -> Result<HandleOutcome> {
        // §4.8 step 1: only attempted on a task's first pass through the
        // handler (an empty message log) — a resumed task already ran (or
        // declined) this pre-check before it was ever paused.
        if self.config.issue_conversion.enabled
            && task.key().kind == TaskKind::Issue
            && ctx.messages.read_all()?.is_empty()
        {
            let title = format!("{}{}", self.config.issue_conversion.draft_title_prefix, task.details().title);
            if let Some(new_key) = task.open_draft_pr(&title, &task.details().body).await? {
                info!(issue = %task.key(), opened = %new_key, "issue converted to draft PR/MR, finalizing without an LLM loop");
                return Ok(HandleOutcome::Completed {
                    comment: format!("Opened draft {new_key} to work this issue; no agent loop was run."),
                });
            }
        }

        match strategy {
            ExecutionStrategy::Legacy => self.run_legacy(task).await,
            ExecutionStrategy::ContextStorage => self.run_context_storage(task, ctx).await,
            ExecutionStrategy::Planning => self.run_planning(task, ctx, resume_planning_state).await,
        }
    }

    /// In-memory loop: no context directory, no pause/resume (a crash
    /// loses the task). Only reachable when context storage is disabled.
    async fn run_legacy(&self, task: &ForgeTask) -> Result<HandleOutcome> {
        let registry = ToolRegistry::build(&self.mcp);
        let mut messages = vec![Message::system(&self.system_prompt), Message::user(task.build_prompt())];
        let mut parse_failures = 0u32;
        let mut tool_failures: (Option<String>, u32) = (None, 0);

        for iteration in 0..self.config.max_llm_process_num {
            if self.signals.pause.should_pause() {
                warn!(iteration, "pause requested mid-legacy-run; legacy strategy cannot persist, stopping");
                return Ok(HandleOutcome::Stopped);
            }

            let request = ChatRequest {
                messages: messages.clone(),
                tools: registry.tool_definitions(),
                temperature: Some(0.0),
                max_tokens: None,
                model: None,
            };
            let response = self.provider.chat(&request).await?;
            messages.push(Message::assistant(&response.content));

            match parse_handler_response(&response.content) {
                Ok(HandlerResponse::Done { comment }) => return Ok(HandleOutcome::Completed { comment }),
                Ok(HandlerResponse::ToolCall { name, arguments }) => {
                    parse_failures = 0;
                    match registry.call(&name, arguments).await {
                        Ok((result, is_error)) => {
                            if is_error {
                                tool_failures = bump_tool_failures(tool_failures, &name);
                                if tool_failures.1 >= MAX_CONSECUTIVE_TOOL_FAILURES {
                                    return Ok(HandleOutcome::Failed {
                                        error: format!("tool '{name}' failed {MAX_CONSECUTIVE_TOOL_FAILURES} times in a row"),
                                    });
                                }
                            } else {
                                tool_failures = (None, 0);
                            }
                            messages.push(Message::tool_result(&name, &result));
                        }
                        Err(err) => {
                            tool_failures = bump_tool_failures(tool_failures, &name);
                            messages.push(Message::tool_result(&name, format!("error: {err}")));
                            if tool_failures.1 >= MAX_CONSECUTIVE_TOOL_FAILURES {
                                return Ok(HandleOutcome::Failed {
                                    error: format!("tool '{name}' failed {MAX_CONSECUTIVE_TOOL_FAILURES} times in a row"),
                                });
                            }
                        }
                    }
                }
                Err(parse_err) => {
                    parse_failures += 1;
                    warn!(iteration, error = %parse_err, parse_failures, "malformed LLM response");
                    if parse_failures >= MAX_CONSECUTIVE_PARSE_FAILURES {
                        return Ok(HandleOutcome::Failed {
                            error: format!("{MAX_CONSECUTIVE_PARSE_FAILURES} consecutive malformed responses"),
                        });
                    }
                }
            }
        }

        Ok(HandleOutcome::Failed {
            error: format!("iteration cap ({}) reached without completion", self.config.max_llm_process_num),
        })
    }

    /// The default strategy: persisted conversation, signal checkpoints at
    /// the top of every iteration, compression checked before every LLM
    /// call.
    async fn run_context_storage(&self, task: &ForgeTask, ctx: &TaskContextManager) -> Result<HandleOutcome> {
        let registry = ToolRegistry::build(&self.mcp);

        if ctx.messages.read_all()?.is_empty() {
            ctx.messages.append(MessageRole::User, &task.build_prompt(), None)?;
        }

        let mut parse_failures = 0u32;
        let mut tool_failures: (Option<String>, u32) = (None, 0);

        for iteration in 0..self.config.max_llm_process_num {
            match self.signals.evaluate(task.key()).await? {
                CheckpointDecision::Stop => return Ok(HandleOutcome::Stopped),
                CheckpointDecision::Pause => return Ok(HandleOutcome::Paused { planning_state: None }),
                CheckpointDecision::Continue => {}
            }

            for comment in self.signals.poll_new_comments(task.key()).await? {
                let formatted = orc_signals::CommentDetectionManager::format_comment(&comment);
                ctx.messages.append(MessageRole::User, &formatted, None)?;
            }

            if let Some(compressor) = &self.compressor {
                let token_count = ctx.messages.current_token_count()?;
                if compressor.should_compress(token_count) {
                    if compressor.compress(&ctx.messages, &ctx.summaries).await?.is_some() {
                        ctx.record_compression()?;
                    }
                }
            }

            let mut messages = vec![Message::system(&self.system_prompt)];
            messages.extend(records_to_messages(&ctx.messages.read_all()?));

            let request = ChatRequest {
                messages,
                tools: registry.tool_definitions(),
                temperature: Some(0.0),
                max_tokens: None,
                model: None,
            };
            let response = self.provider.chat(&request).await?;
            if let Some(usage) = &response.usage {
                ctx.update_llm_statistics(usage.total_tokens as u64)?;
            }
            ctx.messages.append(MessageRole::Assistant, &response.content, None)?;

            match parse_handler_response(&response.content) {
                Ok(HandlerResponse::Done { comment }) => return Ok(HandleOutcome::Completed { comment }),
                Ok(HandlerResponse::ToolCall { name, arguments }) => {
                    parse_failures = 0;
                    let started = std::time::Instant::now();
                    match registry.call(&name, arguments.clone()).await {
                        Ok((result, is_error)) => {
                            ctx.update_tool_statistics()?;
                            ctx.tools.append(
                                iteration as i64,
                                &name,
                                arguments,
                                Some(serde_json::json!(result)),
                                None,
                                tool_status(is_error),
                                started.elapsed().as_millis() as u64,
                            )?;
                            ctx.messages.append(MessageRole::Tool, &result, Some(&name))?;
                            if is_error {
                                tool_failures = bump_tool_failures(tool_failures, &name);
                                if tool_failures.1 >= MAX_CONSECUTIVE_TOOL_FAILURES {
                                    return Ok(HandleOutcome::Failed {
                                        error: format!("tool '{name}' failed {MAX_CONSECUTIVE_TOOL_FAILURES} times in a row"),
                                    });
                                }
                            } else {
                                tool_failures = (None, 0);
                            }
                        }
                        Err(err) => {
                            ctx.update_tool_statistics()?;
                            ctx.tools.append(
                                iteration as i64,
                                &name,
                                arguments,
                                None,
                                Some(err.to_string()),
                                orc_context_store::ToolCallStatus::Error,
                                started.elapsed().as_millis() as u64,
                            )?;
                            ctx.messages.append(MessageRole::Tool, &format!("error: {err}"), Some(&name))?;
                            tool_failures = bump_tool_failures(tool_failures, &name);
                            if tool_failures.1 >= MAX_CONSECUTIVE_TOOL_FAILURES {
                                return Ok(HandleOutcome::Failed {
                                    error: format!("tool '{name}' failed {MAX_CONSECUTIVE_TOOL_FAILURES} times in a row"),
                                });
                            }
                        }
                    }
                }
                Err(parse_err) => {
                    parse_failures += 1;
                    warn!(iteration, error = %parse_err, parse_failures, "malformed LLM response");
                    if parse_failures >= MAX_CONSECUTIVE_PARSE_FAILURES {
                        return Ok(HandleOutcome::Failed {
                            error: format!("{MAX_CONSECUTIVE_PARSE_FAILURES} consecutive malformed responses"),
                        });
                    }
                }
            }
        }

        Ok(HandleOutcome::Failed {
            error: format!("iteration cap ({}) reached without completion", self.config.max_llm_process_num),
        })
    }

    async fn run_planning(
        &self,
        task: &ForgeTask,
        ctx: &TaskContextManager,
        resume_planning_state: Option<PlanningState>,
    ) -> Result<HandleOutcome> {
        if ctx.messages.read_all()?.is_empty() {
            ctx.messages.append(MessageRole::User, &task.build_prompt(), None)?;
        }

        let registry = ToolRegistry::build(&self.mcp);
        let coordinator = PlanningCoordinator::new(
            self.provider.clone(),
            &registry,
            self.signals.clone(),
            &self.system_prompt,
            self.config.max_llm_process_num,
            self.config.planning.clone(),
        );

        match coordinator.run(task, ctx, resume_planning_state).await? {
            PlanningOutcome::Completed { comment } => {
                info!(uuid = %ctx.uuid(), "planning coordinator completed task");
                Ok(HandleOutcome::Completed { comment })
            }
            PlanningOutcome::Paused { state } => Ok(HandleOutcome::Paused { planning_state: Some(state) }),
            PlanningOutcome::Stopped => Ok(HandleOutcome::Stopped),
            PlanningOutcome::Failed { error } => Ok(HandleOutcome::Failed { error }),
        }
    }
}

fn tool_status(is_error: bool) -> orc_context_store::ToolCallStatus {
    if is_error {
        orc_context_store::ToolCallStatus::Error
    } else {
        orc_context_store::ToolCallStatus::Success
    }
}

fn bump_tool_failures(current: (Option<String>, u32), tool_name: &str) -> (Option<String>, u32) {
    match current {
        (Some(ref name), count) if name == tool_name => (Some(name.clone()), count + 1),
        _ => (Some(tool_name.to_string()), 1),
    }
}

pub(crate) fn records_to_messages(records: &[orc_context_store::MessageRecord]) -> Vec<Message> {
    records
        .iter()
        .map(|record| match record.role {
            MessageRole::System => Message::system(&record.content),
            MessageRole::User => Message::user(&record.content),
            MessageRole::Assistant => Message::assistant(&record.content),
            MessageRole::Tool => Message::tool_result(record.tool_name.as_deref().unwrap_or("tool"), &record.content),
            MessageRole::Summary => Message::system(format!("Conversation summary so far:\n{}", record.content)),
        })
        .collect()
}

/// Restore a [`PauseResumeManager`]-visible pause into a persisted
/// `task_state.json`, capturing whatever the caller already knows about
/// the task so [`TaskContextManager::pause`] can perform the rename.
pub fn build_pause_state(task: &ForgeTask, ctx: &TaskContextManager, resume_count: u32) -> TaskState {
    TaskState {
        task_key: task.key().clone(),
        uuid: ctx.uuid(),
        user: task.details().creator.clone(),
        paused_at: chrono::Utc::now(),
        status: orc_context_store::PausedStatus::Paused,
        resume_count,
        context_path: ctx.current_dir().to_string_lossy().to_string(),
        planning_state: None,
        comment_state: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use orc_context_store::Database;
    use orc_domain::task::{Platform, TaskDescriptor};
    use orc_forge::MockForgeClient;
    use orc_mcp_client::McpConfig;
    use orc_providers::{ChatResponse, LlmProvider};
    use orc_signals::{FileSignalSource, PauseResumeManager, SignalMesh};

    /// A provider that panics if ever called, so tests can assert a code
    /// path never reaches the LLM.
    struct UnreachableProvider;

    #[async_trait]
    impl LlmProvider for UnreachableProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            panic!("LLM should not have been called");
        }

        fn provider_id(&self) -> &str {
            "unreachable"
        }

        fn default_model(&self) -> &str {
            "unreachable"
        }
    }

    /// A provider that always emits `{done:true}` on its first turn, so
    /// tests exercising the normal strategy loop terminate in one
    /// iteration.
    struct ImmediatelyDoneProvider;

    #[async_trait]
    impl LlmProvider for ImmediatelyDoneProvider {
        async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                content: r#"{"done":true,"comment":"work finished"}"#.into(),
                tool_calls: Vec::new(),
                usage: None,
                model: "stub-model".into(),
                finish_reason: Some("stop".into()),
            })
        }

        fn provider_id(&self) -> &str {
            "done"
        }

        fn default_model(&self) -> &str {
            "stub-model"
        }
    }

    fn issue_key() -> orc_domain::task::TaskKey {
        orc_domain::task::TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 9)
    }

    async fn build_handler_and_ctx(
        forge: Arc<MockForgeClient>,
        provider: Arc<dyn LlmProvider>,
        issue_conversion: IssueConversionConfig,
        dir: &std::path::Path,
    ) -> (TaskHandler, ForgeTask, TaskContextManager) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let descriptor = TaskDescriptor::fresh(issue_key(), "alice");
        let ctx = TaskContextManager::init_fresh(
            dir,
            db,
            issue_key(),
            descriptor.uuid,
            "alice",
            "stub",
            "stub-model",
            200_000,
        )
        .unwrap();
        let task = ForgeTask::reconstruct(forge, descriptor).await.unwrap();

        let pause_mgr = PauseResumeManager::new(Arc::new(FileSignalSource::new(dir.join("pause_signal"))));
        let signals = Arc::new(SignalMesh::new(pause_mgr, None, None));
        let mcp = Arc::new(McpManager::from_config(&McpConfig::default()).await);

        let handler = TaskHandler::new(
            provider,
            mcp,
            signals,
            None,
            TaskHandlerConfig {
                max_llm_process_num: 10,
                planning: PlanningConfig::default(),
                issue_conversion,
            },
            "system prompt",
        );
        (handler, task, ctx)
    }

    #[tokio::test]
    async fn issue_conversion_finalizes_without_calling_the_llm_when_forge_opens_a_draft() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(issue_key(), "Add hello", "please add a hello endpoint", vec![], "alice");
        let pr_key = orc_domain::task::TaskKey::new(Platform::Github, TaskKind::Pr, "acme", "widgets", 10);
        forge.set_open_draft_pr_result(Some(pr_key.clone()));

        let dir = tempfile::tempdir().unwrap();
        let (handler, task, ctx) = build_handler_and_ctx(
            forge,
            Arc::new(UnreachableProvider),
            IssueConversionConfig { enabled: true, draft_title_prefix: "[draft] ".into() },
            dir.path(),
        )
        .await;

        let outcome = handler
            .handle(&task, &ctx, ExecutionStrategy::ContextStorage, None)
            .await
            .unwrap();

        match outcome {
            HandleOutcome::Completed { comment } => assert!(comment.contains(&pr_key.to_string())),
            other => panic!("expected Completed, got {other:?}"),
        }
    }

    /// When the feature is disabled, a configured-to-succeed conversion
    /// must not take effect: the handler falls through to the normal
    /// strategy loop, which here terminates via the LLM's own `{done:true}`
    /// rather than the pre-check's shortcut.
    #[tokio::test]
    async fn issue_conversion_disabled_falls_through_to_the_strategy_loop() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(issue_key(), "Add hello", "please add a hello endpoint", vec![], "alice");
        let pr_key = orc_domain::task::TaskKey::new(Platform::Github, TaskKind::Pr, "acme", "widgets", 11);
        forge.set_open_draft_pr_result(Some(pr_key));

        let dir = tempfile::tempdir().unwrap();
        let (handler, task, ctx) = build_handler_and_ctx(
            forge,
            Arc::new(ImmediatelyDoneProvider),
            IssueConversionConfig { enabled: false, draft_title_prefix: "[draft] ".into() },
            dir.path(),
        )
        .await;

        let outcome = handler
            .handle(&task, &ctx, ExecutionStrategy::ContextStorage, None)
            .await
            .unwrap();

        match outcome {
            HandleOutcome::Completed { comment } => assert_eq!(comment, "work finished"),
            other => panic!("expected Completed via the strategy loop, got {other:?}"),
        }
    }
}
