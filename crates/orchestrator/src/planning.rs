//! Planning coordinator (C8, §4.9): a nested Plan → Execute → Reflect →
//! Revise state machine layered on top of the same `MessageStore`,
//! `TaskContextManager`, and signal mesh the Context-Storage strategy uses.
//! The plan itself is persisted to `planning/{uuid}.jsonl`
//! ([`orc_context_store::PlanningStore`]); a markdown checklist comment on
//! the forge object is kept in sync as actions complete.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use orc_context_store::{MessageRole, PlanningEventKind, PlanningState, TaskContextManager};
use orc_domain::config::PlanningConfig;
use orc_domain::error::{Error, Result};
use orc_domain::tool::Message;
use orc_forge::ForgeTask;
use orc_providers::{ChatRequest, LlmProvider};
use orc_signals::{CheckpointDecision, SignalMesh};

use crate::handler::records_to_messages;
use crate::response::{parse_handler_response, HandlerResponse};
use crate::tooling::ToolRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Planning,
    Execution,
    Reflection,
    Revision,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::Planning => "Planning",
            Phase::Execution => "Execution",
            Phase::Reflection => "Reflection",
            Phase::Revision => "Revision",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "Planning" => Phase::Planning,
            "Reflection" => Phase::Reflection,
            "Revision" => Phase::Revision,
            _ => Phase::Execution,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoalUnderstanding {
    pub objective: String,
    #[serde(default)]
    pub success_criteria: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subtask {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub complexity: String,
}

/// One planned tool invocation. `arguments` is an extension over the
/// spec's literal `{task_id, tool, purpose, expected_outcome, fallback}`
/// shape: the planning LLM must supply concrete MCP tool arguments for the
/// Execution phase to actually dispatch the call (see DESIGN.md).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAction {
    pub task_id: String,
    pub tool: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub expected_outcome: String,
    #[serde(default)]
    pub fallback: String,
    #[serde(default = "default_arguments")]
    pub arguments: Value,
}

fn default_arguments() -> Value {
    Value::Object(Default::default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub goal_understanding: GoalUnderstanding,
    pub subtasks: Vec<Subtask>,
    pub execution_order: Vec<String>,
    pub actions: Vec<PlannedAction>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ReflectionStatus {
    Success,
    Failure,
    Partial,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Reflection {
    action_evaluated: String,
    status: ReflectionStatus,
    evaluation: String,
    plan_revision_needed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Revision {
    reason: String,
    #[serde(default)]
    changes: Vec<String>,
    revised_plan: Plan,
}

#[derive(Debug)]
pub enum PlanningOutcome {
    Completed { comment: String },
    Paused { state: PlanningState },
    Stopped,
    Failed { error: String },
}

pub struct PlanningCoordinator<'a> {
    provider: Arc<dyn LlmProvider>,
    registry: &'a ToolRegistry<'a>,
    signals: Arc<SignalMesh>,
    system_prompt: String,
    max_iterations: usize,
    config: PlanningConfig,
}

impl<'a> PlanningCoordinator<'a> {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: &'a ToolRegistry<'a>,
        signals: Arc<SignalMesh>,
        system_prompt: impl Into<String>,
        max_iterations: usize,
        config: PlanningConfig,
    ) -> Self {
        Self {
            provider,
            registry,
            signals,
            system_prompt: system_prompt.into(),
            max_iterations,
            config,
        }
    }

    /// Drive the state machine to a terminal outcome. `resume_state` is
    /// `Some` only when resuming a task that was previously paused mid
    /// plan; otherwise phase/counters are recovered from
    /// `planning/{uuid}.jsonl` alone (a plan already on disk with no
    /// resume state means a crash mid-run, not a clean pause — execution
    /// restarts at `action_counter = 0` in that case).
    pub async fn run(
        &self,
        task: &ForgeTask,
        ctx: &TaskContextManager,
        resume_state: Option<PlanningState>,
    ) -> Result<PlanningOutcome> {
        let mut plan = self.recover_plan(ctx)?;
        let (mut phase, mut action_counter, mut revision_counter, mut checklist_comment_id) = match resume_state {
            Some(state) => (
                Phase::parse(&state.current_phase),
                state.action_counter,
                state.revision_counter,
                state.checklist_comment_id,
            ),
            None if plan.is_some() => (Phase::Execution, 0, ctx.planning.revision_count()?, None),
            None => (Phase::Planning, 0, 0, None),
        };

        let mut last_action: Option<(String, bool, String)> = None;

        for iteration in 0..self.max_iterations {
            match self.signals.evaluate(task.key()).await? {
                CheckpointDecision::Stop => return Ok(PlanningOutcome::Stopped),
                CheckpointDecision::Pause => {
                    return Ok(PlanningOutcome::Paused {
                        state: PlanningState {
                            current_phase: phase.as_str().to_string(),
                            action_counter,
                            revision_counter,
                            checklist_comment_id,
                        },
                    });
                }
                CheckpointDecision::Continue => {}
            }
            for comment in self.signals.poll_new_comments(task.key()).await? {
                let formatted = orc_signals::CommentDetectionManager::format_comment(&comment);
                ctx.messages.append(MessageRole::User, &formatted, None)?;
            }

            match phase {
                Phase::Planning => {
                    let built = self.request_plan(ctx).await?;
                    ctx.planning.append(PlanningEventKind::Plan, serde_json::to_value(&built)?)?;
                    let checklist = render_checklist(&built, 0);
                    let comment_id = task.add_comment(&checklist).await?;
                    checklist_comment_id = Some(comment_id);
                    plan = Some(built);
                    phase = Phase::Execution;
                }
                Phase::Execution => {
                    let Some(current_plan) = plan.clone() else {
                        return Ok(PlanningOutcome::Failed {
                            error: "execution phase reached without a recorded plan".into(),
                        });
                    };

                    if action_counter >= current_plan.execution_order.len() {
                        let comment = self.request_completion_comment(&current_plan, ctx).await?;
                        return Ok(PlanningOutcome::Completed { comment });
                    }

                    let task_id = current_plan.execution_order[action_counter].clone();
                    let Some(action) = current_plan.actions.iter().find(|a| a.task_id == task_id) else {
                        return Ok(PlanningOutcome::Failed {
                            error: format!("no action found for subtask '{task_id}'"),
                        });
                    };

                    let (result_text, is_error) = match self.registry.call(&action.tool, action.arguments.clone()).await {
                        Ok(outcome) => outcome,
                        Err(err) => (format!("error: {err}"), true),
                    };
                    ctx.messages.append(MessageRole::Tool, &result_text, Some(&action.tool))?;
                    action_counter += 1;
                    last_action = Some((task_id, is_error, result_text));

                    if let Some(comment_id) = &checklist_comment_id {
                        let checklist = render_checklist(&current_plan, action_counter);
                        if let Err(err) = task.update_comment(comment_id, &checklist).await {
                            warn!(uuid = %ctx.uuid(), error = %err, "failed to update plan checklist comment");
                        }
                    }

                    let interval = self.config.reflection.trigger_interval.max(1);
                    let due_on_error = is_error && self.config.reflection.trigger_on_error;
                    let due_on_interval = action_counter % interval == 0;
                    if self.config.reflection.enabled && (due_on_error || due_on_interval) {
                        phase = Phase::Reflection;
                    }
                }
                Phase::Reflection => {
                    let Some((task_id, is_error, result_text)) = last_action.clone() else {
                        phase = Phase::Execution;
                        continue;
                    };
                    let reflection = self.request_reflection(&task_id, is_error, &result_text, ctx).await?;
                    ctx.planning.append(PlanningEventKind::Reflection, serde_json::to_value(&reflection)?)?;
                    info!(
                        uuid = %ctx.uuid(),
                        subtask = %reflection.action_evaluated,
                        status = ?reflection.status,
                        "planning reflection recorded"
                    );
                    phase = if reflection.plan_revision_needed {
                        Phase::Revision
                    } else {
                        Phase::Execution
                    };
                }
                Phase::Revision => {
                    if revision_counter >= self.config.revision.max_revisions {
                        return Ok(PlanningOutcome::Failed {
                            error: format!(
                                "revision cap ({}) reached without a successful plan",
                                self.config.revision.max_revisions
                            ),
                        });
                    }
                    let revision = self.request_revision(ctx).await?;
                    ctx.planning.append(PlanningEventKind::Revision, serde_json::to_value(&revision)?)?;
                    revision_counter += 1;
                    plan = Some(revision.revised_plan);
                    phase = Phase::Execution;
                }
            }

            if iteration + 1 >= self.max_iterations {
                return Ok(PlanningOutcome::Failed {
                    error: format!("planning iteration cap ({}) reached without completion", self.max_iterations),
                });
            }
        }

        Ok(PlanningOutcome::Failed {
            error: format!("planning iteration cap ({}) reached without completion", self.max_iterations),
        })
    }

    /// Recover the plan most recently committed to `planning/{uuid}.jsonl`,
    /// if any — a `revision` event's `revised_plan` supersedes the
    /// original `plan` event.
    fn recover_plan(&self, ctx: &TaskContextManager) -> Result<Option<Plan>> {
        let Some(latest) = ctx.planning.latest_plan()? else {
            return Ok(None);
        };
        let plan = match latest.kind {
            PlanningEventKind::Plan => serde_json::from_value::<Plan>(latest.payload)?,
            PlanningEventKind::Revision => serde_json::from_value::<Revision>(latest.payload)?.revised_plan,
            PlanningEventKind::Reflection => {
                return Err(Error::Other("latest_plan returned a reflection event".into()))
            }
        };
        Ok(Some(plan))
    }

    async fn request_plan(&self, ctx: &TaskContextManager) -> Result<Plan> {
        let directive = format!(
            "Decompose this task into at most {} subtasks at '{}' granularity. \
             Respond with exactly one JSON object: \
             {{\"phase\":\"planning\",\"goal_understanding\":{{\"objective\":string,\"success_criteria\":[string],\"constraints\":[string]}},\
             \"subtasks\":[{{\"id\":string,\"description\":string,\"dependencies\":[string],\"complexity\":string}}],\
             \"execution_order\":[string],\
             \"actions\":[{{\"task_id\":string,\"tool\":string,\"purpose\":string,\"expected_outcome\":string,\"fallback\":string,\"arguments\":object}}]}}.",
            self.config.max_subtasks, self.config.decomposition_level
        );
        ctx.messages.append(MessageRole::User, &directive, None)?;
        let response = self.chat(ctx).await?;
        serde_json::from_str::<Plan>(response.trim())
            .map_err(|err| Error::Other(format!("malformed plan response: {err}")))
    }

    async fn request_reflection(&self, task_id: &str, is_error: bool, result_text: &str, ctx: &TaskContextManager) -> Result<Reflection> {
        let directive = format!(
            "Reflect on subtask '{task_id}' (tool reported {}). Result:\n{result_text}\n\
             Respond with exactly one JSON object: \
             {{\"phase\":\"reflection\",\"action_evaluated\":\"{task_id}\",\"status\":\"success\"|\"failure\"|\"partial\",\
             \"evaluation\":string,\"plan_revision_needed\":bool}}.",
            if is_error { "an error" } else { "success" }
        );
        ctx.messages.append(MessageRole::User, &directive, None)?;
        let response = self.chat(ctx).await?;
        serde_json::from_str::<Reflection>(response.trim())
            .map_err(|err| Error::Other(format!("malformed reflection response: {err}")))
    }

    async fn request_revision(&self, ctx: &TaskContextManager) -> Result<Revision> {
        let directive = "The plan needs revision given the reflection above. Respond with exactly one JSON object: \
             {\"phase\":\"revision\",\"reason\":string,\"changes\":[string],\"revised_plan\":<the same shape as the original plan>}.";
        ctx.messages.append(MessageRole::User, directive, None)?;
        let response = self.chat(ctx).await?;
        serde_json::from_str::<Revision>(response.trim())
            .map_err(|err| Error::Other(format!("malformed revision response: {err}")))
    }

    async fn request_completion_comment(&self, plan: &Plan, ctx: &TaskContextManager) -> Result<String> {
        let directive = "All planned actions have been executed. Respond with exactly one JSON object: \
             {\"done\":true,\"comment\":string} summarizing the outcome for the forge object.";
        ctx.messages.append(MessageRole::User, directive, None)?;
        let response = self.chat(ctx).await?;
        match parse_handler_response(&response) {
            Ok(HandlerResponse::Done { comment }) if !comment.trim().is_empty() => Ok(comment),
            _ => Ok(format!("Plan executed: {}", plan.goal_understanding.objective)),
        }
    }

    /// Send the accumulated conversation (system prompt + everything in
    /// `current.jsonl`) to the provider and persist the assistant reply.
    async fn chat(&self, ctx: &TaskContextManager) -> Result<String> {
        let mut messages = vec![Message::system(&self.system_prompt)];
        messages.extend(records_to_messages(&ctx.messages.read_all()?));
        let request = ChatRequest {
            messages,
            tools: Vec::new(),
            temperature: Some(0.0),
            max_tokens: None,
            model: None,
        };
        let response = self.provider.chat(&request).await?;
        ctx.messages.append(MessageRole::Assistant, &response.content, None)?;
        Ok(response.content)
    }
}

/// Render the user-visible markdown checklist comment: one line per
/// subtask in execution order, ticked once `completed_count` actions have
/// been dispatched.
fn render_checklist(plan: &Plan, completed_count: usize) -> String {
    let mut out = String::from("### Plan\n\n");
    out.push_str(&format!("**Objective:** {}\n\n", plan.goal_understanding.objective));
    for (idx, task_id) in plan.execution_order.iter().enumerate() {
        let description = plan
            .subtasks
            .iter()
            .find(|s| &s.id == task_id)
            .map(|s| s.description.as_str())
            .unwrap_or(task_id.as_str());
        let mark = if idx < completed_count { "x" } else { " " };
        out.push_str(&format!("- [{mark}] {description}\n"));
    }
    out
}
