use serde::Serialize;

/// Structured trace events emitted across the orchestrator crates, in
/// addition to ordinary `tracing` spans. Each is logged as a JSON blob under
/// a single `trace_event` field so log aggregators can index on `event`
/// without parsing free-text messages.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TaskEnqueued {
        task_key: String,
        uuid: String,
        is_resumed: bool,
    },
    TaskDequeued {
        uuid: String,
    },
    TaskTransition {
        uuid: String,
        from: String,
        to: String,
    },
    CompressionRun {
        uuid: String,
        original_tokens: u64,
        summary_tokens: u64,
    },
    SignalFired {
        uuid: String,
        signal: String,
    },
    LlmCall {
        uuid: String,
        provider: String,
        model: String,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolCall {
        uuid: String,
        tool: String,
        status: String,
        duration_ms: u64,
    },
    PlanningTransition {
        uuid: String,
        from: String,
        to: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "orc_event");
    }
}
