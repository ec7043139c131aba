use orc_domain::error::Result;
use orc_domain::tool::{Message, ToolCall, ToolDefinition};

/// A provider-agnostic chat completion request.
///
/// Streaming is out of scope: the task handler always waits for a full
/// response before deciding its next move, so there is no `chat_stream`.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the provider uses its
    /// configured default model.
    pub model: Option<String>,
}

/// A provider-agnostic chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
    pub model: String,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Trait every LLM adapter must implement.
///
/// Implementations are provider-specific (Anthropic, OpenAI-compatible) and
/// translate between the internal message/tool types and each provider's
/// wire format.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Send a chat completion request and wait for the full response.
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// The config key this provider instance was built from (e.g. "anthropic").
    fn provider_id(&self) -> &str;

    /// The model used when a request omits an explicit override.
    fn default_model(&self) -> &str;
}
