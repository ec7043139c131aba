//! `orc-providers` — LLM provider adapters used by the task handler's LLM
//! client capability (C7) to turn a conversation into a chat completion.
//!
//! Two adapters are implemented: [`anthropic::AnthropicProvider`] for the
//! Anthropic Messages API, and [`openai_compat::OpenAiCompatProvider`] for
//! any endpoint speaking the OpenAI chat completions wire format (OpenAI
//! itself, Azure OpenAI, Ollama, vLLM, and similar). [`registry::build_provider`]
//! picks and constructs the one named by `llm.provider` in config.

pub mod anthropic;
pub mod openai_compat;
pub mod registry;
pub mod traits;
pub(crate) mod util;

pub use registry::build_provider;
pub use traits::{ChatRequest, ChatResponse, LlmProvider, Usage};
