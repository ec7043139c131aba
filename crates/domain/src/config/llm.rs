use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// The active provider id; must match a key in `providers`.
    pub provider: String,
    #[serde(default = "d_true")]
    pub function_calling: bool,
    /// Per-provider settings, keyed by provider id (e.g. "openai", "anthropic").
    #[serde(default)]
    pub providers: HashMap<String, ProviderSettings>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".into(),
            function_calling: true,
            providers: HashMap::new(),
        }
    }
}

impl LlmConfig {
    pub fn active(&self) -> Option<&ProviderSettings> {
        self.providers.get(&self.provider)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderSettings {
    pub model: String,
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    /// Env var to resolve the API key from when `api_key` is absent.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default = "d_context_length")]
    pub context_length: u32,
    #[serde(default = "d_max_token")]
    pub max_token: u32,
}

fn d_true() -> bool {
    true
}
fn d_context_length() -> u32 {
    128_000
}
fn d_max_token() -> u32 {
    4_096
}
