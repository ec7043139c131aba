//! Builds the active [`LlmProvider`] from [`LlmConfig`].

use std::sync::Arc;

use orc_domain::config::LlmConfig;
use orc_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Construct the configured active provider as a trait object.
///
/// Dispatch on the provider id is a simple prefix match: any id starting
/// with `"anthropic"` gets the native Anthropic adapter, everything else
/// is treated as an OpenAI-compatible endpoint (OpenAI itself, Azure
/// OpenAI, Ollama, vLLM, and similar all speak this wire format).
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>> {
    let settings = config.active().ok_or_else(|| {
        Error::Config(format!(
            "llm.provider '{}' has no matching entry under llm.providers",
            config.provider
        ))
    })?;

    if config.provider.starts_with("anthropic") {
        let provider = AnthropicProvider::from_config(&config.provider, settings)?;
        Ok(Arc::new(provider))
    } else {
        let provider = OpenAiCompatProvider::from_config(&config.provider, settings)?;
        Ok(Arc::new(provider))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings() -> orc_domain::config::ProviderSettings {
        orc_domain::config::ProviderSettings {
            model: "gpt-4o".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: Some("sk-test".into()),
            api_key_env: None,
            context_length: 128_000,
            max_token: 4096,
        }
    }

    #[test]
    fn unknown_provider_errors() {
        let config = LlmConfig {
            provider: "missing".into(),
            function_calling: true,
            providers: HashMap::new(),
        };
        assert!(build_provider(&config).is_err());
    }

    #[test]
    fn openai_compat_provider_builds() {
        let mut providers = HashMap::new();
        providers.insert("openai".to_string(), settings());
        let config = LlmConfig {
            provider: "openai".into(),
            function_calling: true,
            providers,
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.provider_id(), "openai");
    }

    #[test]
    fn anthropic_provider_builds() {
        let mut providers = HashMap::new();
        providers.insert("anthropic".to_string(), settings());
        let config = LlmConfig {
            provider: "anthropic".into(),
            function_calling: true,
            providers,
        };
        let provider = build_provider(&config).unwrap();
        assert_eq!(provider.provider_id(), "anthropic");
    }
}
