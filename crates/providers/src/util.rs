//! Shared utility functions for provider adapters.

use orc_domain::config::ProviderSettings;
use orc_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeout errors map to [`Error::Timeout`]; everything else maps to
/// [`Error::Http`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Resolve the API key for a provider from its [`ProviderSettings`].
///
/// Precedence: the inline `api_key` field, then the environment variable
/// named by `api_key_env`.
pub fn resolve_api_key(settings: &ProviderSettings) -> Result<String> {
    if let Some(ref key) = settings.api_key {
        return Ok(key.clone());
    }
    if let Some(ref env_var) = settings.api_key_env {
        return std::env::var(env_var).map_err(|_| {
            Error::Auth(format!(
                "environment variable '{}' not set or not valid UTF-8",
                env_var
            ))
        });
    }
    Err(Error::Auth(
        "no API key configured: set 'api_key' or 'api_key_env' on the provider".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_plaintext() {
        let settings = ProviderSettings {
            model: "m".into(),
            base_url: "http://x".into(),
            api_key: Some("sk-test-123".into()),
            api_key_env: None,
            context_length: 128_000,
            max_token: 4096,
        };
        assert_eq!(resolve_api_key(&settings).unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "ORC_TEST_RESOLVE_ENV_KEY_1234";
        std::env::set_var(var_name, "env-secret-value");
        let settings = ProviderSettings {
            model: "m".into(),
            base_url: "http://x".into(),
            api_key: None,
            api_key_env: Some(var_name.into()),
            context_length: 128_000,
            max_token: 4096,
        };
        assert_eq!(resolve_api_key(&settings).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_env_var_missing() {
        let settings = ProviderSettings {
            model: "m".into(),
            base_url: "http://x".into(),
            api_key: None,
            api_key_env: Some("ORC_TEST_NONEXISTENT_VAR_8888".into()),
            context_length: 128_000,
            max_token: 4096,
        };
        let err = resolve_api_key(&settings).unwrap_err();
        assert!(err.to_string().contains("ORC_TEST_NONEXISTENT_VAR_8888"));
    }

    #[test]
    fn resolve_api_key_no_config() {
        let settings = ProviderSettings {
            model: "m".into(),
            base_url: "http://x".into(),
            api_key: None,
            api_key_env: None,
            context_length: 128_000,
            max_token: 4096,
        };
        let err = resolve_api_key(&settings).unwrap_err();
        assert!(err.to_string().contains("no API key configured"));
    }

    #[test]
    fn resolve_api_key_plaintext_takes_precedence_over_env() {
        let var_name = "ORC_TEST_PRECEDENCE_KEY_7777";
        std::env::set_var(var_name, "env-loses");
        let settings = ProviderSettings {
            model: "m".into(),
            base_url: "http://x".into(),
            api_key: Some("plaintext-wins".into()),
            api_key_env: Some(var_name.into()),
            context_length: 128_000,
            max_token: 4096,
        };
        assert_eq!(resolve_api_key(&settings).unwrap(), "plaintext-wins");
        std::env::remove_var(var_name);
    }
}
