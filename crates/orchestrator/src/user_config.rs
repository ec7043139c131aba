//! Per-user config overlay (C10, §4.3 "apply per-user config overlay"):
//! the consumer fetches an optional YAML fragment keyed by the task's
//! creator and deep-merges it over the base [`Config`] before constructing
//! that task's handler. The fetcher itself is an opaque external boundary
//! (§1 non-goal, much like the forge REST wrappers) — only its shape is
//! specified here.

use async_trait::async_trait;
use serde_yaml::Value;

use orc_domain::config::Config;
use orc_domain::error::{Error, Result};

/// Capability required from whatever sidecar or store holds per-user
/// overrides. Implementations are opaque to the core.
#[async_trait]
pub trait UserConfigFetcher: Send + Sync {
    /// Fetch the YAML overlay fragment for `user`, if one exists.
    async fn fetch(&self, user: &str) -> Result<Option<Value>>;
}

/// Default fetcher: no per-user overrides exist. Every task runs under the
/// base config unmodified.
pub struct NoopUserConfigFetcher;

#[async_trait]
impl UserConfigFetcher for NoopUserConfigFetcher {
    async fn fetch(&self, _user: &str) -> Result<Option<Value>> {
        Ok(None)
    }
}

/// Apply `user`'s overlay (if any) onto `base`, returning a new [`Config`].
/// The overlay is deep-merged as a YAML mapping: scalar and sequence keys
/// in the overlay replace the base's; nested mappings merge recursively.
/// A fetcher error or a malformed overlay is surfaced rather than silently
/// ignored — a consumer that cannot resolve a user's config should fail
/// that task, not silently run it under the wrong settings.
pub async fn apply_overlay(
    base: &Config,
    fetcher: &dyn UserConfigFetcher,
    user: &str,
) -> Result<Config> {
    let overlay = match fetcher.fetch(user).await? {
        Some(overlay) => overlay,
        None => return Ok(base.clone()),
    };

    let base_value = serde_yaml::to_value(base).map_err(Error::Yaml)?;
    let merged = merge(base_value, overlay);
    serde_yaml::from_value(merged).map_err(Error::Yaml)
}

fn merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Mapping(mut base_map), Value::Mapping(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged_val = match base_map.remove(&key) {
                    Some(base_val) => merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged_val);
            }
            Value::Mapping(base_map)
        }
        (_, overlay) => overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticFetcher(Option<Value>);

    #[async_trait]
    impl UserConfigFetcher for StaticFetcher {
        async fn fetch(&self, _user: &str) -> Result<Option<Value>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn overlay_merges_matching_keys_only() {
        let base = Config::default();
        let overlay: Value = serde_yaml::from_str("max_llm_process_num: 42").unwrap();
        let fetcher = StaticFetcher(Some(overlay));

        let merged = apply_overlay(&base, &fetcher, "alice").await.unwrap();
        assert_eq!(merged.max_llm_process_num, 42);
        assert_eq!(merged.planning.max_subtasks, base.planning.max_subtasks);
    }

    #[tokio::test]
    async fn no_overlay_returns_base_unmodified() {
        let base = Config::default();
        let fetcher = NoopUserConfigFetcher;
        let merged = apply_overlay(&base, &fetcher, "alice").await.unwrap();
        assert_eq!(merged.max_llm_process_num, base.max_llm_process_num);
    }

    #[tokio::test]
    async fn nested_overlay_merges_recursively() {
        let base = Config::default();
        let overlay: Value = serde_yaml::from_str("planning:\n  max_subtasks: 3\n").unwrap();
        let fetcher = StaticFetcher(Some(overlay));

        let merged = apply_overlay(&base, &fetcher, "bob").await.unwrap();
        assert_eq!(merged.planning.max_subtasks, 3);
        assert_eq!(merged.planning.enabled, base.planning.enabled);
    }
}
