//! Root configuration aggregator, mirroring the YAML document loaded from
//! `CONFIG_FILE`. Each `[MODULE]` of the spec owns one section here; the
//! precedence env var > YAML > built-in default is applied by [`Config::load`].

mod continuous;
mod context_storage;
mod forge;
mod issue_conversion;
mod llm;
mod planning;
mod rabbitmq;
mod signals;

pub use continuous::*;
pub use context_storage::*;
pub use forge::*;
pub use issue_conversion::*;
pub use llm::*;
pub use planning::*;
pub use rabbitmq::*;
pub use signals::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub task_source: TaskSource,
    #[serde(default)]
    pub github: Option<ForgeConfig>,
    #[serde(default)]
    pub gitlab: Option<ForgeConfig>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub rabbitmq: RabbitMqConfig,
    #[serde(default)]
    pub context_storage: ContextStorageConfig,
    #[serde(default)]
    pub pause_resume: PauseResumeConfig,
    #[serde(default)]
    pub task_stop: TaskStopConfig,
    #[serde(default)]
    pub comment_detection: CommentDetectionConfig,
    #[serde(default)]
    pub planning: PlanningConfig,
    #[serde(default)]
    pub continuous: ContinuousConfig,
    #[serde(default)]
    pub issue_conversion: IssueConversionConfig,
    #[serde(default = "d_max_llm_process_num")]
    pub max_llm_process_num: usize,
}

fn d_max_llm_process_num() -> usize {
    1000
}

impl Config {
    /// Load config from a YAML file, then overlay the documented env vars.
    /// Precedence: env var > YAML > built-in default.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: Config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&raw)?
        } else {
            tracing::warn!(path = %path.display(), "config file not found, using built-in defaults");
            Config::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables documented in the external-interfaces
    /// table: bot tokens, API URLs, model names, queue host/port/credentials,
    /// feature flags, database URL.
    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("BOT_TOKEN") {
            self.forge_config_mut().personal_access_token = Some(v);
        }
        if let Ok(v) = std::env::var("FORGE_API_URL") {
            self.forge_config_mut().api_url = Some(v);
        }
        if let Ok(v) = std::env::var("LLM_MODEL") {
            if let Some(active) = self.llm.providers.get_mut(&self.llm.provider) {
                active.model = v;
            }
        }
        if let Ok(v) = std::env::var("LLM_API_KEY") {
            if let Some(active) = self.llm.providers.get_mut(&self.llm.provider) {
                active.api_key = Some(v);
            }
        }
        if let Ok(v) = std::env::var("RABBITMQ_HOST") {
            self.rabbitmq.host = v;
        }
        if let Ok(v) = std::env::var("RABBITMQ_PORT") {
            if let Ok(p) = v.parse() {
                self.rabbitmq.port = p;
            }
        }
        if let Ok(v) = std::env::var("RABBITMQ_USER") {
            self.rabbitmq.user = v;
        }
        if let Ok(v) = std::env::var("RABBITMQ_PASSWORD") {
            self.rabbitmq.password = Some(v);
        }
        if let Ok(v) = std::env::var("USE_RABBITMQ") {
            self.rabbitmq.use_rabbitmq = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("CONTEXT_STORAGE_ENABLED") {
            self.context_storage.enabled = parse_bool(&v);
        }
        if let Ok(v) = std::env::var("DATABASE_URL") {
            self.context_storage.base_dir = std::path::PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("PLANNING_ENABLED") {
            self.planning.enabled = parse_bool(&v);
        }
    }

    fn forge_config_mut(&mut self) -> &mut ForgeConfig {
        match self.task_source {
            TaskSource::Github => self.github.get_or_insert_with(ForgeConfig::default),
            TaskSource::Gitlab => self.gitlab.get_or_insert_with(ForgeConfig::default),
        }
    }

    pub fn forge_config(&self) -> Option<&ForgeConfig> {
        match self.task_source {
            TaskSource::Github => self.github.as_ref(),
            TaskSource::Gitlab => self.gitlab.as_ref(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.forge_config().is_none() {
            return Err(Error::Config(format!(
                "missing `{:?}` section for selected task_source",
                self.task_source
            )));
        }
        if self.llm.active().is_none() {
            return Err(Error::Config(format!(
                "llm.provider `{}` has no matching entry under llm.providers",
                self.llm.provider
            )));
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(s.to_ascii_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_yaml() -> &'static str {
        r#"
task_source: github
github:
  owner: acme
  repo_or_project: widgets
  bot_name: coding-agent
llm:
  provider: openai
  providers:
    openai:
      model: gpt-4o
      base_url: https://api.openai.com/v1
"#
    }

    #[test]
    fn loads_minimal_yaml_with_defaults_filled_in() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(sample_yaml().as_bytes())
            .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.task_source, TaskSource::Github);
        assert_eq!(config.github.as_ref().unwrap().bot_label, "coding agent");
        assert_eq!(config.max_llm_process_num, 1000);
        assert!(config.context_storage.enabled);
    }

    #[test]
    fn missing_file_falls_back_to_defaults_but_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.yaml");
        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn env_override_wins_over_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::File::create(&path)
            .unwrap()
            .write_all(sample_yaml().as_bytes())
            .unwrap();

        std::env::set_var("RABBITMQ_HOST", "broker.internal");
        let config = Config::load(&path).unwrap();
        std::env::remove_var("RABBITMQ_HOST");

        assert_eq!(config.rabbitmq.host, "broker.internal");
    }
}
