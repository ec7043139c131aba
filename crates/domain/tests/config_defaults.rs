use orc_domain::config::{Config, TaskSource};

#[test]
fn default_max_llm_process_num_is_1000() {
    let config = Config::default();
    assert_eq!(config.max_llm_process_num, 1000);
}

#[test]
fn default_task_source_is_github() {
    let config = Config::default();
    assert_eq!(config.task_source, TaskSource::Github);
}

#[test]
fn explicit_gitlab_task_source_parses_from_yaml() {
    let yaml = r#"
task_source: gitlab
gitlab:
  owner: acme
  repo_or_project: "42"
  bot_name: coding-agent
llm:
  provider: anthropic
  providers:
    anthropic:
      model: claude-sonnet
      base_url: https://api.anthropic.com
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.task_source, TaskSource::Gitlab);
    assert_eq!(config.gitlab.unwrap().owner, "acme");
}
