use serde::{Deserialize, Serialize};

use crate::task::Platform;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Task source selection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskSource {
    #[default]
    Github,
    Gitlab,
}

impl From<TaskSource> for Platform {
    fn from(t: TaskSource) -> Self {
        match t {
            TaskSource::Github => Platform::Github,
            TaskSource::Gitlab => Platform::Gitlab,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Forge identity & labels
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One `<forge>` section (the key is `github` or `gitlab`, selected by
/// `task_source`). Holds the repo identity, label vocabulary, and
/// credentials used by the `ForgeClient` boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    pub owner: String,
    /// `repo` for GitHub, `project_id` for GitLab.
    pub repo_or_project: String,
    #[serde(default = "d_bot_label")]
    pub bot_label: String,
    #[serde(default = "d_processing_label")]
    pub processing_label: String,
    #[serde(default = "d_done_label")]
    pub done_label: String,
    #[serde(default = "d_paused_label")]
    pub paused_label: String,
    #[serde(default = "d_stopped_label")]
    pub stopped_label: String,
    /// Saved search/label query used to enumerate candidate work items.
    #[serde(default = "d_query")]
    pub query: String,
    pub bot_name: String,
    #[serde(default)]
    pub personal_access_token: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo_or_project: String::new(),
            bot_label: d_bot_label(),
            processing_label: d_processing_label(),
            done_label: d_done_label(),
            paused_label: d_paused_label(),
            stopped_label: d_stopped_label(),
            query: d_query(),
            bot_name: String::new(),
            personal_access_token: None,
            api_url: None,
        }
    }
}

fn d_bot_label() -> String {
    "coding agent".into()
}
fn d_processing_label() -> String {
    "coding agent processing".into()
}
fn d_done_label() -> String {
    "coding agent done".into()
}
fn d_paused_label() -> String {
    "coding agent paused".into()
}
fn d_stopped_label() -> String {
    "coding agent stopped".into()
}
fn d_query() -> String {
    "coding agent".into()
}
