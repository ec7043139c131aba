use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Planning coordinator (C8)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanningConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_strategy")]
    pub strategy: String,
    #[serde(default = "d_max_subtasks")]
    pub max_subtasks: usize,
    #[serde(default = "d_decomposition_level")]
    pub decomposition_level: String,
    #[serde(default)]
    pub reflection: ReflectionConfig,
    #[serde(default)]
    pub revision: RevisionConfig,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strategy: d_strategy(),
            max_subtasks: d_max_subtasks(),
            decomposition_level: d_decomposition_level(),
            reflection: ReflectionConfig::default(),
            revision: RevisionConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflectionConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_true")]
    pub trigger_on_error: bool,
    #[serde(default = "d_trigger_interval")]
    pub trigger_interval: usize,
    #[serde(default = "d_depth")]
    pub depth: String,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            trigger_on_error: true,
            trigger_interval: d_trigger_interval(),
            depth: d_depth(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevisionConfig {
    #[serde(default = "d_max_revisions")]
    pub max_revisions: usize,
}

impl Default for RevisionConfig {
    fn default() -> Self {
        Self {
            max_revisions: d_max_revisions(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_strategy() -> String {
    "decompose_then_execute".into()
}
fn d_max_subtasks() -> usize {
    10
}
fn d_decomposition_level() -> String {
    "standard".into()
}
fn d_trigger_interval() -> usize {
    3
}
fn d_depth() -> String {
    "standard".into()
}
fn d_max_revisions() -> usize {
    3
}
