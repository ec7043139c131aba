use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Pause / resume (C6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PauseResumeConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_signal_file")]
    pub signal_file: PathBuf,
    #[serde(default = "d_check_interval")]
    pub check_interval: u64,
    #[serde(default = "d_expiry_days")]
    pub paused_task_expiry_days: u32,
}

impl Default for PauseResumeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            signal_file: d_signal_file(),
            check_interval: d_check_interval(),
            paused_task_expiry_days: d_expiry_days(),
        }
    }
}

fn d_signal_file() -> PathBuf {
    PathBuf::from("pause_signal")
}
fn d_check_interval() -> u64 {
    1
}
fn d_expiry_days() -> u32 {
    14
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stop-on-unassign (C6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStopConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_check_interval")]
    pub check_interval: u64,
    #[serde(default = "d_min_check_interval_seconds")]
    pub min_check_interval_seconds: u64,
    #[serde(default = "d_stopped_label")]
    pub stopped_label: String,
    /// Whether a stopped task's running directory is deleted (`true`) or
    /// archived under `completed/` (`false`, the spec's documented default).
    #[serde(default)]
    pub cleanup_context: bool,
    #[serde(default)]
    pub api_retry: ApiRetryConfig,
}

impl Default for TaskStopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: d_check_interval(),
            min_check_interval_seconds: d_min_check_interval_seconds(),
            stopped_label: d_stopped_label(),
            cleanup_context: false,
            api_retry: ApiRetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRetryConfig {
    #[serde(default = "d_max_retries")]
    pub max_retries: u32,
    #[serde(default = "d_initial_delay")]
    pub initial_delay_seconds: u64,
    #[serde(default = "d_max_delay")]
    pub max_delay_seconds: u64,
    #[serde(default = "d_exp_base")]
    pub exponential_base: f64,
}

impl Default for ApiRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: d_max_retries(),
            initial_delay_seconds: d_initial_delay(),
            max_delay_seconds: d_max_delay(),
            exponential_base: d_exp_base(),
        }
    }
}

fn d_min_check_interval_seconds() -> u64 {
    30
}
fn d_stopped_label() -> String {
    "coding agent stopped".into()
}
fn d_max_retries() -> u32 {
    3
}
fn d_initial_delay() -> u64 {
    1
}
fn d_max_delay() -> u64 {
    30
}
fn d_exp_base() -> f64 {
    2.0
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Comment detection (C6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentDetectionConfig {
    #[serde(default = "d_true")]
    pub enabled: bool,
    pub bot_username: String,
    #[serde(default = "d_check_interval")]
    pub check_interval: u64,
}

impl Default for CommentDetectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bot_username: String::new(),
            check_interval: d_check_interval(),
        }
    }
}

fn d_true() -> bool {
    true
}
