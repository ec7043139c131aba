use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Context store / compressor (C4/C5)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextStorageConfig {
    /// When false, the Legacy in-memory strategy is used instead.
    #[serde(default = "d_true")]
    pub enabled: bool,
    #[serde(default = "d_base_dir")]
    pub base_dir: PathBuf,
    /// Fraction of `context_length` at which compression triggers.
    #[serde(default = "d_threshold")]
    pub compression_threshold: f64,
    /// Completed context directories older than this are purged by the
    /// producer's retention sweep.
    #[serde(default = "d_cleanup_days")]
    pub cleanup_days: u32,
    #[serde(default = "d_summary_prompt")]
    pub summary_prompt: String,
    /// Number of recent user/assistant/tool messages retained verbatim
    /// across a compression rewrite. Open question in the spec; default 5.
    #[serde(default = "d_retained_tail")]
    pub retained_tail: usize,
}

impl Default for ContextStorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_dir: d_base_dir(),
            compression_threshold: d_threshold(),
            cleanup_days: d_cleanup_days(),
            summary_prompt: d_summary_prompt(),
            retained_tail: d_retained_tail(),
        }
    }
}

fn d_true() -> bool {
    true
}
fn d_base_dir() -> PathBuf {
    PathBuf::from("./contexts")
}
fn d_threshold() -> f64 {
    0.7
}
fn d_cleanup_days() -> u32 {
    30
}
fn d_summary_prompt() -> String {
    "Summarize the conversation above so far, preserving goals, decisions, \
     and outstanding steps. Be concise but keep anything a future turn would \
     need to continue the work."
        .into()
}
fn d_retained_tail() -> usize {
    5
}
