use serde::{Deserialize, Serialize};

/// `issue_conversion` (§4.8 step 1): optional pre-check run before any
/// execution environment or strategy loop is started. For issue tasks,
/// attempts to open a draft PR/MR via `ForgeClient::open_draft_pr` and, on
/// success, finalizes the task as completed without ever calling the LLM.
/// Off by default — `ForgeClient::open_draft_pr`'s default implementation
/// declines, so most forge clients need not implement it at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueConversionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_draft_title_prefix")]
    pub draft_title_prefix: String,
}

impl Default for IssueConversionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            draft_title_prefix: d_draft_title_prefix(),
        }
    }
}

fn d_draft_title_prefix() -> String {
    "[draft] ".into()
}
