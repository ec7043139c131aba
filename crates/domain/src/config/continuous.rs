use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Continuous loop cadence (C9)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ContinuousConfig {
    #[serde(default)]
    pub producer: ProducerContinuousConfig,
    #[serde(default)]
    pub consumer: ConsumerContinuousConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProducerContinuousConfig {
    #[serde(default = "d_interval_minutes")]
    pub interval_minutes: u64,
    #[serde(default)]
    pub delay_first_run: bool,
}

impl Default for ProducerContinuousConfig {
    fn default() -> Self {
        Self {
            interval_minutes: d_interval_minutes(),
            delay_first_run: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerContinuousConfig {
    #[serde(default = "d_queue_timeout_seconds")]
    pub queue_timeout_seconds: u64,
    #[serde(default)]
    pub min_interval_seconds: u64,
}

impl Default for ConsumerContinuousConfig {
    fn default() -> Self {
        Self {
            queue_timeout_seconds: d_queue_timeout_seconds(),
            min_interval_seconds: 0,
        }
    }
}

fn d_interval_minutes() -> u64 {
    5
}
fn d_queue_timeout_seconds() -> u64 {
    5
}
