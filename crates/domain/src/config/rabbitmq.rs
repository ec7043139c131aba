use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Queue backend
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RabbitMqConfig {
    /// When false, the in-process FIFO queue is used instead.
    #[serde(default)]
    pub use_rabbitmq: bool,
    #[serde(default = "d_host")]
    pub host: String,
    #[serde(default = "d_port")]
    pub port: u16,
    #[serde(default = "d_user")]
    pub user: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "d_queue")]
    pub queue: String,
}

impl Default for RabbitMqConfig {
    fn default() -> Self {
        Self {
            use_rabbitmq: false,
            host: d_host(),
            port: d_port(),
            user: d_user(),
            password: None,
            queue: d_queue(),
        }
    }
}

fn d_host() -> String {
    "localhost".into()
}
fn d_port() -> u16 {
    5672
}
fn d_user() -> String {
    "guest".into()
}
fn d_queue() -> String {
    "coding_agent_tasks".into()
}
