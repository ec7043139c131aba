//! Stop-on-unassign (§4.6): polls the forge's current assignee list for a
//! task and, once the bot is no longer assigned, drives the terminal
//! "stopped" transition. Unlike pause, stop is terminal — there is no
//! resume from it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};

use orc_domain::config::ApiRetryConfig;
use orc_domain::error::Result;
use orc_domain::task::TaskKey;
use orc_forge::ForgeClient;

pub struct TaskStopManager {
    forge: Arc<dyn ForgeClient>,
    bot_name: String,
    min_check_interval: Duration,
    retry: ApiRetryConfig,
    last_check: Mutex<Option<Instant>>,
}

impl TaskStopManager {
    pub fn new(
        forge: Arc<dyn ForgeClient>,
        bot_name: impl Into<String>,
        min_check_interval_seconds: u64,
        retry: ApiRetryConfig,
    ) -> Self {
        Self {
            forge,
            bot_name: bot_name.into(),
            min_check_interval: Duration::from_secs(min_check_interval_seconds),
            retry,
            last_check: Mutex::new(None),
        }
    }

    /// True once the bot's name is no longer in the task's assignee list.
    /// Re-fetches the assignee list from the forge no more often than
    /// `min_check_interval_seconds`; calls in between return the cached
    /// "not stopped" answer without making a network call.
    pub async fn should_stop(&self, key: &TaskKey) -> Result<bool> {
        {
            let mut last = self.last_check.lock();
            if let Some(at) = *last {
                if at.elapsed() < self.min_check_interval {
                    return Ok(false);
                }
            }
            *last = Some(Instant::now());
        }

        let assignees = self.fetch_assignees_with_backoff(key).await?;
        Ok(!assignees.iter().any(|a| a == &self.bot_name))
    }

    async fn fetch_assignees_with_backoff(&self, key: &TaskKey) -> Result<Vec<String>> {
        let mut delay = Duration::from_secs(self.retry.initial_delay_seconds);
        let max_delay = Duration::from_secs(self.retry.max_delay_seconds);
        let mut attempt = 0;

        loop {
            match self.forge.get_assignees(key).await {
                Ok(assignees) => return Ok(assignees),
                Err(err) if attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(
                        task_key = %key,
                        attempt,
                        max_retries = self.retry.max_retries,
                        error = %err,
                        "assignee check failed, retrying after backoff"
                    );
                    tokio::time::sleep(delay).await;
                    let next = delay.mul_f64(self.retry.exponential_base);
                    delay = next.min(max_delay);
                }
                Err(err) => {
                    debug!(task_key = %key, "assignee check exhausted retries");
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKind};
    use orc_forge::MockForgeClient;

    fn key() -> TaskKey {
        TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1)
    }

    #[tokio::test]
    async fn should_stop_false_while_bot_still_assigned() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(), "title", "body", vec![], "alice");
        forge.set_assignees(&key(), vec!["agent-bot".to_string()]);
        let manager = TaskStopManager::new(forge, "agent-bot", 0, ApiRetryConfig::default());
        assert!(!manager.should_stop(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn should_stop_true_once_bot_unassigned() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(), "title", "body", vec![], "alice");
        forge.set_assignees(&key(), vec!["someone-else".to_string()]);
        let manager = TaskStopManager::new(forge, "agent-bot", 0, ApiRetryConfig::default());
        assert!(manager.should_stop(&key()).await.unwrap());
    }

    #[tokio::test]
    async fn rate_limit_skips_refetch_within_interval() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(), "title", "body", vec![], "alice");
        forge.set_assignees(&key(), vec!["someone-else".to_string()]);
        let manager = TaskStopManager::new(forge.clone(), "agent-bot", 3600, ApiRetryConfig::default());

        assert!(manager.should_stop(&key()).await.unwrap());
        // Bot gets reassigned, but the cached check should not re-fetch yet.
        forge.set_assignees(&key(), vec!["agent-bot".to_string()]);
        assert!(!manager.should_stop(&key()).await.unwrap());
    }
}
