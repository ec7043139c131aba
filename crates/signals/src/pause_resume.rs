//! Pause/resume (§4.6): a single shared signal file, polled at checkpoints.
//! Presence means "pause every task reaching a checkpoint"; the handler
//! performs the actual pause transition (write `task_state.json`, rename
//! `running/` → `paused/`, post a comment, swap labels) — this manager only
//! observes the signal.

use std::sync::Arc;

use crate::source::SignalSource;

pub struct PauseResumeManager {
    source: Arc<dyn SignalSource>,
}

impl PauseResumeManager {
    pub fn new(source: Arc<dyn SignalSource>) -> Self {
        Self { source }
    }

    /// Checked at every loop/tool-call/planning-transition checkpoint.
    /// Never checked mid-tool-call or mid-LLM-call.
    pub fn should_pause(&self) -> bool {
        self.source.is_present()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySignalSource;

    #[test]
    fn should_pause_reflects_underlying_signal() {
        let signal = InMemorySignalSource::new();
        let manager = PauseResumeManager::new(Arc::new(signal.clone()));
        assert!(!manager.should_pause());
        signal.set(true);
        assert!(manager.should_pause());
    }
}
