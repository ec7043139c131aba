//! Producer driver (C9a, §4.2): turns forge state into queue entries.
//! Runs as its own process, singleton-enforced by [`ExclusionLock`].

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use uuid::Uuid;

use orc_context_store::{sweep_completed_retention, Database, TaskState, TaskStatus};
use orc_domain::error::{Error, Result};
use orc_domain::task::TaskDescriptor;
use orc_forge::{ForgeClient, ForgeTask};
use orc_queue::TaskQueue;
use orc_signals::SignalSource;

use crate::exclusion_lock::ExclusionLock;
use crate::health::touch_health_file;

fn queue_err(e: orc_queue::QueueError) -> Error {
    Error::Other(e.to_string())
}

pub struct ProducerDriver {
    forge: Arc<dyn ForgeClient>,
    queue: Arc<dyn TaskQueue>,
    db: Option<Arc<Database>>,
    base_dir: PathBuf,
    bot_label: String,
    processing_label: String,
    query: String,
    /// `context_storage.cleanup_days`: completed tasks older than this are
    /// purged (directory + `tasks.db` row) on every sweep. Only runs when a
    /// database handle was supplied (context storage enabled).
    cleanup_days: u32,
    /// `pause_resume.paused_task_expiry_days`: a paused task whose
    /// `paused_at` is older than this is no longer re-enqueued and is
    /// archived as failed instead (§7: "paused task directory corruption" —
    /// an abandoned pause is the same operator-visible shape).
    pause_expiry_days: u32,
}

impl ProducerDriver {
    pub fn new(
        forge: Arc<dyn ForgeClient>,
        queue: Arc<dyn TaskQueue>,
        base_dir: impl Into<PathBuf>,
        bot_label: impl Into<String>,
        processing_label: impl Into<String>,
        query: impl Into<String>,
    ) -> Self {
        Self {
            forge,
            queue,
            db: None,
            base_dir: base_dir.into(),
            bot_label: bot_label.into(),
            processing_label: processing_label.into(),
            query: query.into(),
            cleanup_days: 30,
            pause_expiry_days: 14,
        }
    }

    /// Enable the retention sweep (§3: `tasks.db` rows are never deleted
    /// until their directory has moved to `completed/` and age exceeds
    /// `context_storage.cleanup_days`).
    pub fn with_retention(mut self, db: Arc<Database>, cleanup_days: u32) -> Self {
        self.db = Some(db);
        self.cleanup_days = cleanup_days;
        self
    }

    /// Set `pause_resume.paused_task_expiry_days`.
    pub fn with_pause_expiry(mut self, pause_expiry_days: u32) -> Self {
        self.pause_expiry_days = pause_expiry_days;
        self
    }

    fn lock_path(&self) -> PathBuf {
        self.base_dir.join("producer.lock")
    }

    /// One sweep: re-enqueue paused tasks whose forge object still exists,
    /// then query for fresh work and claim it. Returns cleanly (without
    /// enqueuing anything) if another producer already holds the
    /// exclusion lock.
    pub async fn run_once(&self) -> Result<()> {
        let lock = match ExclusionLock::try_acquire(self.lock_path())? {
            Some(lock) => lock,
            None => {
                info!("producer exclusion lock held by another process, exiting");
                return Ok(());
            }
        };

        self.requeue_paused().await?;
        self.enqueue_new_work().await?;
        self.sweep_retention()?;

        drop(lock);
        Ok(())
    }

    fn sweep_retention(&self) -> Result<()> {
        let Some(db) = &self.db else { return Ok(()) };
        let removed = sweep_completed_retention(&self.base_dir, db, self.cleanup_days)?;
        if removed > 0 {
            info!(removed, cleanup_days = self.cleanup_days, "purged completed tasks past retention");
        }
        Ok(())
    }

    async fn requeue_paused(&self) -> Result<()> {
        let paused_root = self.base_dir.join("paused");
        if !paused_root.exists() {
            return Ok(());
        }

        for entry in std::fs::read_dir(&paused_root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let uuid = match Uuid::parse_str(&entry.file_name().to_string_lossy()) {
                Ok(u) => u,
                Err(_) => continue,
            };
            let state = match TaskState::read(&entry.path()) {
                Ok(s) => s,
                Err(e) => {
                    warn!(uuid = %uuid, error = %e, "skipping paused directory with unreadable task_state.json");
                    continue;
                }
            };

            let age = chrono::Utc::now().signed_duration_since(state.paused_at);
            if age > chrono::Duration::days(self.pause_expiry_days as i64) {
                warn!(uuid = %uuid, task_key = %state.task_key, days = age.num_days(), "paused task past expiry, archiving instead of re-enqueuing");
                self.archive_expired_pause(&entry.path(), uuid, &state)?;
                continue;
            }

            match self.forge.get_task(&state.task_key).await {
                Ok(_) => {
                    let descriptor = TaskDescriptor::resumed(
                        state.task_key.clone(),
                        uuid,
                        state.user.clone(),
                        entry.path().to_string_lossy().to_string(),
                    );
                    self.queue.enqueue(descriptor).await.map_err(queue_err)?;
                    info!(uuid = %uuid, task_key = %state.task_key, "re-enqueued paused task");
                }
                Err(e) => {
                    warn!(uuid = %uuid, task_key = %state.task_key, error = %e, "paused task's forge object no longer reachable, not re-enqueuing");
                }
            }
        }
        Ok(())
    }

    /// Archive an abandoned paused task: move its directory straight to
    /// `completed/` (skipping `running/` entirely, since it is never
    /// resumed) and, if context storage is enabled, mark the `tasks.db` row
    /// `failed` — it was left `running` across the pause per §3.
    fn archive_expired_pause(&self, paused_dir: &Path, uuid: Uuid, state: &TaskState) -> Result<()> {
        let completed_dir = self.base_dir.join("completed").join(uuid.to_string());
        if let Some(parent) = completed_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(paused_dir, &completed_dir)?;
        if let Some(db) = &self.db {
            db.set_status(uuid, TaskStatus::Failed, Some("paused task expired without resuming"))?;
        }
        info!(uuid = %uuid, task_key = %state.task_key, "archived expired paused task");
        Ok(())
    }

    async fn enqueue_new_work(&self) -> Result<()> {
        let keys = self.forge.list_tasks(&self.query).await?;
        for key in keys {
            let probe = TaskDescriptor::fresh(key.clone(), "");
            let task = ForgeTask::reconstruct(self.forge.clone(), probe).await?;

            let grabbed = task.prepare(&self.bot_label, &self.processing_label).await?;
            if !grabbed {
                continue;
            }

            let user = task.details().creator.clone();
            let descriptor = TaskDescriptor::fresh(key, user);
            self.queue.enqueue(descriptor).await.map_err(queue_err)?;
            info!(task_key = %task.key(), "enqueued new task");
        }
        Ok(())
    }

    /// Loop `run_once()`, sleeping `interval_minutes` between sweeps while
    /// sampling the pause signal every second; touches `health_path` once
    /// per outer iteration and exits cleanly once the pause signal fires.
    pub async fn run_continuous(
        &self,
        interval_minutes: u64,
        delay_first_run: bool,
        pause: &dyn SignalSource,
        health_path: &Path,
    ) -> Result<()> {
        if delay_first_run && sample_sleep(Duration::from_secs(interval_minutes * 60), pause).await {
            return Ok(());
        }

        loop {
            self.run_once().await?;
            touch_health_file(health_path)?;
            if sample_sleep(Duration::from_secs(interval_minutes * 60), pause).await {
                return Ok(());
            }
        }
    }
}

/// Sleep for `total`, checking `pause` once a second. Returns `true` the
/// moment the pause signal is observed (cutting the sleep short), `false`
/// if the full duration elapsed without it firing.
async fn sample_sleep(total: Duration, pause: &dyn SignalSource) -> bool {
    let step = Duration::from_secs(1);
    let mut elapsed = Duration::ZERO;
    while elapsed < total {
        if pause.is_present() {
            return true;
        }
        let remaining = total - elapsed;
        let this_step = step.min(remaining);
        tokio::time::sleep(this_step).await;
        elapsed += this_step;
    }
    pause.is_present()
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_context_store::PausedStatus;
    use orc_domain::task::{Platform, TaskKind};
    use orc_forge::MockForgeClient;
    use orc_queue::InMemoryQueue;
    use orc_signals::InMemorySignalSource;

    fn key(n: u64) -> orc_domain::task::TaskKey {
        orc_domain::task::TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", n)
    }

    #[tokio::test]
    async fn run_once_claims_labeled_tasks_and_enqueues_them() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(1), "t1", "b1", vec!["coding agent".into()], "alice");
        forge.seed_task(key(2), "t2", "b2", vec!["unrelated".into()], "bob");

        let queue = Arc::new(InMemoryQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let driver = ProducerDriver::new(
            forge.clone(),
            queue.clone(),
            dir.path(),
            "coding agent",
            "coding agent processing",
            "coding agent",
        );

        driver.run_once().await.unwrap();

        assert_eq!(queue.len(), 1);
        let details = forge.get_task(&key(1)).await.unwrap();
        assert!(details.labels.contains(&"coding agent processing".to_string()));
    }

    #[tokio::test]
    async fn run_once_reenqueues_paused_tasks_whose_forge_object_exists() {
        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(5), "paused-task", "body", vec![], "carol");

        let queue = Arc::new(InMemoryQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let uuid = Uuid::new_v4();
        let paused_dir = dir.path().join("paused").join(uuid.to_string());
        std::fs::create_dir_all(&paused_dir).unwrap();

        let state = TaskState {
            task_key: key(5),
            uuid,
            user: "carol".into(),
            paused_at: chrono::Utc::now(),
            status: PausedStatus::Paused,
            resume_count: 0,
            context_path: "paused".into(),
            planning_state: None,
            comment_state: None,
        };
        state.write(&paused_dir).unwrap();

        let driver = ProducerDriver::new(forge, queue.clone(), dir.path(), "coding agent", "coding agent processing", "coding agent");
        driver.run_once().await.unwrap();

        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn run_once_archives_paused_tasks_past_expiry_instead_of_reenqueuing() {
        use orc_context_store::Database;

        let forge = Arc::new(MockForgeClient::new());
        forge.seed_task(key(6), "stale-paused-task", "body", vec![], "erin");

        let queue = Arc::new(InMemoryQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());
        let uuid = Uuid::new_v4();
        let paused_dir = dir.path().join("paused").join(uuid.to_string());
        std::fs::create_dir_all(&paused_dir).unwrap();

        db.upsert_running(uuid, &key(6), "erin", "anthropic", "claude-sonnet-4-20250514").unwrap();

        let state = TaskState {
            task_key: key(6),
            uuid,
            user: "erin".into(),
            paused_at: chrono::Utc::now() - chrono::Duration::days(30),
            status: PausedStatus::Paused,
            resume_count: 0,
            context_path: "paused".into(),
            planning_state: None,
            comment_state: None,
        };
        state.write(&paused_dir).unwrap();

        let driver = ProducerDriver::new(forge, queue.clone(), dir.path(), "coding agent", "coding agent processing", "coding agent")
            .with_retention(db.clone(), 30)
            .with_pause_expiry(14);
        driver.run_once().await.unwrap();

        assert_eq!(queue.len(), 0);
        assert!(!paused_dir.exists());
        assert!(dir.path().join("completed").join(uuid.to_string()).exists());
        let row = db.get(uuid).unwrap().unwrap();
        assert_eq!(row.status, orc_context_store::TaskStatus::Failed);
    }

    #[tokio::test]
    async fn run_once_sweeps_retention_when_enabled() {
        use orc_context_store::{Database, TaskContextManager};

        let forge = Arc::new(MockForgeClient::new());
        let queue = Arc::new(InMemoryQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(Database::open_in_memory().unwrap());

        let uuid = Uuid::new_v4();
        let ctx = TaskContextManager::init_fresh(dir.path(), db.clone(), key(9), uuid, "dave", "anthropic", "claude-sonnet-4-20250514", 200_000).unwrap();
        ctx.complete().unwrap();
        db.backdate_for_test(uuid, 60).unwrap();

        let driver = ProducerDriver::new(forge, queue, dir.path(), "coding agent", "coding agent processing", "coding agent")
            .with_retention(db.clone(), 30);
        driver.run_once().await.unwrap();

        assert!(!dir.path().join("completed").join(uuid.to_string()).exists());
        assert!(db.get(uuid).unwrap().is_none());
    }

    #[tokio::test]
    async fn second_run_once_is_a_noop_while_first_holds_the_lock() {
        let forge = Arc::new(MockForgeClient::new());
        let queue = Arc::new(InMemoryQueue::new());
        let dir = tempfile::tempdir().unwrap();
        let driver = ProducerDriver::new(forge, queue, dir.path(), "coding agent", "coding agent processing", "coding agent");

        let held = ExclusionLock::try_acquire(driver.lock_path()).unwrap();
        assert!(held.is_some());
        driver.run_once().await.unwrap();
        drop(held);
    }

    #[tokio::test]
    async fn sample_sleep_returns_immediately_once_paused() {
        let pause = InMemorySignalSource::new();
        pause.set(true);
        let paused = sample_sleep(Duration::from_secs(30), &pause).await;
        assert!(paused);
    }
}
