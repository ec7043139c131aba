//! `TaskContextManager`: owns a task's directory lifecycle
//! (`running/` → `paused/` → `completed/`) and its row in `tasks.db`
//! (§4.4, §3 directory invariants).
//!
//! The manager does not know about forges or signal managers — those live
//! one layer up. Its only job is to keep the three context stores, the
//! on-disk metadata, and the `tasks.db` row consistent with the directory
//! a task's files currently live in.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use orc_domain::error::{Error, Result};
use orc_domain::task::TaskKey;

use crate::db::{Database, TaskStatus};
use crate::message_store::MessageStore;
use crate::metadata::Metadata;
use crate::planning_store::PlanningStore;
use crate::summary_store::SummaryStore;
use crate::task_state::TaskState;
use crate::tool_store::ToolStore;

/// Root layout under `<base_dir>`.
pub struct ContextRoots {
    pub base_dir: PathBuf,
}

impl ContextRoots {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    pub fn running(&self, uuid: Uuid) -> PathBuf {
        self.base_dir.join("running").join(uuid.to_string())
    }

    pub fn paused(&self, uuid: Uuid) -> PathBuf {
        self.base_dir.join("paused").join(uuid.to_string())
    }

    pub fn completed(&self, uuid: Uuid) -> PathBuf {
        self.base_dir.join("completed").join(uuid.to_string())
    }
}

/// A task's open context directory plus its `tasks.db` row handle.
pub struct TaskContextManager {
    roots: ContextRoots,
    db: Arc<Database>,
    uuid: Uuid,
    task_key: TaskKey,
    user: String,
    current_dir: PathBuf,
    pub messages: MessageStore,
    pub summaries: SummaryStore,
    pub tools: ToolStore,
    pub planning: PlanningStore,
}

impl TaskContextManager {
    /// Start a brand-new task: create `running/<uuid>/`, write `metadata.json`,
    /// and upsert the `tasks.db` row.
    pub fn init_fresh(
        base_dir: impl Into<PathBuf>,
        db: Arc<Database>,
        task_key: TaskKey,
        uuid: Uuid,
        user: &str,
        provider: &str,
        model: &str,
        context_length: u32,
    ) -> Result<Self> {
        let roots = ContextRoots::new(base_dir);
        let dir = roots.running(uuid);
        std::fs::create_dir_all(&dir)?;

        let metadata = Metadata::new(task_key.clone(), uuid, provider, model, context_length, user);
        metadata.write(&dir)?;

        db.upsert_running(uuid, &task_key, user, provider, model)?;

        let messages = MessageStore::open(&dir)?;
        let summaries = SummaryStore::open(&dir);
        let tools = ToolStore::open(&dir);
        let planning = PlanningStore::open(&dir, uuid)?;

        Ok(Self {
            roots,
            db,
            uuid,
            task_key,
            user: user.to_string(),
            current_dir: dir,
            messages,
            summaries,
            tools,
            planning,
        })
    }

    /// Resume a previously paused task: move `paused/<uuid>/` back to
    /// `running/<uuid>/`, bump `resume_count`, re-upsert the `tasks.db` row
    /// as running, and reopen the stores atop the moved directory.
    ///
    /// Returns the recovered [`TaskState`] so the caller (handler / planning
    /// coordinator) can restore `planning_state` / `comment_state`.
    pub fn resume_from_paused(
        base_dir: impl Into<PathBuf>,
        db: Arc<Database>,
        uuid: Uuid,
    ) -> Result<(Self, TaskState)> {
        let roots = ContextRoots::new(base_dir);
        let paused_dir = roots.paused(uuid);
        if !paused_dir.exists() {
            return Err(Error::Other(format!("no paused context directory for {uuid}")));
        }

        let mut state = TaskState::read(&paused_dir)?;
        state.resume_count += 1;

        let metadata = Metadata::read(&paused_dir)?;
        let running_dir = roots.running(uuid);
        if let Some(parent) = running_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&paused_dir, &running_dir)?;

        // task_state.json is pause-only metadata; drop it from the now-running dir.
        let stale_state_path = running_dir.join("task_state.json");
        if stale_state_path.exists() {
            std::fs::remove_file(&stale_state_path)?;
        }

        db.upsert_running(uuid, &state.task_key, &state.user, &metadata.provider, &metadata.model)?;

        let messages = MessageStore::open(&running_dir)?;
        let summaries = SummaryStore::open(&running_dir);
        let tools = ToolStore::open(&running_dir);
        let planning = PlanningStore::open(&running_dir, uuid)?;

        let manager = Self {
            roots,
            db,
            uuid,
            task_key: state.task_key.clone(),
            user: state.user.clone(),
            current_dir: running_dir,
            messages,
            summaries,
            tools,
            planning,
        };

        Ok((manager, state))
    }

    pub fn current_dir(&self) -> &Path {
        &self.current_dir
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn task_key(&self) -> &TaskKey {
        &self.task_key
    }

    pub fn update_llm_statistics(&self, tokens_used: u64) -> Result<()> {
        self.db.increment_llm_call(self.uuid, tokens_used)
    }

    pub fn update_tool_statistics(&self) -> Result<()> {
        self.db.increment_tool_call(self.uuid)
    }

    pub fn record_compression(&self) -> Result<()> {
        self.db.increment_compression(self.uuid)
    }

    /// Pause the task: persist `task_state.json` into the (still-running)
    /// directory, then rename `running/<uuid>/` → `paused/<uuid>/`.
    ///
    /// Per §3's crash-safety invariant, the directory is the source of
    /// truth; `tasks.db` keeps the `running` status across a pause (pausing
    /// is not a terminal `tasks.db` state), so no `db` write happens here.
    pub fn pause(&self, state: &TaskState) -> Result<()> {
        state.write(&self.current_dir)?;
        let paused_dir = self.roots.paused(self.uuid);
        if let Some(parent) = paused_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&self.current_dir, &paused_dir)?;
        Ok(())
    }

    /// Finalize a successful task: update `tasks.db` status to `completed`
    /// before renaming `running/<uuid>/` → `completed/<uuid>/`, so a crash
    /// between the two leaves the directory, not the database, as the
    /// thing an operator must reconcile.
    pub fn complete(&self) -> Result<()> {
        self.db.set_status(self.uuid, TaskStatus::Completed, None)?;
        let completed_dir = self.roots.completed(self.uuid);
        if let Some(parent) = completed_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&self.current_dir, &completed_dir)?;
        Ok(())
    }

    /// Finalize a failed task: same ordering as [`Self::complete`], status
    /// `failed` with `error_message` set.
    pub fn fail(&self, error_message: &str) -> Result<()> {
        self.db.set_status(self.uuid, TaskStatus::Failed, Some(error_message))?;
        let completed_dir = self.roots.completed(self.uuid);
        if let Some(parent) = completed_dir.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(&self.current_dir, &completed_dir)?;
        Ok(())
    }
}

/// Retention sweep (§3: `tasks.db` rows are never deleted until their
/// directory has moved to `completed/` and age exceeds the configured
/// retention): remove each past-retention task's `completed/<uuid>/`
/// directory, then its `tasks.db` row. Directory removal is best-effort —
/// a task already cleaned up manually (or never archived, e.g. a stopped
/// task with `cleanup_context: true`) does not block the row deletion.
pub fn sweep_completed_retention(base_dir: impl Into<PathBuf>, db: &Database, retention_days: u32) -> Result<u64> {
    let roots = ContextRoots::new(base_dir);
    let uuids = db.list_completed_older_than(retention_days)?;
    for uuid in &uuids {
        let dir = roots.completed(*uuid);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
        }
    }
    db.delete_completed_older_than(retention_days)
}
