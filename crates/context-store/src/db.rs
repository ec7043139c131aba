//! Process-wide `tasks.db`: one SQLite row per task UUID (§3 TaskStateRow).
//! Single-writer from this process; one connection, serialized writes via
//! an internal mutex. Migrations run at startup: create-if-not-exists,
//! schema-version gated per [`SCHEMA_VERSION`].

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use orc_domain::error::{Error, Result};
use orc_domain::task::TaskKey;

pub const SCHEMA_VERSION: i32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "completed" => TaskStatus::Completed,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Running,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TaskStateRow {
    pub uuid: Uuid,
    pub task_key: String,
    pub user: String,
    pub status: TaskStatus,
    pub provider: String,
    pub model: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub llm_call_count: u64,
    pub tool_call_count: u64,
    pub total_tokens: u64,
    pub compression_count: u64,
    pub error_message: Option<String>,
}

/// Process-lifetime handle: open on init, close on shutdown (by drop).
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn open(path: &std::path::Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(to_domain_err)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(to_domain_err)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn upsert_running(
        &self,
        uuid: Uuid,
        task_key: &TaskKey,
        user: &str,
        provider: &str,
        model: &str,
    ) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO tasks (uuid, task_key, user, status, provider, model, created_at, updated_at,
                llm_call_count, tool_call_count, total_tokens, compression_count, error_message)
             VALUES (?1, ?2, ?3, 'running', ?4, ?5, ?6, ?6, 0, 0, 0, 0, NULL)
             ON CONFLICT(uuid) DO UPDATE SET
                status = 'running', provider = excluded.provider, model = excluded.model,
                updated_at = excluded.updated_at",
            params![uuid.to_string(), task_key.encode(), user, provider, model, now],
        )
        .map_err(to_domain_err)?;
        Ok(())
    }

    pub fn set_status(&self, uuid: Uuid, status: TaskStatus, error_message: Option<&str>) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET status = ?2, updated_at = ?3, error_message = ?4 WHERE uuid = ?1",
            params![uuid.to_string(), status.as_str(), now, error_message],
        )
        .map_err(to_domain_err)?;
        Ok(())
    }

    pub fn increment_llm_call(&self, uuid: Uuid, tokens: u64) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET llm_call_count = llm_call_count + 1, total_tokens = total_tokens + ?2,
                updated_at = ?3 WHERE uuid = ?1",
            params![uuid.to_string(), tokens as i64, now],
        )
        .map_err(to_domain_err)?;
        Ok(())
    }

    pub fn increment_tool_call(&self, uuid: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET tool_call_count = tool_call_count + 1, updated_at = ?2 WHERE uuid = ?1",
            params![uuid.to_string(), now],
        )
        .map_err(to_domain_err)?;
        Ok(())
    }

    pub fn increment_compression(&self, uuid: Uuid) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().to_rfc3339();
        conn.execute(
            "UPDATE tasks SET compression_count = compression_count + 1, updated_at = ?2 WHERE uuid = ?1",
            params![uuid.to_string(), now],
        )
        .map_err(to_domain_err)?;
        Ok(())
    }

    pub fn get(&self, uuid: Uuid) -> Result<Option<TaskStateRow>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT uuid, task_key, user, status, provider, model, created_at, updated_at,
                    llm_call_count, tool_call_count, total_tokens, compression_count, error_message
             FROM tasks WHERE uuid = ?1",
            params![uuid.to_string()],
            row_to_task_state,
        )
        .optional()
        .map_err(to_domain_err)
    }

    /// Rows older than `retention_days` past completion, for the producer's
    /// retention sweep (§3 invariant: never deleted before that). Matches
    /// `list_completed_older_than`'s status set — failed tasks are archived
    /// under `completed/` too, so their rows must age out the same way or
    /// the directory-delete/row-delete pair in `sweep_completed_retention`
    /// leaves an orphaned row behind.
    pub fn delete_completed_older_than(&self, retention_days: u32) -> Result<u64> {
        let conn = self.conn.lock();
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(retention_days as i64)).to_rfc3339();
        let changed = conn
            .execute(
                "DELETE FROM tasks WHERE status IN ('completed', 'failed') AND updated_at < ?1",
                params![cutoff],
            )
            .map_err(to_domain_err)?;
        Ok(changed as u64)
    }

    /// Test utility: force a row's `updated_at` into the past so
    /// retention-sweep tests (here and in `orc-orchestrator`) don't have to
    /// wait out a real cutoff. Not behind `cfg(test)` since downstream
    /// crates need it in their own test builds, where this crate is an
    /// ordinary (non-test) dependency.
    pub fn backdate_for_test(&self, uuid: Uuid, days: i64) -> Result<()> {
        let conn = self.conn.lock();
        let backdated = (chrono::Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        conn.execute(
            "UPDATE tasks SET updated_at = ?1 WHERE uuid = ?2",
            params![backdated, uuid.to_string()],
        )
        .map_err(to_domain_err)?;
        Ok(())
    }

    /// UUIDs of completed (or failed, which is archived under `completed/`
    /// too) rows past retention, so the caller can remove their on-disk
    /// directories before the row itself is deleted.
    pub fn list_completed_older_than(&self, retention_days: u32) -> Result<Vec<Uuid>> {
        let conn = self.conn.lock();
        let cutoff = (chrono::Utc::now() - chrono::Duration::days(retention_days as i64)).to_rfc3339();
        let mut stmt = conn
            .prepare("SELECT uuid FROM tasks WHERE status IN ('completed', 'failed') AND updated_at < ?1")
            .map_err(to_domain_err)?;
        let rows = stmt
            .query_map(params![cutoff], |row| row.get::<_, String>(0))
            .map_err(to_domain_err)?;
        let mut uuids = Vec::new();
        for row in rows {
            let raw = row.map_err(to_domain_err)?;
            if let Ok(uuid) = Uuid::parse_str(&raw) {
                uuids.push(uuid);
            }
        }
        Ok(uuids)
    }
}

fn row_to_task_state(row: &rusqlite::Row<'_>) -> rusqlite::Result<TaskStateRow> {
    let uuid_str: String = row.get(0)?;
    let status_str: String = row.get(3)?;
    let created_at: String = row.get(6)?;
    let updated_at: String = row.get(7)?;
    Ok(TaskStateRow {
        uuid: Uuid::parse_str(&uuid_str).unwrap_or_else(|_| Uuid::nil()),
        task_key: row.get(1)?,
        user: row.get(2)?,
        status: TaskStatus::parse(&status_str),
        provider: row.get(4)?,
        model: row.get(5)?,
        created_at: chrono::DateTime::parse_from_rfc3339(&created_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        updated_at: chrono::DateTime::parse_from_rfc3339(&updated_at)
            .map(|d| d.with_timezone(&chrono::Utc))
            .unwrap_or_else(|_| chrono::Utc::now()),
        llm_call_count: row.get::<_, i64>(8)? as u64,
        tool_call_count: row.get::<_, i64>(9)? as u64,
        total_tokens: row.get::<_, i64>(10)? as u64,
        compression_count: row.get::<_, i64>(11)? as u64,
        error_message: row.get(12)?,
    })
}

fn init_schema(conn: &Connection) -> Result<()> {
    let current_version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(to_domain_err)?;

    if current_version != 0 && current_version != SCHEMA_VERSION {
        conn.execute_batch("DROP TABLE IF EXISTS tasks;").map_err(to_domain_err)?;
    }

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS tasks (
            uuid TEXT PRIMARY KEY,
            task_key TEXT NOT NULL,
            user TEXT NOT NULL,
            status TEXT NOT NULL,
            provider TEXT NOT NULL,
            model TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            llm_call_count INTEGER NOT NULL DEFAULT 0,
            tool_call_count INTEGER NOT NULL DEFAULT 0,
            total_tokens INTEGER NOT NULL DEFAULT 0,
            compression_count INTEGER NOT NULL DEFAULT 0,
            error_message TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks(status);
        CREATE INDEX IF NOT EXISTS idx_tasks_created_at ON tasks(created_at);
        CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user);
        "#,
    )
    .map_err(to_domain_err)?;

    conn.execute(&format!("PRAGMA user_version = {SCHEMA_VERSION}"), [])
        .map_err(to_domain_err)?;

    Ok(())
}

fn to_domain_err(e: rusqlite::Error) -> Error {
    Error::Other(format!("sqlite: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKind};

    fn key() -> TaskKey {
        TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", 1)
    }

    #[test]
    fn upsert_then_get_round_trips() {
        let db = Database::open_in_memory().unwrap();
        let uuid = Uuid::new_v4();
        db.upsert_running(uuid, &key(), "alice", "anthropic", "claude-sonnet-4-20250514")
            .unwrap();
        let row = db.get(uuid).unwrap().unwrap();
        assert_eq!(row.user, "alice");
        assert_eq!(row.status, TaskStatus::Running);
    }

    #[test]
    fn counters_increment() {
        let db = Database::open_in_memory().unwrap();
        let uuid = Uuid::new_v4();
        db.upsert_running(uuid, &key(), "alice", "anthropic", "claude-sonnet-4-20250514")
            .unwrap();
        db.increment_llm_call(uuid, 120).unwrap();
        db.increment_tool_call(uuid).unwrap();
        db.increment_compression(uuid).unwrap();
        let row = db.get(uuid).unwrap().unwrap();
        assert_eq!(row.llm_call_count, 1);
        assert_eq!(row.tool_call_count, 1);
        assert_eq!(row.compression_count, 1);
        assert_eq!(row.total_tokens, 120);
    }

    #[test]
    fn set_status_records_failure_message() {
        let db = Database::open_in_memory().unwrap();
        let uuid = Uuid::new_v4();
        db.upsert_running(uuid, &key(), "alice", "anthropic", "claude-sonnet-4-20250514")
            .unwrap();
        db.set_status(uuid, TaskStatus::Failed, Some("boom")).unwrap();
        let row = db.get(uuid).unwrap().unwrap();
        assert_eq!(row.status, TaskStatus::Failed);
        assert_eq!(row.error_message.as_deref(), Some("boom"));
    }

    #[test]
    fn get_missing_uuid_is_none() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.get(Uuid::new_v4()).unwrap().is_none());
    }
}
