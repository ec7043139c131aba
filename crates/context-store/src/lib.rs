//! File-based context storage (C4) and context compression (C5).
//!
//! A task's conversation, tool-call audit trail, and compression history
//! live as append-only JSONL files under a context directory that moves
//! between `running/`, `paused/`, and `completed/` roots as the task's
//! lifecycle advances. A single SQLite database (`tasks.db`) tracks
//! process-wide task state (status, counters) alongside the filesystem,
//! which remains the crash-recovery source of truth.

pub mod compressor;
pub mod db;
pub mod manager;
pub mod message_store;
pub mod metadata;
pub mod planning_store;
pub mod summary_store;
pub mod task_state;
pub mod tool_store;

pub use compressor::{CompressionOutcome, Compressor};
pub use db::{Database, TaskStateRow, TaskStatus};
pub use manager::{sweep_completed_retention, ContextRoots, TaskContextManager};
pub use message_store::{estimate_tokens, MessageRecord, MessageRole, MessageStore};
pub use metadata::Metadata;
pub use planning_store::{PlanningEvent, PlanningEventKind, PlanningStore};
pub use summary_store::{SummaryRecord, SummaryStore};
pub use task_state::{CommentState, PausedStatus, PlanningState, TaskState};
pub use tool_store::{ToolCallRecord, ToolCallStatus, ToolStore};
