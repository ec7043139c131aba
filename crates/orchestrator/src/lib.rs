//! Orchestrator (C7-C10): the per-task execution loop, the Planning
//! coordinator, and the producer/consumer drivers that turn forge state
//! into queue entries and queue entries into completed tasks.

pub mod consumer;
pub mod exclusion_lock;
pub mod handler;
pub mod health;
pub mod planning;
pub mod producer;
pub mod response;
pub mod tooling;
pub mod user_config;

pub use consumer::ConsumerDriver;
pub use exclusion_lock::ExclusionLock;
pub use handler::{build_pause_state, ExecutionStrategy, HandleOutcome, TaskHandler, TaskHandlerConfig};
pub use health::touch_health_file;
pub use planning::{PlanningCoordinator, PlanningOutcome};
pub use producer::ProducerDriver;
pub use response::{parse_handler_response, HandlerResponse, ResponseParseError};
pub use tooling::ToolRegistry;
pub use user_config::{apply_overlay, NoopUserConfigFetcher, UserConfigFetcher};
