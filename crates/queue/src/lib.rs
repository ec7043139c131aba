//! At-least-once FIFO delivery of `TaskDescriptor`s between producer and
//! consumer (C2). Two variants share one trait: an in-process FIFO for a
//! single non-durable consumer, and a broker-backed queue for multiple
//! consumers with per-message acknowledgement.

mod memory;
mod rabbit;

pub use memory::InMemoryQueue;
pub use rabbit::RabbitMqQueue;

use std::time::Duration;

use orc_domain::task::TaskDescriptor;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("queue transport: {0}")]
    Transport(String),
    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueueError>;

/// A handle identifying a message in flight, returned by `dequeue` and
/// consumed by `ack`/`nack`. The in-memory queue's handle is a no-op marker;
/// the broker-backed queue's handle carries a delivery tag.
#[derive(Debug, Clone)]
pub struct DeliveryHandle {
    pub descriptor: TaskDescriptor,
    pub(crate) tag: Option<u64>,
}

impl DeliveryHandle {
    pub fn descriptor(&self) -> &TaskDescriptor {
        &self.descriptor
    }
}

/// Capability set required by the producer/consumer drivers. The payload is
/// opaque to the queue: callers pass/receive `TaskDescriptor`s; the
/// implementation is responsible for JSON-serializing them on the wire.
#[async_trait::async_trait]
pub trait TaskQueue: Send + Sync {
    /// Enqueue a descriptor. Returns once the transport has accepted it
    /// (for the broker-backed variant, once the publish confirms).
    async fn enqueue(&self, descriptor: TaskDescriptor) -> Result<()>;

    /// Dequeue the next descriptor, blocking up to `timeout`. Returns `None`
    /// on expiry so continuous loops can interleave pause-signal checks.
    async fn dequeue(&self, timeout: Duration) -> Result<Option<DeliveryHandle>>;

    /// Acknowledge successful handling. A descriptor is acked on successful
    /// completion, on pause, or on stop — every outcome the handler reaches
    /// without an unrecovered transport failure counts as "handled".
    async fn ack(&self, handle: DeliveryHandle) -> Result<()>;

    /// Negative-acknowledge so the broker may redeliver. Used only for
    /// unrecovered transport failure, never for task-level errors (those are
    /// acked after being logged and posted as a forge comment).
    async fn nack(&self, handle: DeliveryHandle) -> Result<()>;
}
