use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

use orc_domain::task::TaskDescriptor;

use crate::{DeliveryHandle, Result, TaskQueue};

/// Single-consumer, non-durable FIFO queue. Used when
/// `rabbitmq.use_rabbitmq` is false. Messages do not survive a process
/// restart; `ack`/`nack` are accepted but have no transport-level effect
/// since there is no broker to redeliver to.
pub struct InMemoryQueue {
    inner: Mutex<VecDeque<TaskDescriptor>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TaskQueue for InMemoryQueue {
    async fn enqueue(&self, descriptor: TaskDescriptor) -> Result<()> {
        self.inner.lock().push_back(descriptor);
        self.notify.notify_one();
        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<DeliveryHandle>> {
        if let Some(descriptor) = self.inner.lock().pop_front() {
            return Ok(Some(DeliveryHandle {
                descriptor,
                tag: None,
            }));
        }
        let notified = self.notify.notified();
        if tokio::time::timeout(timeout, notified).await.is_err() {
            return Ok(None);
        }
        Ok(self.inner.lock().pop_front().map(|descriptor| DeliveryHandle {
            descriptor,
            tag: None,
        }))
    }

    async fn ack(&self, _handle: DeliveryHandle) -> Result<()> {
        Ok(())
    }

    async fn nack(&self, handle: DeliveryHandle) -> Result<()> {
        // No broker to redeliver to; put it back at the front so the next
        // dequeue picks it up again rather than silently dropping it.
        self.inner.lock().push_front(handle.descriptor);
        self.notify.notify_one();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use orc_domain::task::{Platform, TaskKey, TaskKind};

    fn sample_descriptor(n: u64) -> TaskDescriptor {
        let key = TaskKey::new(Platform::Github, TaskKind::Issue, "acme", "widgets", n);
        TaskDescriptor::fresh(key, "alice")
    }

    #[tokio::test]
    async fn enqueue_then_dequeue_returns_same_descriptor() {
        let queue = InMemoryQueue::new();
        let desc = sample_descriptor(1);
        queue.enqueue(desc.clone()).await.unwrap();

        let handle = queue
            .dequeue(Duration::from_millis(100))
            .await
            .unwrap()
            .expect("expected a message");
        assert_eq!(handle.descriptor(), &desc);
    }

    #[tokio::test]
    async fn dequeue_on_empty_queue_returns_none_after_timeout() {
        let queue = InMemoryQueue::new();
        let result = queue.dequeue(Duration::from_millis(20)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn fifo_order_is_preserved() {
        let queue = InMemoryQueue::new();
        for n in 0..3 {
            queue.enqueue(sample_descriptor(n)).await.unwrap();
        }
        for n in 0..3 {
            let handle = queue
                .dequeue(Duration::from_millis(50))
                .await
                .unwrap()
                .unwrap();
            assert_eq!(handle.descriptor().task_key.number, n);
        }
    }

    #[tokio::test]
    async fn nack_requeues_at_the_front() {
        let queue = InMemoryQueue::new();
        let desc = sample_descriptor(5);
        queue.enqueue(desc.clone()).await.unwrap();
        let handle = queue.dequeue(Duration::from_millis(50)).await.unwrap().unwrap();
        queue.nack(handle).await.unwrap();

        let redelivered = queue.dequeue(Duration::from_millis(50)).await.unwrap().unwrap();
        assert_eq!(redelivered.descriptor(), &desc);
    }
}
