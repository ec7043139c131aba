//! Broker-backed `TaskQueue` (C2): multiple consumers, at-least-once
//! delivery, per-message acknowledgement, reconnection with exponential
//! backoff. Used when `rabbitmq.use_rabbitmq` is true.

use std::sync::Arc;
use std::time::Duration;

use lapin::options::{
    BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
    QueueDeclareOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, ConnectionProperties, Consumer};
use futures_util::StreamExt;
use parking_lot::Mutex;

use orc_domain::task::TaskDescriptor;

use crate::{DeliveryHandle, QueueError, Result, TaskQueue};

/// A durable, single queue bound directly to the default exchange.
pub struct RabbitMqQueue {
    queue_name: String,
    uri: String,
    state: Mutex<Option<ConnState>>,
}

struct ConnState {
    #[allow(dead_code)]
    connection: Connection,
    channel: Channel,
    consumer: Consumer,
}

impl RabbitMqQueue {
    /// Build the AMQP URI from the documented `rabbitmq.*` config fields.
    pub fn new(host: &str, port: u16, user: &str, password: Option<&str>, queue: &str) -> Self {
        let password = password.unwrap_or("");
        let uri = format!("amqp://{user}:{password}@{host}:{port}/%2f");
        Self {
            queue_name: queue.to_string(),
            uri,
            state: Mutex::new(None),
        }
    }

    /// Connect (or reconnect) with exponential backoff, declaring the
    /// durable queue and opening a consumer bound to it.
    async fn connect_with_backoff(&self) -> Result<()> {
        let mut delay = Duration::from_millis(500);
        let max_delay = Duration::from_secs(30);

        loop {
            match self.try_connect().await {
                Ok(state) => {
                    *self.state.lock() = Some(state);
                    return Ok(());
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        delay_ms = delay.as_millis(),
                        "rabbitmq connection failed, retrying with backoff"
                    );
                    tokio::time::sleep(delay).await;
                    delay = (delay * 2).min(max_delay);
                }
            }
        }
    }

    async fn try_connect(&self) -> std::result::Result<ConnState, lapin::Error> {
        let connection =
            Connection::connect(&self.uri, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .queue_declare(
                &self.queue_name,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        let consumer = channel
            .basic_consume(
                &self.queue_name,
                "orc-consumer",
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        tracing::info!(queue = %self.queue_name, "connected to rabbitmq");

        Ok(ConnState {
            connection,
            channel,
            consumer,
        })
    }

    /// Ensure a connection exists, (re)connecting if necessary.
    async fn ensure_connected(&self) -> Result<()> {
        let needs_connect = self.state.lock().is_none();
        if needs_connect {
            self.connect_with_backoff().await?;
        }
        Ok(())
    }

    fn channel(&self) -> Option<Channel> {
        self.state.lock().as_ref().map(|s| s.channel.clone())
    }
}

#[async_trait::async_trait]
impl TaskQueue for RabbitMqQueue {
    async fn enqueue(&self, descriptor: TaskDescriptor) -> Result<()> {
        self.ensure_connected().await?;
        let channel = self
            .channel()
            .ok_or_else(|| QueueError::Transport("no active rabbitmq channel".into()))?;

        let payload = serde_json::to_vec(&descriptor)?;
        channel
            .basic_publish(
                "",
                &self.queue_name,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default().with_delivery_mode(2),
            )
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        Ok(())
    }

    async fn dequeue(&self, timeout: Duration) -> Result<Option<DeliveryHandle>> {
        self.ensure_connected().await?;

        // Pull one delivery off the shared consumer stream with a timeout so
        // the continuous consumer loop can interleave pause-signal checks.
        let next = {
            let consumer = {
                let guard = self.state.lock();
                guard.as_ref().map(|s| s.consumer.clone())
            };
            let Some(mut consumer) = consumer else {
                return Ok(None);
            };
            tokio::time::timeout(timeout, consumer.next()).await
        };

        let delivery = match next {
            Ok(Some(Ok(delivery))) => delivery,
            Ok(Some(Err(e))) => {
                // Transport-level failure: drop the stale connection so the
                // next call reconnects.
                *self.state.lock() = None;
                return Err(QueueError::Transport(e.to_string()));
            }
            Ok(None) => {
                *self.state.lock() = None;
                return Ok(None);
            }
            Err(_) => return Ok(None), // timeout expired
        };

        let descriptor: TaskDescriptor = serde_json::from_slice(&delivery.data)?;
        Ok(Some(DeliveryHandle {
            descriptor,
            tag: Some(delivery.delivery_tag),
        }))
    }

    async fn ack(&self, handle: DeliveryHandle) -> Result<()> {
        let Some(tag) = handle.tag else {
            return Ok(());
        };
        let Some(channel) = self.channel() else {
            return Err(QueueError::Transport("no active rabbitmq channel".into()));
        };
        channel
            .basic_ack(tag, BasicAckOptions::default())
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))
    }

    async fn nack(&self, handle: DeliveryHandle) -> Result<()> {
        let Some(tag) = handle.tag else {
            return Ok(());
        };
        let Some(channel) = self.channel() else {
            return Err(QueueError::Transport("no active rabbitmq channel".into()));
        };
        channel
            .basic_nack(
                tag,
                BasicNackOptions {
                    requeue: true,
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))
    }
}

/// Shared handle for use across the producer and consumer drivers, which
/// each hold their own `Arc<dyn TaskQueue>`.
pub type SharedQueue = Arc<dyn TaskQueue>;
