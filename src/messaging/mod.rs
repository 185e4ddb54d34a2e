use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::lifecycle::ShutdownSignal;
use crate::metrics::Metrics;
use crate::utils::RetryPolicy;

pub mod codec;
pub mod dedup;
mod in_memory;
mod redpanda;

pub use codec::{DecodeError, WireEvent};
pub use in_memory::{InMemoryBroker, InMemoryConsumer};
pub use redpanda::{RedpandaConsumer, RedpandaProducer};

// ============================================================================
// Messaging - Broker-agnostic publish / consume contracts
// ============================================================================
//
// Publish: encode, send keyed by order id, surface transport failures to the
// caller synchronously.
//
// Consume: one message at a time per consumer. A handler error redelivers
// the same message with backoff; success commits it. Shutdown is observed
// between messages and between redelivery attempts, never mid-handler.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("broker transport error: {0}")]
    Transport(String),

    #[error("circuit breaker '{0}' is open")]
    CircuitOpen(String),

    #[error("invalid broker configuration: {0}")]
    Config(String),

    #[error("dedup store error: {0}")]
    Dedup(String),
}

/// A delivered record, detached from the transport.
#[derive(Debug, Clone)]
pub struct Message {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub key: Option<String>,
    pub payload: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Can never succeed; logged and committed so it does not block the partition.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// Transient or consistency failure; the same message is redelivered.
    #[error("{0}")]
    Retry(String),
}

impl HandlerError {
    pub fn retry(err: impl std::fmt::Display) -> Self {
        HandlerError::Retry(err.to_string())
    }
}

impl From<DecodeError> for HandlerError {
    fn from(err: DecodeError) -> Self {
        HandlerError::Malformed(err.to_string())
    }
}

#[async_trait]
pub trait EventProducer: Send + Sync {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), MessagingError>;
}

#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError>;
}

#[async_trait]
pub trait EventConsumer: Send + Sync {
    fn topic(&self) -> &str;

    fn group(&self) -> &str;

    /// Run until shutdown is signalled or the transport fails.
    async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        shutdown: ShutdownSignal,
    ) -> Result<(), MessagingError>;
}

// ============================================================================
// Event Publisher
// ============================================================================

/// Typed publisher for one topic.
pub struct EventPublisher<E> {
    producer: Arc<dyn EventProducer>,
    topic: String,
    metrics: Arc<Metrics>,
    _event: PhantomData<fn(&E)>,
}

impl<E> Clone for EventPublisher<E> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
            topic: self.topic.clone(),
            metrics: self.metrics.clone(),
            _event: PhantomData,
        }
    }
}

impl<E: WireEvent> EventPublisher<E> {
    pub fn new(producer: Arc<dyn EventProducer>, topic: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            producer,
            topic: topic.into(),
            metrics,
            _event: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub async fn publish(&self, event: &E) -> Result<(), MessagingError> {
        let payload = codec::encode(event);

        match self.producer.send(&self.topic, event.key(), payload).await {
            Ok(()) => {
                self.metrics.record_event_published(&self.topic);
                tracing::info!(
                    topic = %self.topic,
                    key = %event.key(),
                    event = E::NAME,
                    "📤 Published event"
                );
                Ok(())
            }
            Err(e) => {
                self.metrics.record_publish_failure(&self.topic);
                tracing::error!(
                    topic = %self.topic,
                    key = %event.key(),
                    event = E::NAME,
                    error = %e,
                    "Failed to publish event"
                );
                Err(e)
            }
        }
    }
}

// ============================================================================
// Delivery
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Handled; commit
    Acked,
    /// Malformed; commit without handling
    Rejected,
    /// Shutdown while redelivering; do not commit
    Interrupted,
}

impl Delivery {
    pub fn should_commit(self) -> bool {
        matches!(self, Delivery::Acked | Delivery::Rejected)
    }
}

/// Hand one message to `handler`, redelivering it until it succeeds,
/// is rejected as malformed, or shutdown interrupts the backoff.
pub async fn deliver(
    handler: &dyn MessageHandler,
    message: &Message,
    group: &str,
    policy: &RetryPolicy,
    shutdown: &ShutdownSignal,
) -> Delivery {
    let mut attempt: u32 = 0;

    loop {
        attempt = attempt.saturating_add(1);

        match handler.handle(message).await {
            Ok(()) => return Delivery::Acked,
            Err(HandlerError::Malformed(reason)) => {
                tracing::error!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    group,
                    reason = %reason,
                    "❌ Dropping malformed message"
                );
                return Delivery::Rejected;
            }
            Err(HandlerError::Retry(reason)) => {
                let delay = policy.delay_for(attempt);
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    group,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %reason,
                    "Handler failed, redelivering"
                );

                tokio::select! {
                    _ = shutdown.wait() => return Delivery::Interrupted,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
}

/// Decorator recording per-group handling metrics.
pub struct InstrumentedHandler {
    inner: Arc<dyn MessageHandler>,
    group: String,
    metrics: Arc<Metrics>,
}

impl InstrumentedHandler {
    pub fn new(inner: Arc<dyn MessageHandler>, group: impl Into<String>, metrics: Arc<Metrics>) -> Self {
        Self {
            inner,
            group: group.into(),
            metrics,
        }
    }
}

#[async_trait]
impl MessageHandler for InstrumentedHandler {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let result = self.inner.handle(message).await;
        self.metrics
            .record_message_handled(&message.topic, &self.group, result.is_ok());
        result
    }
}
