use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use rdkafka::{
    config::ClientConfig,
    consumer::{CommitMode, Consumer, StreamConsumer},
    message::Message as _,
    producer::{FutureProducer, FutureRecord, Producer},
    util::Timeout,
    Offset, TopicPartitionList,
};

use super::{deliver, EventConsumer, EventProducer, Message, MessageHandler, MessagingError};
use crate::lifecycle::ShutdownSignal;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, RetryPolicy};

// ============================================================================
// Redpanda Producer
// ============================================================================

pub struct RedpandaProducer {
    producer: FutureProducer,
    circuit_breaker: CircuitBreaker,
    send_timeout: Duration,
}

impl RedpandaProducer {
    pub fn new(brokers: &str) -> Result<Self, MessagingError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .set("acks", "all")
            .create()
            .map_err(|e| MessagingError::Config(format!("failed to create Redpanda producer: {}", e)))?;

        // Configure circuit breaker for Redpanda
        let cb_config = CircuitBreakerConfig {
            failure_threshold: 5,
            open_timeout: Duration::from_secs(30),
            success_threshold: 3,
        };

        Ok(Self {
            producer,
            circuit_breaker: CircuitBreaker::new("redpanda", cb_config),
            send_timeout: Duration::from_secs(5),
        })
    }

    /// Fails fast when no broker answers metadata requests.
    pub fn ping(&self, timeout: Duration) -> Result<(), MessagingError> {
        self.producer
            .client()
            .fetch_metadata(None, Timeout::After(timeout))
            .map(|_| ())
            .map_err(|e| MessagingError::Transport(e.to_string()))
    }

    pub fn flush(&self, timeout: Duration) -> Result<(), MessagingError> {
        self.producer
            .flush(Timeout::After(timeout))
            .map_err(|e| MessagingError::Transport(e.to_string()))
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }
}

#[async_trait]
impl EventProducer for RedpandaProducer {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        // Use circuit breaker to protect against Redpanda failures
        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(topic).key(key).payload(&payload);

                self.producer
                    .send(record, Timeout::After(self.send_timeout))
                    .await
                    .map(|_| ())
                    .map_err(|(e, _)| MessagingError::Transport(format!("Kafka send error: {}", e)))
            })
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(topic = %topic, key = %key, "Published to Redpanda");
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen(name)) => {
                tracing::error!(topic = %topic, "Circuit breaker open - Redpanda unavailable");
                Err(MessagingError::CircuitOpen(name))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => Err(e),
        }
    }
}

// ============================================================================
// Redpanda Consumer
// ============================================================================

pub struct RedpandaConsumer {
    consumer: StreamConsumer,
    topic: String,
    group: String,
    redelivery: RetryPolicy,
}

impl RedpandaConsumer {
    pub fn new(brokers: &str, group: &str, topic: &str) -> Result<Self, MessagingError> {
        let consumer: StreamConsumer = consumer_config(brokers, group)
            .create()
            .map_err(|e| MessagingError::Config(format!("failed to create Redpanda consumer: {}", e)))?;

        consumer
            .subscribe(&[topic])
            .map_err(|e| MessagingError::Transport(e.to_string()))?;

        Ok(Self {
            consumer,
            topic: topic.to_string(),
            group: group.to_string(),
            redelivery: RetryPolicy::redelivery(),
        })
    }

    fn commit(&self, offsets: &TopicPartitionList, mode: CommitMode) -> Result<(), MessagingError> {
        self.consumer
            .commit(offsets, mode)
            .map_err(|e| MessagingError::Transport(e.to_string()))
    }
}

/// Client settings for an at-least-once consumer.
///
/// Offsets are only ever committed explicitly, one past a message the handler
/// acknowledged. Neither auto commit nor the automatic offset store may run, or
/// a message interrupted mid-redelivery would be skipped on restart.
fn consumer_config(brokers: &str, group: &str) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", brokers)
        .set("group.id", group)
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", "earliest")
        .set("session.timeout.ms", "6000")
        // A message redelivered for longer than this evicts the member; the
        // partition moves to another member, which resumes from the last commit.
        .set("max.poll.interval.ms", "600000")
        .set("enable.partition.eof", "false");
    config
}

/// Positions to commit: the offset after the last acknowledged message of each partition.
fn commit_positions(
    topic: &str,
    next_offsets: &BTreeMap<i32, i64>,
) -> Result<TopicPartitionList, MessagingError> {
    let mut offsets = TopicPartitionList::new();
    for (&partition, &next) in next_offsets {
        offsets
            .add_partition_offset(topic, partition, Offset::Offset(next))
            .map_err(|e| MessagingError::Transport(e.to_string()))?;
    }
    Ok(offsets)
}

#[async_trait]
impl EventConsumer for RedpandaConsumer {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn group(&self) -> &str {
        &self.group
    }

    async fn consume(
        &self,
        handler: Arc<dyn MessageHandler>,
        shutdown: ShutdownSignal,
    ) -> Result<(), MessagingError> {
        tracing::info!(topic = %self.topic, group = %self.group, "📥 Redpanda consumer started");

        let mut stream = self.consumer.stream();
        let mut acked: BTreeMap<i32, i64> = BTreeMap::new();

        loop {
            let message = tokio::select! {
                biased;
                _ = shutdown.wait() => break,
                next = stream.next() => match next {
                    Some(Ok(borrowed)) => Message {
                        topic: borrowed.topic().to_string(),
                        partition: borrowed.partition(),
                        offset: borrowed.offset(),
                        key: borrowed.key().map(|k| String::from_utf8_lossy(k).into_owned()),
                        payload: borrowed.payload().map(<[u8]>::to_vec).unwrap_or_default(),
                    },
                    Some(Err(e)) => {
                        tracing::warn!(topic = %self.topic, error = %e, "Failed to receive message");
                        continue;
                    }
                    None => break,
                },
            };

            let outcome = deliver(handler.as_ref(), &message, &self.group, &self.redelivery, &shutdown).await;
            if !outcome.should_commit() {
                // Left uncommitted; redelivered after restart
                break;
            }

            // Commit offset AFTER the handler finished with the message
            acked.insert(message.partition, message.offset + 1);
            let single = BTreeMap::from([(message.partition, message.offset + 1)]);
            let committed = commit_positions(&message.topic, &single)
                .and_then(|offsets| self.commit(&offsets, CommitMode::Async));
            if let Err(e) = committed {
                tracing::warn!(
                    topic = %message.topic,
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Failed to commit offset (message may be redelivered)"
                );
            }
        }

        drop(stream);
        if !acked.is_empty() {
            let committed = commit_positions(&self.topic, &acked)
                .and_then(|offsets| self.commit(&offsets, CommitMode::Sync));
            if let Err(e) = committed {
                tracing::warn!(group = %self.group, error = %e, "Failed to commit final offsets");
            }
        }

        tracing::info!(topic = %self.topic, group = %self.group, "Redpanda consumer stopped");
        Ok(())
    }
}
