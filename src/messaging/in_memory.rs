use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{watch, Mutex, RwLock};

use super::{deliver, EventConsumer, EventProducer, Message, MessageHandler, MessagingError};
use crate::lifecycle::ShutdownSignal;
use crate::utils::RetryPolicy;

// ============================================================================
// In-Memory Broker
// ============================================================================
//
// Each topic is a single-partition append-only log. Consumer groups keep
// independent committed offsets, so every group sees every message.
//
// ============================================================================

struct TopicLog {
    messages: RwLock<Vec<Message>>,
    appended: watch::Sender<usize>,
    committed: Mutex<HashMap<String, i64>>,
}

impl TopicLog {
    fn new() -> Self {
        let (appended, _) = watch::channel(0);
        Self {
            messages: RwLock::new(Vec::new()),
            appended,
            committed: Mutex::new(HashMap::new()),
        }
    }

    async fn at(&self, offset: i64) -> Option<Message> {
        let index = usize::try_from(offset).ok()?;
        self.messages.read().await.get(index).cloned()
    }

    async fn next_offset(&self, group: &str) -> i64 {
        self.committed.lock().await.get(group).copied().unwrap_or(0)
    }

    async fn commit(&self, group: &str, next: i64) {
        self.committed.lock().await.insert(group.to_string(), next);
    }
}

#[derive(Default)]
pub struct InMemoryBroker {
    topics: Mutex<HashMap<String, Arc<TopicLog>>>,
    unavailable: AtomicBool,
}

impl InMemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Consumer for `topic` within `group`.
    pub fn consumer(self: &Arc<Self>, topic: &str, group: &str) -> InMemoryConsumer {
        InMemoryConsumer {
            broker: self.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            redelivery: RetryPolicy::redelivery(),
        }
    }

    /// Make every send fail, standing in for an unreachable broker.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn messages(&self, topic: &str) -> Vec<Message> {
        self.topic(topic).await.messages.read().await.clone()
    }

    /// Next offset `group` will read on `topic`.
    pub async fn committed_offset(&self, topic: &str, group: &str) -> i64 {
        self.topic(topic).await.next_offset(group).await
    }

    async fn topic(&self, name: &str) -> Arc<TopicLog> {
        self.topics
            .lock()
            .await
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(TopicLog::new()))
            .clone()
    }
}

#[async_trait]
impl EventProducer for InMemoryBroker {
    async fn send(&self, topic: &str, key: &str, payload: Vec<u8>) -> Result<(), MessagingError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(MessagingError::Transport("broker unavailable".to_string()));
        }

        let log = self.topic(topic).await;
        let len = {
            let mut messages = log.messages.write().await;
            let offset = messages.len() as i64;
            messages.push(Message {
                topic: topic.to_string(),
                partition: 0,
                offset,
                key: Some(key.to_string()),
                payload,
            });
            messages.len()
        };
        log.appended.send_replace(len);

        tracing::debug!(topic, key, offset = len - 1, "Appended to in-memory topic");
        Ok(())
    }
}

pub struct InMemoryConsumer {
    broker: Arc<InMemoryBroker>,
    topic: String,
    group: String,
    redelivery: RetryPolicy,
}

#[async_trait]
impl EventConsumer for InMemoryConsumer {
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
        tracing::info!(topic = %self.topic, group = %self.group, "📥 In-memory consumer started");

        let log = self.broker.topic(&self.topic).await;
        let mut appended = log.appended.subscribe();

        while !shutdown.is_shutdown() {
            let offset = log.next_offset(&self.group).await;

            let Some(message) = log.at(offset).await else {
                tokio::select! {
                    _ = shutdown.wait() => break,
                    changed = appended.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
                continue;
            };

            let outcome = deliver(handler.as_ref(), &message, &self.group, &self.redelivery, &shutdown).await;
            if !outcome.should_commit() {
                break;
            }
            log.commit(&self.group, offset + 1).await;
        }

        tracing::info!(topic = %self.topic, group = %self.group, "In-memory consumer stopped");
        Ok(())
    }
}
