use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tokio::sync::Mutex;
use tokio::time::Instant;

use super::MessagingError;

// ============================================================================
// Processed-order set
// ============================================================================
//
// Guards the assembly simulator against rebuilding an order after a
// crash-and-redeliver cycle. Keyed by order id, never by event id.
//
// ============================================================================

#[async_trait]
pub trait ProcessedOrders: Send + Sync {
    async fn is_processed(&self, order_id: &str) -> Result<bool, MessagingError>;

    async fn mark_processed(&self, order_id: &str) -> Result<(), MessagingError>;
}

/// Process-local set; entries expire after `ttl`, like the Redis keys.
pub struct InMemoryProcessedOrders {
    ttl: Duration,
    expires_at: Mutex<HashMap<String, Instant>>,
}

impl InMemoryProcessedOrders {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            expires_at: Mutex::new(HashMap::new()),
        }
    }

    /// Entries held, expired or not.
    pub async fn tracked(&self) -> usize {
        self.expires_at.lock().await.len()
    }
}

#[async_trait]
impl ProcessedOrders for InMemoryProcessedOrders {
    async fn is_processed(&self, order_id: &str) -> Result<bool, MessagingError> {
        let entries = self.expires_at.lock().await;
        Ok(entries
            .get(order_id)
            .is_some_and(|expires_at| *expires_at > Instant::now()))
    }

    async fn mark_processed(&self, order_id: &str) -> Result<(), MessagingError> {
        let now = Instant::now();
        let mut entries = self.expires_at.lock().await;
        // Sweep on insert keeps the map bounded by the orders seen within one TTL
        entries.retain(|_, expires_at| *expires_at > now);
        entries.insert(order_id.to_string(), now + self.ttl);
        Ok(())
    }
}

/// Redis-backed set; entries expire after `ttl_seconds`.
pub struct RedisProcessedOrders {
    conn: MultiplexedConnection,
    ttl_seconds: u64,
}

impl RedisProcessedOrders {
    pub async fn connect(url: &str, ttl_seconds: u64) -> Result<Self, MessagingError> {
        let client = Client::open(url).map_err(|e| MessagingError::Config(e.to_string()))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| MessagingError::Dedup(e.to_string()))?;

        Ok(Self { conn, ttl_seconds })
    }

    fn key(order_id: &str) -> String {
        format!("assembly:processed:{}", order_id)
    }
}

#[async_trait]
impl ProcessedOrders for RedisProcessedOrders {
    async fn is_processed(&self, order_id: &str) -> Result<bool, MessagingError> {
        let mut conn = self.conn.clone();
        conn.exists(Self::key(order_id))
            .await
            .map_err(|e| MessagingError::Dedup(e.to_string()))
    }

    async fn mark_processed(&self, order_id: &str) -> Result<(), MessagingError> {
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(Self::key(order_id), 1u8, self.ttl_seconds)
            .await
            .map_err(|e| MessagingError::Dedup(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_processed_orders() {
        let processed = InMemoryProcessedOrders::new(Duration::from_secs(60));
        assert!(!processed.is_processed("o-1").await.unwrap());

        processed.mark_processed("o-1").await.unwrap();
        assert!(processed.is_processed("o-1").await.unwrap());
        assert!(!processed.is_processed("o-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_in_memory_entries_expire_and_are_swept() {
        let processed = InMemoryProcessedOrders::new(Duration::from_millis(30));
        processed.mark_processed("o-1").await.unwrap();
        processed.mark_processed("o-2").await.unwrap();
        assert_eq!(processed.tracked().await, 2);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(!processed.is_processed("o-1").await.unwrap());

        // Expired entries go on the next insert
        processed.mark_processed("o-3").await.unwrap();
        assert_eq!(processed.tracked().await, 1);
        assert!(processed.is_processed("o-3").await.unwrap());
    }

    #[test]
    fn test_redis_key_layout() {
        assert_eq!(RedisProcessedOrders::key("o-1"), "assembly:processed:o-1");
    }
}
