use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rand::Rng;

use crate::domain::order::{OrderPaidEvent, ShipAssembledEvent};
use crate::lifecycle::ShutdownSignal;
use crate::messaging::dedup::ProcessedOrders;
use crate::messaging::{codec, EventPublisher, HandlerError, Message, MessageHandler, MessagingError};
use crate::metrics::Metrics;

// ============================================================================
// Assembly Simulator
// ============================================================================
//
// OrderPaid → build delay (or shutdown) → ShipAssembled
//
// The delay is the only deliberate suspension point. Shutdown aborts it
// without publishing and the paid event is redelivered after restart.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("assembly of order {order_id} interrupted by shutdown")]
    Interrupted { order_id: String },

    #[error("failed to publish ShipAssembled for order {order_id}: {source}")]
    Publish {
        order_id: String,
        #[source]
        source: MessagingError,
    },

    #[error("processed-order lookup failed: {0}")]
    Dedup(#[source] MessagingError),
}

impl From<AssemblyError> for HandlerError {
    fn from(err: AssemblyError) -> Self {
        HandlerError::retry(err)
    }
}

/// Source of build durations.
pub trait BuildDuration: Send + Sync {
    fn next(&self) -> Duration;
}

/// Uniform whole seconds in `min..=max`.
#[derive(Debug, Clone)]
pub struct RandomBuildDuration {
    min_seconds: u64,
    max_seconds: u64,
}

impl RandomBuildDuration {
    pub fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            min_seconds: min_seconds.min(max_seconds),
            max_seconds: max_seconds.max(min_seconds),
        }
    }
}

impl BuildDuration for RandomBuildDuration {
    fn next(&self) -> Duration {
        let seconds = rand::thread_rng().gen_range(self.min_seconds..=self.max_seconds);
        Duration::from_secs(seconds)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedBuildDuration(pub Duration);

impl BuildDuration for FixedBuildDuration {
    fn next(&self) -> Duration {
        self.0
    }
}

pub struct AssemblySimulator {
    publisher: EventPublisher<ShipAssembledEvent>,
    durations: Arc<dyn BuildDuration>,
    processed: Arc<dyn ProcessedOrders>,
    metrics: Arc<Metrics>,
    shutdown: ShutdownSignal,
}

impl AssemblySimulator {
    pub fn new(
        publisher: EventPublisher<ShipAssembledEvent>,
        durations: Arc<dyn BuildDuration>,
        processed: Arc<dyn ProcessedOrders>,
        metrics: Arc<Metrics>,
        shutdown: ShutdownSignal,
    ) -> Self {
        Self {
            publisher,
            durations,
            processed,
            metrics,
            shutdown,
        }
    }

    /// Build one paid order and announce it.
    pub async fn assemble(&self, event: &OrderPaidEvent) -> Result<ShipAssembledEvent, AssemblyError> {
        let build_time = self.durations.next();

        tracing::info!(
            order_id = %event.order_id,
            user_id = %event.user_id,
            build_time_sec = build_time.as_secs(),
            "🚀 Assembling ship"
        );

        let started = Instant::now();
        tokio::select! {
            biased;
            _ = self.shutdown.wait() => {
                tracing::warn!(order_id = %event.order_id, "Assembly interrupted, leaving event for redelivery");
                return Err(AssemblyError::Interrupted { order_id: event.order_id.clone() });
            }
            _ = tokio::time::sleep(build_time) => {}
        }

        let assembled = ShipAssembledEvent::new(
            event.order_id.clone(),
            event.user_id.clone(),
            build_time.as_secs(),
        );

        self.publisher
            .publish(&assembled)
            .await
            .map_err(|source| AssemblyError::Publish {
                order_id: event.order_id.clone(),
                source,
            })?;

        self.metrics.observe_build_seconds(started.elapsed().as_secs_f64());

        tracing::info!(
            order_id = %assembled.order_id,
            event_id = %assembled.event_id,
            build_time_sec = assembled.build_time_seconds,
            "✅ Ship assembled"
        );

        Ok(assembled)
    }
}

#[async_trait]
impl MessageHandler for AssemblySimulator {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event: OrderPaidEvent = codec::decode(&message.payload)?;
        if event.order_id.is_empty() {
            return Err(HandlerError::Malformed("OrderPaid with empty order_id".to_string()));
        }

        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            event_id = %event.event_id,
            order_id = %event.order_id,
            "📨 Received OrderPaid"
        );

        if self
            .processed
            .is_processed(&event.order_id)
            .await
            .map_err(AssemblyError::Dedup)?
        {
            tracing::info!(order_id = %event.order_id, "Order already assembled, skipping rebuild");
            return Ok(());
        }

        self.assemble(&event).await?;

        // Marked only after the completion event is on the broker
        self.processed
            .mark_processed(&event.order_id)
            .await
            .map_err(AssemblyError::Dedup)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;
    use crate::lifecycle::Lifecycle;
    use crate::messaging::dedup::InMemoryProcessedOrders;
    use crate::messaging::{EventProducer, InMemoryBroker, WireEvent};

    const TOPIC: &str = "ship.assembled";

    struct Setup {
        broker: Arc<InMemoryBroker>,
        processed: Arc<InMemoryProcessedOrders>,
        simulator: AssemblySimulator,
    }

    fn setup(build_time: Duration, shutdown: ShutdownSignal) -> Setup {
        let broker = InMemoryBroker::new();
        let metrics = Arc::new(Metrics::new().unwrap());
        let producer: Arc<dyn EventProducer> = broker.clone();
        let processed = Arc::new(InMemoryProcessedOrders::new(Duration::from_secs(60)));

        let simulator = AssemblySimulator::new(
            EventPublisher::new(producer, TOPIC, metrics.clone()),
            Arc::new(FixedBuildDuration(build_time)),
            processed.clone(),
            metrics,
            shutdown,
        );

        Setup { broker, processed, simulator }
    }

    fn paid_message(order_id: &str) -> Message {
        let event = OrderPaidEvent::new(order_id, "u1", PaymentMethod::Card, "tx-1");
        Message {
            topic: "order.paid".to_string(),
            partition: 0,
            offset: 0,
            key: Some(order_id.to_string()),
            payload: event.to_bytes(),
        }
    }

    #[test]
    fn test_random_duration_stays_in_bounds() {
        let durations = RandomBuildDuration::new(1, 10);
        for _ in 0..200 {
            let secs = durations.next().as_secs();
            assert!((1..=10).contains(&secs));
        }
    }

    #[test]
    fn test_random_duration_swaps_inverted_bounds() {
        let durations = RandomBuildDuration::new(5, 2);
        let secs = durations.next().as_secs();
        assert!((2..=5).contains(&secs));
    }

    #[tokio::test]
    async fn test_publishes_ship_assembled_for_same_order() {
        let s = setup(Duration::ZERO, ShutdownSignal::never());

        s.simulator.handle(&paid_message("o-1")).await.unwrap();

        let published = s.broker.messages(TOPIC).await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].key.as_deref(), Some("o-1"));

        let event: ShipAssembledEvent = codec::decode(&published[0].payload).unwrap();
        assert_eq!(event.order_id, "o-1");
        assert_eq!(event.user_id, "u1");
        assert_eq!(event.build_time_seconds, 0);
        assert!(s.processed.is_processed("o-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_redelivered_order_is_not_rebuilt() {
        let s = setup(Duration::ZERO, ShutdownSignal::never());

        s.simulator.handle(&paid_message("o-1")).await.unwrap();
        s.simulator.handle(&paid_message("o-1")).await.unwrap();

        assert_eq!(s.broker.messages(TOPIC).await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_order_id_is_malformed() {
        let s = setup(Duration::ZERO, ShutdownSignal::never());

        let err = s.simulator.handle(&paid_message("")).await.unwrap_err();
        assert!(matches!(err, HandlerError::Malformed(_)));
        assert!(s.broker.messages(TOPIC).await.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_payload_is_malformed() {
        let s = setup(Duration::ZERO, ShutdownSignal::never());
        let mut message = paid_message("o-1");
        message.payload = vec![0xff, 0xff];

        let err = s.simulator.handle(&message).await.unwrap_err();
        assert!(matches!(err, HandlerError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_shutdown_aborts_build_without_publishing() {
        let lifecycle = Lifecycle::new();
        let s = setup(Duration::from_secs(60), lifecycle.shutdown_signal());

        let handle = tokio::spawn(async move {
            let result = s.simulator.handle(&paid_message("o-1")).await;
            (result, s)
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        lifecycle.trigger_shutdown();

        let (result, s) = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(HandlerError::Retry(_))));
        assert!(s.broker.messages(TOPIC).await.is_empty());
        assert!(!s.processed.is_processed("o-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_publish_failure_is_retried_and_not_marked() {
        let s = setup(Duration::ZERO, ShutdownSignal::never());
        s.broker.set_unavailable(true);

        let err = s.simulator.handle(&paid_message("o-1")).await.unwrap_err();
        assert!(matches!(err, HandlerError::Retry(_)));
        assert!(!s.processed.is_processed("o-1").await.unwrap());
    }
}
