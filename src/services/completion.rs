use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::order::{OrderStatus, ShipAssembledEvent};
use crate::messaging::{codec, HandlerError, Message, MessageHandler};
use crate::metrics::Metrics;
use crate::store::{OrderRepository, StoreError};

// ============================================================================
// Completion Consumer - ShipAssembled → ASSEMBLED
// ============================================================================
//
// PAID      → conditional update to ASSEMBLED
// ASSEMBLED → no-op (redelivery)
// CANCELLED → logged, acknowledged; no compensation exists
// missing / PENDING_PAYMENT → consistency violation, redelivered
//
// ============================================================================

pub struct CompletionConsumer {
    store: Arc<dyn OrderRepository>,
    metrics: Arc<Metrics>,
}

impl CompletionConsumer {
    pub fn new(store: Arc<dyn OrderRepository>, metrics: Arc<Metrics>) -> Self {
        Self { store, metrics }
    }

    async fn complete(&self, event: &ShipAssembledEvent) -> Result<(), HandlerError> {
        let order = match self.store.get(&event.order_id).await {
            Ok(order) => order,
            Err(StoreError::NotFound(_)) => {
                tracing::error!(
                    order_id = %event.order_id,
                    event_id = %event.event_id,
                    "❌ ShipAssembled for unknown order"
                );
                return Err(HandlerError::Retry(format!(
                    "order {} not found for ShipAssembled",
                    event.order_id
                )));
            }
            Err(e) => return Err(HandlerError::retry(e)),
        };

        match order.status {
            OrderStatus::Assembled => {
                tracing::info!(order_id = %order.order_id, "Order already assembled, ignoring replay");
                Ok(())
            }
            OrderStatus::Cancelled => {
                tracing::error!(
                    order_id = %order.order_id,
                    event_id = %event.event_id,
                    "❌ ShipAssembled for a cancelled order, leaving it cancelled"
                );
                Ok(())
            }
            OrderStatus::PendingPayment => {
                tracing::error!(
                    order_id = %order.order_id,
                    event_id = %event.event_id,
                    "❌ ShipAssembled for an unpaid order"
                );
                Err(HandlerError::Retry(format!(
                    "order {} is not paid yet",
                    order.order_id
                )))
            }
            OrderStatus::Paid => {
                let assembled = order.assembled().map_err(HandlerError::retry)?;

                match self.store.update(&assembled, OrderStatus::Paid).await {
                    Ok(()) => {
                        self.metrics
                            .record_transition(OrderStatus::Paid, OrderStatus::Assembled);
                        tracing::info!(
                            order_id = %assembled.order_id,
                            build_time_sec = event.build_time_seconds,
                            "🏁 Order assembled"
                        );
                        Ok(())
                    }
                    // A concurrent writer already moved the order to a final status
                    Err(StoreError::StaleStatus { actual, .. }) if actual.is_terminal() => {
                        tracing::info!(
                            order_id = %assembled.order_id,
                            status = %actual,
                            "Order reached a terminal status concurrently, acknowledging"
                        );
                        Ok(())
                    }
                    Err(StoreError::AlreadyCancelled(_)) => {
                        tracing::error!(
                            order_id = %assembled.order_id,
                            "❌ Order cancelled while completing assembly"
                        );
                        Ok(())
                    }
                    Err(e) => Err(HandlerError::retry(e)),
                }
            }
        }
    }
}

#[async_trait]
impl MessageHandler for CompletionConsumer {
    async fn handle(&self, message: &Message) -> Result<(), HandlerError> {
        let event: ShipAssembledEvent = codec::decode(&message.payload)?;
        if event.order_id.is_empty() {
            return Err(HandlerError::Malformed("ShipAssembled with empty order_id".to_string()));
        }

        tracing::debug!(
            topic = %message.topic,
            partition = message.partition,
            offset = message.offset,
            event_id = %event.event_id,
            order_id = %event.order_id,
            "📨 Received ShipAssembled"
        );

        self.complete(&event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Order, PaymentMethod};
    use crate::messaging::WireEvent;
    use crate::store::InMemoryOrderRepository;
    use crate::testing::StaleReadStore;

    fn assembled_message(order_id: &str) -> Message {
        Message {
            topic: "ship.assembled".to_string(),
            partition: 0,
            offset: 3,
            key: Some(order_id.to_string()),
            payload: ShipAssembledEvent::new(order_id, "u1", 4).to_bytes(),
        }
    }

    async fn setup(status: OrderStatus) -> (Arc<InMemoryOrderRepository>, CompletionConsumer, String) {
        let store = Arc::new(InMemoryOrderRepository::new());
        let order = Order::new("u1", vec!["p1".to_string()], 100.0);
        store.create(&order).await.unwrap();

        let order = match status {
            OrderStatus::PendingPayment => order,
            OrderStatus::Paid => {
                let paid = order.paid(PaymentMethod::Card, "tx-1").unwrap();
                store.update(&paid, OrderStatus::PendingPayment).await.unwrap();
                paid
            }
            OrderStatus::Cancelled => {
                let cancelled = order.cancelled().unwrap();
                store.update(&cancelled, OrderStatus::PendingPayment).await.unwrap();
                cancelled
            }
            OrderStatus::Assembled => {
                let paid = order.paid(PaymentMethod::Card, "tx-1").unwrap();
                store.update(&paid, OrderStatus::PendingPayment).await.unwrap();
                let assembled = paid.assembled().unwrap();
                store.update(&assembled, OrderStatus::Paid).await.unwrap();
                assembled
            }
        };

        let consumer = CompletionConsumer::new(store.clone(), Arc::new(Metrics::new().unwrap()));
        (store, consumer, order.order_id)
    }

    #[tokio::test]
    async fn test_paid_order_becomes_assembled() {
        let (store, consumer, order_id) = setup(OrderStatus::Paid).await;

        consumer.handle(&assembled_message(&order_id)).await.unwrap();

        let stored = store.get(&order_id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Assembled);
        assert_eq!(stored.transaction_id.as_deref(), Some("tx-1"));
    }

    #[tokio::test]
    async fn test_replayed_event_is_a_no_op() {
        let (store, consumer, order_id) = setup(OrderStatus::Paid).await;

        consumer.handle(&assembled_message(&order_id)).await.unwrap();
        let first = store.get(&order_id).await.unwrap();
        consumer.handle(&assembled_message(&order_id)).await.unwrap();
        let second = store.get(&order_id).await.unwrap();

        assert_eq!(second.status, OrderStatus::Assembled);
        assert_eq!(second.updated_at, first.updated_at);
    }

    #[tokio::test]
    async fn test_concurrent_completion_is_acknowledged() {
        let (inner, _, order_id) = setup(OrderStatus::Paid).await;
        let stale = Arc::new(StaleReadStore::new(inner.clone()));
        stale.freeze(&order_id).await;

        // Another delivery lands ASSEMBLED after this consumer's read
        let paid = inner.get(&order_id).await.unwrap();
        inner
            .update(&paid.assembled().unwrap(), OrderStatus::Paid)
            .await
            .unwrap();

        let consumer = CompletionConsumer::new(stale, Arc::new(Metrics::new().unwrap()));
        consumer.handle(&assembled_message(&order_id)).await.unwrap();
        assert_eq!(inner.get(&order_id).await.unwrap().status, OrderStatus::Assembled);
    }

    #[tokio::test]
    async fn test_unknown_order_is_redelivered() {
        let (store, consumer, _) = setup(OrderStatus::Paid).await;

        let err = consumer.handle(&assembled_message("ghost")).await.unwrap_err();
        assert!(matches!(err, HandlerError::Retry(_)));
        // Never creates a record
        assert!(matches!(store.get("ghost").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_cancelled_order_is_left_alone() {
        let (store, consumer, order_id) = setup(OrderStatus::Cancelled).await;

        consumer.handle(&assembled_message(&order_id)).await.unwrap();
        assert_eq!(store.get(&order_id).await.unwrap().status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_unpaid_order_is_redelivered() {
        let (store, consumer, order_id) = setup(OrderStatus::PendingPayment).await;

        let err = consumer.handle(&assembled_message(&order_id)).await.unwrap_err();
        assert!(matches!(err, HandlerError::Retry(_)));
        assert_eq!(store.get(&order_id).await.unwrap().status, OrderStatus::PendingPayment);
    }

    #[tokio::test]
    async fn test_empty_order_id_is_malformed() {
        let (_, consumer, _) = setup(OrderStatus::Paid).await;
        let err = consumer.handle(&assembled_message("")).await.unwrap_err();
        assert!(matches!(err, HandlerError::Malformed(_)));
    }
}
