use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::clients::{PartCatalog, PaymentGateway};
use crate::messaging::EventPublisher;
use crate::metrics::Metrics;
use crate::store::OrderRepository;

use super::aggregate::Order;
use super::commands::{CancelOrder, CreateOrder, PayOrder};
use super::errors::OrderError;
use super::events::OrderPaidEvent;
use super::value_objects::{OrderStatus, PaymentMethod};

// ============================================================================
// Order Command Handler
// ============================================================================
//
// Orchestrates: Command → Catalog / Payment → Order snapshot → Store → Broker
//
// Every mutation goes through a conditional store update keyed on the status
// that was read, so a pay racing a cancel can never both succeed.
//
// ============================================================================

pub struct OrderCommandHandler {
    store: Arc<dyn OrderRepository>,
    catalog: Arc<dyn PartCatalog>,
    payments: Arc<dyn PaymentGateway>,
    publisher: EventPublisher<OrderPaidEvent>,
    metrics: Arc<Metrics>,
    call_timeout: Duration,
}

impl OrderCommandHandler {
    pub fn new(
        store: Arc<dyn OrderRepository>,
        catalog: Arc<dyn PartCatalog>,
        payments: Arc<dyn PaymentGateway>,
        publisher: EventPublisher<OrderPaidEvent>,
        metrics: Arc<Metrics>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            store,
            catalog,
            payments,
            publisher,
            metrics,
            call_timeout,
        }
    }

    /// Price the requested parts and persist a new order awaiting payment.
    pub async fn create(&self, command: CreateOrder) -> Result<Order, OrderError> {
        let result = self.handle_create(command).await;
        self.observe("create", &result);
        result
    }

    /// Charge the order, persist it as paid and publish `OrderPaid`.
    pub async fn pay(&self, command: PayOrder) -> Result<Order, OrderError> {
        let result = self.handle_pay(command).await;
        self.observe("pay", &result);
        result
    }

    pub async fn cancel(&self, command: CancelOrder) -> Result<Order, OrderError> {
        let result = self.handle_cancel(command).await;
        self.observe("cancel", &result);
        result
    }

    pub async fn get(&self, order_id: &str) -> Result<Order, OrderError> {
        if order_id.is_empty() {
            return Err(OrderError::EmptyOrderId);
        }
        let result = self.store.get(order_id).await.map_err(OrderError::from);
        self.observe("get", &result);
        result
    }

    // ========================================================================
    // Command implementations
    // ========================================================================

    async fn handle_create(&self, command: CreateOrder) -> Result<Order, OrderError> {
        if command.user_id.is_empty() {
            return Err(OrderError::EmptyUserId);
        }
        if command.part_ids.is_empty() {
            return Err(OrderError::EmptyPartIds);
        }
        // Part ids form a set; a repeat would be priced once by the catalog
        {
            let mut seen: HashSet<&str> = HashSet::with_capacity(command.part_ids.len());
            for id in &command.part_ids {
                if !seen.insert(id.as_str()) {
                    return Err(OrderError::DuplicatePartId(id.clone()));
                }
            }
        }

        let parts = self
            .bounded("list_parts", self.catalog.list_parts(&command.part_ids))
            .await?
            .map_err(OrderError::Catalog)?;

        // Partial resolution is a total failure
        let requested: HashSet<&str> = command.part_ids.iter().map(String::as_str).collect();
        let resolved: HashSet<&str> = parts.iter().map(|p| p.id.as_str()).collect();
        if parts.is_empty() || !requested.is_subset(&resolved) {
            tracing::warn!(
                user_id = %command.user_id,
                requested = requested.len(),
                resolved = resolved.len(),
                "Parts not resolved by catalog"
            );
            return Err(OrderError::PartsNotFound {
                requested: requested.len(),
                resolved: resolved.len(),
            });
        }

        let total_price: f64 = parts.iter().map(|p| p.price).sum();
        let order = Order::new(command.user_id, command.part_ids, total_price);

        self.store.create(&order).await?;
        self.metrics.record_order_created();

        tracing::info!(
            order_id = %order.order_id,
            user_id = %order.user_id,
            total_price = order.total_price,
            "✅ Order created"
        );

        Ok(order)
    }

    async fn handle_pay(&self, command: PayOrder) -> Result<Order, OrderError> {
        if command.order_id.is_empty() {
            return Err(OrderError::EmptyOrderId);
        }
        let payment_method: PaymentMethod = command.payment_method.parse()?;

        let order = self.store.get(&command.order_id).await?;
        // No charge for an order that can no longer be paid
        order.ensure_payable()?;

        let transaction_id = self
            .bounded(
                "pay_order",
                self.payments.pay(&order.order_id, &order.user_id, payment_method),
            )
            .await?
            .map_err(OrderError::Payment)?;

        let paid = order.paid(payment_method, transaction_id.clone())?;
        self.store.update(&paid, order.status).await?;
        self.metrics.record_transition(order.status, paid.status);

        tracing::info!(
            order_id = %paid.order_id,
            user_id = %paid.user_id,
            payment_method = %payment_method,
            "💳 Order paid"
        );

        let event = OrderPaidEvent::new(
            paid.order_id.clone(),
            paid.user_id.clone(),
            payment_method,
            transaction_id,
        );

        let published = match self.bounded("publish_order_paid", self.publisher.publish(&event)).await {
            Ok(inner) => inner.map_err(|source| OrderError::Publish {
                order_id: paid.order_id.clone(),
                source,
            }),
            Err(timeout) => Err(timeout),
        };

        if let Err(e) = published {
            tracing::error!(
                order_id = %paid.order_id,
                event_id = %event.event_id,
                error = %e,
                "❌ Order persisted as PAID but OrderPaid was not published"
            );
            return Err(e);
        }

        Ok(paid)
    }

    async fn handle_cancel(&self, command: CancelOrder) -> Result<Order, OrderError> {
        if command.order_id.is_empty() {
            return Err(OrderError::EmptyOrderId);
        }

        let order = self.store.get(&command.order_id).await?;
        let cancelled = order.cancelled()?;
        self.store.update(&cancelled, order.status).await?;
        self.metrics.record_transition(order.status, OrderStatus::Cancelled);

        tracing::info!(order_id = %cancelled.order_id, "🚫 Order cancelled");

        Ok(cancelled)
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = T>,
    ) -> Result<T, OrderError> {
        tokio::time::timeout(self.call_timeout, future)
            .await
            .map_err(|_| OrderError::Timeout {
                operation,
                timeout: self.call_timeout,
            })
    }

    fn observe<T>(&self, operation: &str, result: &Result<T, OrderError>) {
        if let Err(e) = result {
            self.metrics.record_operation_error(operation, e.kind());
            tracing::debug!(operation, kind = e.kind().as_str(), error = %e, "Order operation failed");
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
