use async_trait::async_trait;

use crate::domain::order::{Order, OrderStatus};

mod memory;
mod scylla_repository;

pub use self::memory::InMemoryOrderRepository;
pub use self::scylla_repository::ScyllaOrderRepository;

// ============================================================================
// Order Store - Durable keyed storage for orders
// ============================================================================
//
// Contract:
// - create fails with AlreadyExists on a duplicate key
// - get fails with NotFound on a missing key
// - update is a compare-and-set on the stored status; it never overwrites a
//   record whose status moved since it was read
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("order not found: {0}")]
    NotFound(String),

    #[error("order already exists: {0}")]
    AlreadyExists(String),

    #[error("order already paid: {0}")]
    AlreadyPaid(String),

    #[error("order already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("order {order_id} status changed: expected {expected}, found {actual}")]
    StaleStatus {
        order_id: String,
        expected: OrderStatus,
        actual: OrderStatus,
    },

    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Classify a failed compare-and-set by the status actually stored.
    pub fn conflict(order_id: &str, expected: OrderStatus, actual: OrderStatus) -> Self {
        match (expected, actual) {
            (_, OrderStatus::Cancelled) => StoreError::AlreadyCancelled(order_id.to_string()),
            (OrderStatus::PendingPayment, OrderStatus::Paid | OrderStatus::Assembled) => {
                StoreError::AlreadyPaid(order_id.to_string())
            }
            _ => StoreError::StaleStatus {
                order_id: order_id.to_string(),
                expected,
                actual,
            },
        }
    }

    pub(crate) fn backend(err: impl std::fmt::Display) -> Self {
        StoreError::Backend(err.to_string())
    }
}

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: &Order) -> Result<(), StoreError>;

    async fn get(&self, order_id: &str) -> Result<Order, StoreError>;

    /// Persist `order` only if the stored status still equals `expected`.
    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<(), StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_classification() {
        assert!(matches!(
            StoreError::conflict("o", OrderStatus::PendingPayment, OrderStatus::Paid),
            StoreError::AlreadyPaid(_)
        ));
        assert!(matches!(
            StoreError::conflict("o", OrderStatus::PendingPayment, OrderStatus::Assembled),
            StoreError::AlreadyPaid(_)
        ));
        assert!(matches!(
            StoreError::conflict("o", OrderStatus::PendingPayment, OrderStatus::Cancelled),
            StoreError::AlreadyCancelled(_)
        ));
        assert!(matches!(
            StoreError::conflict("o", OrderStatus::Paid, OrderStatus::Assembled),
            StoreError::StaleStatus { actual: OrderStatus::Assembled, .. }
        ));
    }
}
