use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{OrderRepository, StoreError};
use crate::domain::order::{Order, OrderStatus};

/// Process-local order store.
///
/// The map lock is held only long enough to find a record; each record has
/// its own lock, so updates to unrelated orders never contend.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<String, Arc<Mutex<Order>>>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }

    async fn record(&self, order_id: &str) -> Result<Arc<Mutex<Order>>, StoreError> {
        self.orders
            .read()
            .await
            .get(order_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(order_id.to_string()))
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(&self, order: &Order) -> Result<(), StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(StoreError::AlreadyExists(order.order_id.clone()));
        }
        orders.insert(order.order_id.clone(), Arc::new(Mutex::new(order.clone())));
        Ok(())
    }

    async fn get(&self, order_id: &str) -> Result<Order, StoreError> {
        let record = self.record(order_id).await?;
        let order = record.lock().await.clone();
        Ok(order)
    }

    async fn update(&self, order: &Order, expected: OrderStatus) -> Result<(), StoreError> {
        let record = self.record(&order.order_id).await?;
        let mut stored = record.lock().await;

        if stored.status != expected {
            return Err(StoreError::conflict(&order.order_id, expected, stored.status));
        }

        *stored = order.clone();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::PaymentMethod;

    fn order() -> Order {
        Order::new("u1", vec!["p1".to_string()], 10.0)
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = InMemoryOrderRepository::new();
        let order = order();
        repo.create(&order).await.unwrap();

        assert_eq!(repo.get(&order.order_id).await.unwrap(), order);
        assert_eq!(repo.len().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_create_fails() {
        let repo = InMemoryOrderRepository::new();
        let order = order();
        repo.create(&order).await.unwrap();

        assert!(matches!(repo.create(&order).await, Err(StoreError::AlreadyExists(_))));
    }

    #[tokio::test]
    async fn test_get_missing() {
        let repo = InMemoryOrderRepository::new();
        assert!(matches!(repo.get("missing").await, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_is_compare_and_set() {
        let repo = InMemoryOrderRepository::new();
        let order = order();
        repo.create(&order).await.unwrap();

        let paid = order.paid(PaymentMethod::Card, "tx").unwrap();
        repo.update(&paid, OrderStatus::PendingPayment).await.unwrap();

        // Cancel computed from the stale PENDING snapshot must not land
        let cancelled = order.cancelled().unwrap();
        let err = repo.update(&cancelled, OrderStatus::PendingPayment).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyPaid(_)));
        assert_eq!(repo.get(&order.order_id).await.unwrap().status, OrderStatus::Paid);
    }

    #[tokio::test]
    async fn test_update_missing() {
        let repo = InMemoryOrderRepository::new();
        let err = repo.update(&order(), OrderStatus::PendingPayment).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_concurrent_pay_and_cancel_only_one_wins() {
        let repo = Arc::new(InMemoryOrderRepository::new());
        let order = order();
        repo.create(&order).await.unwrap();

        let paid = order.paid(PaymentMethod::Card, "tx").unwrap();
        let cancelled = order.cancelled().unwrap();

        let (a, b) = tokio::join!(
            {
                let repo = repo.clone();
                async move { repo.update(&paid, OrderStatus::PendingPayment).await }
            },
            {
                let repo = repo.clone();
                async move { repo.update(&cancelled, OrderStatus::PendingPayment).await }
            }
        );

        assert!(a.is_ok() ^ b.is_ok());
    }
}
