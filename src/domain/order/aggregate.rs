use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{OrderStatus, PaymentMethod};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Transitions never mutate in place: each returns the next snapshot so the
// caller can persist it with a conditional update against the status it read.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub order_id: String,

    pub user_id: String,
    pub part_ids: Vec<String>,
    pub total_price: f64,
    pub status: OrderStatus,

    // Set once, on payment
    pub payment_method: Option<PaymentMethod>,
    pub transaction_id: Option<String>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Fresh order awaiting payment, with a newly generated identifier.
    pub fn new(user_id: impl Into<String>, part_ids: Vec<String>, total_price: f64) -> Self {
        let now = Utc::now();
        Self {
            order_id: Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            part_ids,
            total_price,
            status: OrderStatus::PendingPayment,
            payment_method: None,
            transaction_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Fails without side effects when the order can no longer be paid.
    pub fn ensure_payable(&self) -> Result<(), OrderError> {
        if self.status.can_transition_to(OrderStatus::Paid) {
            Ok(())
        } else {
            Err(self.transition_error(OrderStatus::Paid))
        }
    }

    pub fn paid(
        &self,
        payment_method: PaymentMethod,
        transaction_id: impl Into<String>,
    ) -> Result<Order, OrderError> {
        let mut next = self.transition(OrderStatus::Paid)?;
        next.payment_method = Some(payment_method);
        next.transaction_id = Some(transaction_id.into());
        Ok(next)
    }

    pub fn cancelled(&self) -> Result<Order, OrderError> {
        self.transition(OrderStatus::Cancelled)
    }

    pub fn assembled(&self) -> Result<Order, OrderError> {
        self.transition(OrderStatus::Assembled)
    }

    fn transition(&self, next: OrderStatus) -> Result<Order, OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(self.transition_error(next));
        }

        let mut order = self.clone();
        order.status = next;
        order.updated_at = Utc::now();
        Ok(order)
    }

    fn transition_error(&self, next: OrderStatus) -> OrderError {
        match (self.status, next) {
            (from, OrderStatus::Assembled) => OrderError::InvalidTransition { from, to: next },
            (OrderStatus::Paid | OrderStatus::Assembled, _) => {
                OrderError::AlreadyPaid(self.order_id.clone())
            }
            (OrderStatus::Cancelled, _) => OrderError::AlreadyCancelled(self.order_id.clone()),
            (from, to) => OrderError::InvalidTransition { from, to },
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
