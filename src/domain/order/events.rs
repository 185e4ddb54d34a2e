use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::value_objects::PaymentMethod;

// ============================================================================
// Order Events - Facts published to the broker
// ============================================================================
//
// `event_id` is unique per publish and exists for tracing only. Consumers
// never deduplicate on it.
//
// ============================================================================

/// Order Paid - payment captured and persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderPaidEvent {
    pub event_id: String,
    pub order_id: String,
    pub user_id: String,
    pub payment_method: PaymentMethod,
    pub transaction_id: String,
}

impl OrderPaidEvent {
    pub fn new(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        payment_method: PaymentMethod,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            user_id: user_id.into(),
            payment_method,
            transaction_id: transaction_id.into(),
        }
    }
}

/// Ship Assembled - the build for a paid order finished
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShipAssembledEvent {
    pub event_id: String,
    pub order_id: String,
    pub user_id: String,
    pub build_time_seconds: u64,
}

impl ShipAssembledEvent {
    pub fn new(order_id: impl Into<String>, user_id: impl Into<String>, build_time_seconds: u64) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            order_id: order_id.into(),
            user_id: user_id.into(),
            build_time_seconds,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_ids_are_unique_per_publish() {
        let a = ShipAssembledEvent::new("o-1", "u-1", 3);
        let b = ShipAssembledEvent::new("o-1", "u-1", 3);
        assert_ne!(a.event_id, b.event_id);
        assert_eq!(a.order_id, b.order_id);
    }
}
