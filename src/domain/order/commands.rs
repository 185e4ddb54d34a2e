use serde::{Deserialize, Serialize};

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Missing fields deserialize empty and are rejected by validation.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CreateOrder {
    pub user_id: String,
    pub part_ids: Vec<String>,
}

/// `payment_method` stays a raw string until the orchestrator validates it.
#[derive(Debug, Clone)]
pub struct PayOrder {
    pub order_id: String,
    pub payment_method: String,
}

#[derive(Debug, Clone)]
pub struct CancelOrder {
    pub order_id: String,
}

// ============================================================================
// Command Results
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCreated {
    pub order_id: String,
    pub total_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderPaid {
    pub transaction_id: String,
}
