use async_trait::async_trait;

use crate::domain::order::PaymentMethod;
use crate::utils::CircuitBreakerError;

pub mod proto;
mod inventory;
mod payment;

pub use inventory::InventoryClient;
pub use payment::PaymentClient;

// ============================================================================
// External collaborators consumed by the Order orchestrator
// ============================================================================

/// A resolved catalog line.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedPart {
    pub id: String,
    pub price: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },

    #[error("{service} unavailable: {message}")]
    Unavailable { service: &'static str, message: String },

    #[error("{service} returned {code:?}: {message}")]
    Status {
        service: &'static str,
        code: tonic::Code,
        message: String,
    },

    #[error("{service} circuit breaker is open")]
    CircuitOpen { service: &'static str },

    #[error("{service} sent an invalid response: {message}")]
    InvalidResponse { service: &'static str, message: String },
}

impl ClientError {
    pub(crate) fn from_breaker(service: &'static str, err: CircuitBreakerError<ClientError>) -> Self {
        match err {
            CircuitBreakerError::CircuitOpen(_) => ClientError::CircuitOpen { service },
            CircuitBreakerError::OperationFailed(e) => e,
        }
    }

    pub(crate) fn from_status(service: &'static str, status: tonic::Status) -> Self {
        ClientError::Status {
            service,
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

/// Resolves part identifiers into priced lines. Unknown ids are simply absent.
#[async_trait]
pub trait PartCatalog: Send + Sync {
    async fn list_parts(&self, part_ids: &[String]) -> Result<Vec<PricedPart>, ClientError>;
}

/// Charges an order and returns the transaction identifier.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn pay(
        &self,
        order_id: &str,
        user_id: &str,
        payment_method: PaymentMethod,
    ) -> Result<String, ClientError>;
}

/// Lazily connected channel; the first call dials the endpoint.
pub(crate) fn lazy_channel(
    endpoint: &str,
    timeout: std::time::Duration,
) -> Result<tonic::transport::Channel, ClientError> {
    let endpoint_ref = tonic::transport::Channel::from_shared(endpoint.to_string()).map_err(|e| {
        ClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        }
    })?;

    Ok(endpoint_ref.timeout(timeout).connect_timeout(timeout).connect_lazy())
}
