use std::time::Duration;

use super::value_objects::{InvalidPaymentMethod, OrderStatus};
use crate::clients::ClientError;
use crate::messaging::MessagingError;
use crate::store::StoreError;

// ============================================================================
// Order Errors
// ============================================================================

/// Coarse classification used by transports to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    ExternalService,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::ExternalService => "external_service",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("user id is empty")]
    EmptyUserId,

    #[error("part ids are empty")]
    EmptyPartIds,

    #[error("order id is empty")]
    EmptyOrderId,

    #[error("part {0} is listed more than once")]
    DuplicatePartId(String),

    #[error(transparent)]
    InvalidPaymentMethod(#[from] InvalidPaymentMethod),

    #[error("parts not found: requested {requested}, resolved {resolved}")]
    PartsNotFound { requested: usize, resolved: usize },

    #[error("order not found: {0}")]
    NotFound(String),

    #[error("order already exists: {0}")]
    AlreadyExists(String),

    #[error("order already paid: {0}")]
    AlreadyPaid(String),

    #[error("order already cancelled: {0}")]
    AlreadyCancelled(String),

    #[error("invalid status transition {from} -> {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    #[error("inventory service call failed: {0}")]
    Catalog(#[source] ClientError),

    #[error("payment service call failed: {0}")]
    Payment(#[source] ClientError),

    #[error("order {order_id} was paid but the OrderPaid event was not published: {source}")]
    Publish {
        order_id: String,
        #[source]
        source: MessagingError,
    },

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    #[error("order store failed: {0}")]
    Store(#[source] StoreError),
}

impl OrderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            OrderError::EmptyUserId
            | OrderError::EmptyPartIds
            | OrderError::EmptyOrderId
            | OrderError::DuplicatePartId(_)
            | OrderError::InvalidPaymentMethod(_) => ErrorKind::Validation,
            OrderError::PartsNotFound { .. } | OrderError::NotFound(_) => ErrorKind::NotFound,
            OrderError::AlreadyExists(_)
            | OrderError::AlreadyPaid(_)
            | OrderError::AlreadyCancelled(_)
            | OrderError::InvalidTransition { .. } => ErrorKind::Conflict,
            OrderError::Catalog(_)
            | OrderError::Payment(_)
            | OrderError::Publish { .. }
            | OrderError::Timeout { .. } => ErrorKind::ExternalService,
            OrderError::Store(_) => ErrorKind::Internal,
        }
    }
}

impl From<StoreError> for OrderError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => OrderError::NotFound(id),
            StoreError::AlreadyExists(id) => OrderError::AlreadyExists(id),
            StoreError::AlreadyPaid(id) => OrderError::AlreadyPaid(id),
            StoreError::AlreadyCancelled(id) => OrderError::AlreadyCancelled(id),
            other => OrderError::Store(other),
        }
    }
}
