use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::order::{ErrorKind, OrderError};

// ============================================================================
// API Errors - OrderError → status code + JSON body
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Order(e) => e.kind(),
            ApiError::BadRequest(_) => ErrorKind::Validation,
        }
    }

    fn code(&self) -> &'static str {
        match self.kind() {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::Conflict => "CONFLICT",
            ErrorKind::ExternalService => "EXTERNAL_SERVICE_ERROR",
            ErrorKind::Internal => "INTERNAL_ERROR",
        }
    }

    /// Upstream and internal details stay in the logs.
    fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::ExternalService => "Failed to communicate with external service".to_string(),
            ErrorKind::Internal => "An internal error occurred".to_string(),
            _ => self.to_string(),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self.kind() {
            ErrorKind::ExternalService | ErrorKind::Internal => {
                tracing::error!(error = %self, "Request failed");
            }
            _ => tracing::debug!(error = %self, "Request rejected"),
        }

        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.code(),
            message: self.public_message(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreError;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (ApiError::from(OrderError::EmptyPartIds), StatusCode::BAD_REQUEST),
            (ApiError::from(OrderError::NotFound("o".into())), StatusCode::NOT_FOUND),
            (ApiError::from(OrderError::AlreadyPaid("o".into())), StatusCode::CONFLICT),
            (
                ApiError::from(OrderError::Timeout {
                    operation: "pay_order",
                    timeout: Duration::from_secs(1),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ApiError::from(OrderError::from(StoreError::Backend("down".into()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (ApiError::BadRequest("bad json".into()), StatusCode::BAD_REQUEST),
        ];

        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{}", err);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let err = ApiError::from(OrderError::from(StoreError::Backend("secret host".into())));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert!(!err.public_message().contains("secret"));
    }
}
