use common_http_errors::ApiError;
use common_security::AccessDenied;
use thiserror::Error;
use tracing::error;

use crate::model::InvalidTransition;

pub const PAYMENT_NOT_FOUND_CODE: &str = "PAYMENT_NOT_FOUND";

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Unauthorized(#[from] AccessDenied),
    #[error("Payment with id={0} not found")]
    NotFound(String),
    #[error("{message}")]
    Validation { code: &'static str, message: String },
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
    #[error("payment store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn validation(code: &'static str, message: impl Into<String>) -> Self {
        PaymentError::Validation { code, message: message.into() }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Unauthorized(denied) => denied.into(),
            e @ PaymentError::NotFound(_) => ApiError::not_found(PAYMENT_NOT_FOUND_CODE, e.to_string()),
            PaymentError::Validation { code, message } => ApiError::bad_request(code, message),
            other => {
                error!(error = %other, "payment_request_failed");
                // Store details stay in the log; the body carries a generic message.
                ApiError::internal("An unexpected error occurred", None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn maps_to_http_status() {
        let denied: ApiError = PaymentError::from(AccessDenied::new("You are not authorized to get this payment!")).into();
        assert!(matches!(denied, ApiError::Forbidden { code: "VALIDATION_ACCESS_ERROR", .. }));
        let missing: ApiError = PaymentError::NotFound("p1".into()).into();
        assert!(matches!(missing, ApiError::NotFound { code: "PAYMENT_NOT_FOUND", ref message, .. } if message.as_deref() == Some("Payment with id=p1 not found")));
        let bad: ApiError = PaymentError::validation("invalid_currency", "currency must be a 3-letter ISO code").into();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
        let store: ApiError = PaymentError::Store(anyhow::anyhow!("connection refused")).into();
        assert_eq!(store.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(store, ApiError::Internal { ref message, .. } if message.as_deref() == Some("An unexpected error occurred")));
    }
}
