use common_http_errors::ApiError;
use thiserror::Error;

pub const ACCESS_DENIED_CODE: &str = "VALIDATION_ACCESS_ERROR";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct AccessDenied {
    pub message: String,
}

impl AccessDenied {
    pub fn new(message: impl Into<String>) -> Self { Self { message: message.into() } }
}

impl From<AccessDenied> for ApiError {
    fn from(e: AccessDenied) -> Self { ApiError::forbidden(ACCESS_DENIED_CODE, e.message) }
}
