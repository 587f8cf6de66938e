use axum::{http::{StatusCode, HeaderValue}, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use uuid::Uuid;

#[derive(Serialize, Debug)]
pub struct ErrorBody {
    pub status: u16,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")] pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")] pub trace_id: Option<Uuid>,
}

#[derive(Debug)]
pub enum ApiError {
    Forbidden { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    BadRequest { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    NotFound { code: &'static str, trace_id: Option<Uuid>, message: Option<String> },
    Internal { trace_id: Option<Uuid>, message: Option<String> },
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(e: E, trace_id: Option<Uuid>) -> Self { Self::Internal { trace_id, message: Some(e.to_string()) } }
    pub fn bad_request(code: &'static str, message: impl Into<String>) -> Self { Self::BadRequest { code, trace_id: None, message: Some(message.into()) } }
    pub fn forbidden(code: &'static str, message: impl Into<String>) -> Self { Self::Forbidden { code, trace_id: None, message: Some(message.into()) } }
    pub fn not_found(code: &'static str, message: impl Into<String>) -> Self { Self::NotFound { code, trace_id: None, message: Some(message.into()) } }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error_code, trace_id, message) = match self {
            ApiError::Forbidden { code, trace_id, message } => (code, trace_id, message),
            ApiError::BadRequest { code, trace_id, message } => (code, trace_id, message),
            ApiError::NotFound { code, trace_id, message } => (code, trace_id, message),
            ApiError::Internal { trace_id, message } => ("internal_error", trace_id, message),
        };
        let body = ErrorBody { status: status.as_u16(), code: error_code.into(), message, trace_id };
        let mut resp = (status, Json(body)).into_response();
        if let Ok(val) = HeaderValue::from_str(error_code) {
            resp.headers_mut().insert("X-Error-Code", val);
        }
        resp
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
