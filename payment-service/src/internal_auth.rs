use axum::body::Body;
use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use common_http_errors::ApiError;
use subtle::ConstantTimeEq;
use tracing::warn;

use crate::AppState;

pub const INTERNAL_SECRET_HEADER: &str = "X-Internal-Secret";

const OPEN_PATHS: &[&str] = &["/healthz", "/metrics"];

/// Rejects requests that did not come through the perimeter. Disabled when no secret is configured.
pub async fn require_internal_secret(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let Some(expected) = state.internal_secret.as_deref() else {
        return next.run(req).await;
    };
    if OPEN_PATHS.contains(&req.uri().path()) {
        return next.run(req).await;
    }
    let provided = req
        .headers()
        .get(INTERNAL_SECRET_HEADER)
        .map(|v| v.as_bytes())
        .unwrap_or_default();
    if ConstantTimeEq::ct_eq(expected.as_bytes(), provided).unwrap_u8() != 1 {
        warn!(path = %req.uri().path(), "internal_secret_mismatch");
        return ApiError::forbidden("internal_secret_mismatch", "Forbidden: Direct access not allowed").into_response();
    }
    next.run(req).await
}
