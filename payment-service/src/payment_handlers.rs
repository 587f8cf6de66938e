use axum::{
    extract::{rejection::{JsonRejection, QueryRejection}, Path, Query, State},
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use common_http_errors::{ApiError, ApiResult};
use common_security::PrincipalExtractor;
use serde::Deserialize;

use crate::dto::{PaymentRequest, PaymentResponse, PeriodSummary};
use crate::model::PaymentStatus;
use crate::AppState;

pub async fn process_payment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    body: Result<Json<PaymentRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<PaymentResponse>)> {
    let Json(request) = body.map_err(|e| ApiError::bad_request("malformed_body", e.body_text()))?;
    let response = state.engine.process_payment(request, &principal).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn get_payment(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(payment_id): Path<String>,
) -> ApiResult<Json<PaymentResponse>> {
    Ok(Json(state.engine.get_payment_by_id(&payment_id, &principal).await?))
}

pub async fn get_payments_by_order(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Vec<PaymentResponse>>> {
    Ok(Json(state.engine.get_payments_by_order(&order_id, &principal).await?))
}

pub async fn get_payments_by_user(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Vec<PaymentResponse>>> {
    Ok(Json(state.engine.get_payments_by_user(&user_id, &principal).await?))
}

pub async fn get_payments_by_status(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    Path(status): Path<String>,
) -> ApiResult<Json<Vec<PaymentResponse>>> {
    let status = PaymentStatus::parse(&status.to_ascii_uppercase())
        .ok_or_else(|| ApiError::bad_request("invalid_status", format!("Unknown payment status {status}")))?;
    Ok(Json(state.engine.get_payments_by_status(status, &principal).await?))
}

#[derive(Debug, Deserialize)]
pub struct PeriodQuery {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

pub async fn settlement_summary(
    State(state): State<AppState>,
    PrincipalExtractor(principal): PrincipalExtractor,
    query: Result<Query<PeriodQuery>, QueryRejection>,
) -> ApiResult<Json<PeriodSummary>> {
    let Query(period) = query.map_err(|e| ApiError::bad_request("invalid_period", e.body_text()))?;
    Ok(Json(state.engine.settlement_summary(period.from, period.to, &principal).await?))
}

pub async fn health() -> &'static str { "ok" }

pub async fn render_metrics(State(state): State<AppState>) -> impl IntoResponse {
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], state.metrics.render())
}
