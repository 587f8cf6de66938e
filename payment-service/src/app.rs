use std::sync::Arc;

use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderName, HeaderValue, Method};
use axum::{middleware, routing::{get, post}, Router};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::engine::PaymentEngine;
use crate::internal_auth::require_internal_secret;
use crate::metrics::{http_error_metrics, PaymentMetrics};
use crate::payment_handlers::{
    get_payment, get_payments_by_order, get_payments_by_status, get_payments_by_user, health, render_metrics,
    process_payment, settlement_summary,
};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<PaymentEngine>,
    pub metrics: Arc<PaymentMetrics>,
    pub internal_secret: Option<Arc<str>>,
}

impl AppState {
    pub fn new(engine: Arc<PaymentEngine>, metrics: Arc<PaymentMetrics>) -> Self {
        Self { engine, metrics, internal_secret: None }
    }

    pub fn with_internal_secret(mut self, secret: Option<String>) -> Self {
        self.internal_secret = secret.map(Arc::from);
        self
    }
}

fn cors() -> CorsLayer {
    let allowed_origins = [
        "http://localhost:3000",
        "http://localhost:3001",
        "http://localhost:5173",
    ];
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(
            allowed_origins
                .iter()
                .filter_map(|origin| origin.parse::<HeaderValue>().ok())
                .collect::<Vec<_>>(),
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            ACCEPT,
            CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-user-roles"),
            HeaderName::from_static("x-internal-secret"),
        ])
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/metrics", get(render_metrics))
        .route("/payment", post(process_payment))
        .route("/payment/:payment_id", get(get_payment))
        .route("/payment/order/:order_id", get(get_payments_by_order))
        .route("/payment/user/:user_id", get(get_payments_by_user))
        .route("/payment/status/:status", get(get_payments_by_status))
        .route("/payment/reports/summary", get(settlement_summary))
        .layer(middleware::from_fn_with_state(state.clone(), require_internal_secret))
        .layer(middleware::from_fn_with_state(state.metrics.clone(), http_error_metrics))
        .layer(cors())
        .with_state(state)
}
