#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use payment_service::events::{EventPublisher, PaymentCreatedEvent, PublishError};
use payment_service::gateway::{GatewayError, PaymentGateway, ProcessorOutcome};
use payment_service::metrics::PaymentMetrics;
use payment_service::repo::{InMemoryPaymentStore, PaymentStore};
use payment_service::{build_router, AppState, Payment, PaymentEngine, PaymentStatus};

/// Processor that replays a fixed script and counts calls.
pub struct ScriptedGateway {
    script: Mutex<VecDeque<Result<ProcessorOutcome, GatewayError>>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub fn new(script: Vec<Result<ProcessorOutcome, GatewayError>>) -> Arc<Self> {
        Arc::new(Self { script: Mutex::new(script.into()), calls: AtomicUsize::new(0) })
    }

    pub fn approving() -> Arc<Self> { Self::new((0..32).map(|i| approved(&format!("tx_ok_{i}"))).collect()) }

    pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
}

#[async_trait::async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn submit(&self, _payment: &Payment) -> Result<ProcessorOutcome, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Permanent("script exhausted".into())))
    }
}

pub fn approved(tx: &str) -> Result<ProcessorOutcome, GatewayError> {
    Ok(ProcessorOutcome { transaction_id: tx.into(), signal: 42 })
}

pub fn declined(tx: &str) -> Result<ProcessorOutcome, GatewayError> {
    Ok(ProcessorOutcome { transaction_id: tx.into(), signal: 7 })
}

pub fn unavailable() -> Result<ProcessorOutcome, GatewayError> {
    Err(GatewayError::Transient("External API unavailable".into()))
}

#[derive(Default)]
pub struct RecordingPublisher {
    pub events: Mutex<Vec<PaymentCreatedEvent>>,
    fail: bool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn failing() -> Arc<Self> { Arc::new(Self { events: Mutex::new(Vec::new()), fail: true }) }

    pub fn published(&self) -> Vec<PaymentCreatedEvent> { self.events.lock().unwrap().clone() }
}

#[async_trait::async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish_payment_created(&self, event: &PaymentCreatedEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        if self.fail {
            return Err(PublishError::Broker("Kafka error".into()));
        }
        Ok(())
    }
}

/// In-memory store that counts saves and can fail the first `fail_saves` of them.
#[derive(Default)]
pub struct CountingStore {
    inner: InMemoryPaymentStore,
    saves: AtomicUsize,
    fail_saves: usize,
}

impl CountingStore {
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    pub fn failing_first(n: usize) -> Arc<Self> { Arc::new(Self { fail_saves: n, ..Self::default() }) }

    pub fn saves(&self) -> usize { self.saves.load(Ordering::SeqCst) }
}

#[async_trait::async_trait]
impl PaymentStore for CountingStore {
    async fn save(&self, payment: &Payment) -> Result<Payment> {
        let n = self.saves.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_saves {
            return Err(anyhow!("Database error"));
        }
        self.inner.save(payment).await
    }
    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> { self.inner.find_by_id(id).await }
    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<Payment>> { self.inner.find_by_order_id(order_id).await }
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Payment>> { self.inner.find_by_user_id(user_id).await }
    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>> { self.inner.find_by_status(status).await }
    async fn find_by_status_in(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>> {
        self.inner.find_by_status_in(statuses).await
    }
    async fn find_by_date_range_and_status(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>> {
        self.inner.find_by_date_range_and_status(from, to, status).await
    }
    async fn sum_amount_by_period(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Option<BigDecimal>> {
        self.inner.sum_amount_by_period(from, to).await
    }
}

pub struct Harness {
    pub engine: Arc<PaymentEngine>,
    pub store: Arc<CountingStore>,
    pub gateway: Arc<ScriptedGateway>,
    pub publisher: Arc<RecordingPublisher>,
    pub metrics: Arc<PaymentMetrics>,
}

impl Harness {
    pub fn new(gateway: Arc<ScriptedGateway>) -> Self {
        Self::with_parts(gateway, CountingStore::new(), RecordingPublisher::new())
    }

    pub fn with_parts(gateway: Arc<ScriptedGateway>, store: Arc<CountingStore>, publisher: Arc<RecordingPublisher>) -> Self {
        let metrics = Arc::new(PaymentMetrics::new().unwrap());
        let engine = PaymentEngine::new(store.clone(), gateway.clone(), publisher.clone()).with_metrics(metrics.clone());
        Self { engine: Arc::new(engine), store, gateway, publisher, metrics }
    }

    pub fn router(&self) -> Router {
        build_router(AppState::new(self.engine.clone(), self.metrics.clone()))
    }
}

pub fn principal_request(method: &str, uri: &str, user: Option<&str>, roles: Option<&str>, body: Option<serde_json::Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    let mut req = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    match (user, roles) {
        (Some(u), Some(r)) => common_security::test_principal_headers!(req, user = u, roles = r),
        (Some(u), None) => common_security::test_principal_headers!(req, user = u),
        (None, Some(r)) => {
            req.headers_mut().insert(common_security::ROLES_HEADER, r.parse().unwrap());
        }
        (None, None) => {}
    }
    req
}

pub async fn json_body(resp: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 64).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn payment_body(user: &str, order: &str, amount: &str) -> serde_json::Value {
    serde_json::json!({
        "paymentMethodToken": "pm_card_4242",
        "amount": amount,
        "currency": "USD",
        "orderId": order,
        "userId": user,
        "description": "test order"
    })
}
