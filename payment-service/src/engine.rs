use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use common_money::validate_amount;
use common_security::{authorize, authorize_all, require_admin, Action, Principal};
use tracing::{error, info, instrument, warn};

use crate::dto::{PaymentRequest, PaymentResponse, PeriodSummary};
use crate::error::PaymentError;
use crate::events::{EventPublisher, OrderCreatedEvent, PaymentCreatedEvent};
use crate::gateway::{GatewayError, OutcomeClassifier, ParityClassifier, PaymentGateway, ProcessorOutcome, Verdict};
use crate::metrics::PaymentMetrics;
use crate::model::{Payment, PaymentStatus};
use crate::repo::PaymentStore;

pub const API_ERROR_CODE: &str = "API_ERROR";
pub const PROCESSING_ERROR_CODE: &str = "PAYMENT_PROCESSING_ERROR";
pub const DECLINED_MESSAGE: &str = "Payment processing failed";

/// Tagged result of one processor call after classification.
#[derive(Debug)]
enum Attempt {
    Approved(ProcessorOutcome),
    Declined(ProcessorOutcome),
    Errored(GatewayError),
}

#[derive(Debug, Clone, Copy)]
enum Entry {
    Sync,
    Event,
}

impl Entry {
    fn as_str(&self) -> &'static str {
        match self {
            Entry::Sync => "sync",
            Entry::Event => "event",
        }
    }
}

/// Drives a payment from creation to a terminal status and serves the read side.
pub struct PaymentEngine {
    store: Arc<dyn PaymentStore>,
    gateway: Arc<dyn PaymentGateway>,
    classifier: Arc<dyn OutcomeClassifier>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Option<Arc<PaymentMetrics>>,
}

impl PaymentEngine {
    pub fn new(
        store: Arc<dyn PaymentStore>,
        gateway: Arc<dyn PaymentGateway>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self { store, gateway, classifier: Arc::new(ParityClassifier), publisher, metrics: None }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn OutcomeClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<PaymentMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    async fn attempt(&self, payment: &Payment) -> Attempt {
        let started = Instant::now();
        let result = self.gateway.submit(payment).await;
        if let Some(m) = &self.metrics {
            m.gateway_latency.observe(started.elapsed().as_secs_f64());
        }
        match result {
            Ok(outcome) => match self.classifier.classify(&outcome) {
                Verdict::Approved => Attempt::Approved(outcome),
                Verdict::Declined => Attempt::Declined(outcome),
            },
            Err(e) => {
                if let Some(m) = &self.metrics {
                    m.gateway_errors.with_label_values(&[e.kind()]).inc();
                }
                warn!(order_id = %payment.order_id, token = %payment.masked_token(), error = %e, "payment_gateway_error");
                Attempt::Errored(e)
            }
        }
    }

    fn record_terminal(&self, entry: Entry, payment: &Payment) {
        if let Some(m) = &self.metrics {
            m.payments_processed.with_label_values(&[entry.as_str(), payment.status().as_str()]).inc();
        }
        info!(
            entry = entry.as_str(),
            payment_id = payment.id.as_deref().unwrap_or_default(),
            order_id = %payment.order_id,
            status = %payment.status(),
            "payment_processed"
        );
    }

    /// Synchronous submission on behalf of `principal`.
    ///
    /// A processor failure is not an error for the caller: the payment is recorded FAILED
    /// with `API_ERROR` and returned. If the first save fails the attempt is recorded as
    /// failed and saved once more; only a second store failure surfaces as an error.
    #[instrument(skip(self, request, principal), fields(order_id = %request.order_id, user_id = %principal.user_id))]
    pub async fn process_payment(
        &self,
        request: PaymentRequest,
        principal: &Principal,
    ) -> Result<PaymentResponse, PaymentError> {
        request.validate()?;
        authorize(&request.user_id, principal, Action::Perform)?;

        let mut payment = Payment::pending(
            request.order_id,
            request.user_id,
            request.amount,
            request.currency,
            request.payment_method_token,
            request.description,
        );

        match self.attempt(&payment).await {
            Attempt::Approved(outcome) => payment.mark_success(outcome.transaction_id)?,
            Attempt::Declined(outcome) => payment.mark_failed(Some(outcome.transaction_id), None, None)?,
            Attempt::Errored(e) => payment.mark_failed(None, Some(API_ERROR_CODE), Some(e.to_string()))?,
        }

        let saved = match self.store.save(&payment).await {
            Ok(saved) => saved,
            Err(e) => {
                error!(order_id = %payment.order_id, error = %e, "payment_save_failed");
                payment.record_failure(API_ERROR_CODE, e.to_string());
                self.store.save(&payment).await?
            }
        };
        self.record_terminal(Entry::Sync, &saved);
        Ok(PaymentResponse::from(&saved))
    }

    /// Event-driven submission. No principal: the order event is already trusted.
    ///
    /// The outcome is always announced with a `PaymentCreated` event; a publish failure is
    /// logged and does not fail the call.
    #[instrument(skip(self, event), fields(order_id = %event.order_id))]
    pub async fn process_order_created(&self, event: OrderCreatedEvent) -> Result<Payment, PaymentError> {
        validate_amount(&event.total_amount).map_err(|e| PaymentError::validation("invalid_amount", e.to_string()))?;

        let mut payment = Payment::pending(
            event.order_id,
            event.user_id,
            event.total_amount,
            event.currency,
            event.payment_method_token,
            None,
        );
        if let Some(ts) = event.timestamp {
            payment.timestamp = ts;
        }

        match self.attempt(&payment).await {
            Attempt::Approved(outcome) => payment.mark_success(outcome.transaction_id)?,
            Attempt::Declined(outcome) => {
                payment.mark_failed(Some(outcome.transaction_id), None, Some(DECLINED_MESSAGE.to_string()))?
            }
            Attempt::Errored(e) => {
                payment.mark_failed(None, Some(PROCESSING_ERROR_CODE), Some(e.to_string()))?
            }
        }

        let saved = self.store.save(&payment).await?;
        self.record_terminal(Entry::Event, &saved);

        let created = PaymentCreatedEvent::from(&saved);
        if let Err(e) = self.publisher.publish_payment_created(&created).await {
            if let Some(m) = &self.metrics {
                m.publish_failures.inc();
            }
            error!(order_id = %saved.order_id, payment_id = ?saved.id, error = %e, "payment_created_publish_failed");
        }
        Ok(saved)
    }

    /// Lookup happens before authorization, so an unknown id is reported as not found
    /// regardless of who asks.
    pub async fn get_payment_by_id(&self, payment_id: &str, principal: &Principal) -> Result<PaymentResponse, PaymentError> {
        let payment = self
            .store
            .find_by_id(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;
        authorize(&payment.user_id, principal, Action::Get)?;
        Ok(PaymentResponse::from(&payment))
    }

    /// All-or-nothing: any payment owned by someone else denies the whole listing for non-admins.
    pub async fn get_payments_by_order(&self, order_id: &str, principal: &Principal) -> Result<Vec<PaymentResponse>, PaymentError> {
        let payments = self.store.find_by_order_id(order_id).await?;
        authorize_all(payments.iter().map(|p| p.user_id.as_str()), principal)?;
        Ok(payments.iter().map(PaymentResponse::from).collect())
    }

    pub async fn get_payments_by_user(&self, user_id: &str, principal: &Principal) -> Result<Vec<PaymentResponse>, PaymentError> {
        authorize(user_id, principal, Action::Get)?;
        let payments = self.store.find_by_user_id(user_id).await?;
        Ok(payments.iter().map(PaymentResponse::from).collect())
    }

    pub async fn get_payments_by_status(&self, status: PaymentStatus, principal: &Principal) -> Result<Vec<PaymentResponse>, PaymentError> {
        require_admin(principal, Action::Get)?;
        let payments = self.store.find_by_status(status).await?;
        Ok(payments.iter().map(PaymentResponse::from).collect())
    }

    pub async fn settlement_summary(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        principal: &Principal,
    ) -> Result<PeriodSummary, PaymentError> {
        require_admin(principal, Action::Report)?;
        if from > to {
            return Err(PaymentError::validation("invalid_period", "from must not be after to"));
        }
        let total_amount = self.store.sum_amount_by_period(from, to).await?;
        let mut by_status = BTreeMap::new();
        for status in PaymentStatus::ALL {
            let rows = self.store.find_by_date_range_and_status(from, to, status).await?;
            by_status.insert(status.as_str().to_string(), rows.len());
        }
        Ok(PeriodSummary { from, to, total_amount, by_status })
    }
}
