use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::model::Payment;

/// What the processor handed back for an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorOutcome {
    pub transaction_id: String,
    pub signal: i64,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Processor unreachable or overloaded; worth retrying.
    #[error("{0}")]
    Transient(String),
    /// Processor rejected the request itself; retrying will not help.
    #[error("{0}")]
    Permanent(String),
    #[error("payment processor did not respond within {0:?}")]
    Timeout(Duration),
    #[error("payment processor circuit is open")]
    CircuitOpen,
}

impl GatewayError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, GatewayError::Transient(_) | GatewayError::Timeout(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::Transient(_) => "transient",
            GatewayError::Permanent(_) => "permanent",
            GatewayError::Timeout(_) => "timeout",
            GatewayError::CircuitOpen => "circuit_open",
        }
    }
}

#[async_trait::async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn submit(&self, payment: &Payment) -> Result<ProcessorOutcome, GatewayError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Approved,
    Declined,
}

/// Decides whether an accepted submission actually settled.
pub trait OutcomeClassifier: Send + Sync {
    fn classify(&self, outcome: &ProcessorOutcome) -> Verdict;
}

impl<F> OutcomeClassifier for F
where
    F: Fn(&ProcessorOutcome) -> Verdict + Send + Sync,
{
    fn classify(&self, outcome: &ProcessorOutcome) -> Verdict { self(outcome) }
}

/// Even signal approves, odd declines.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParityClassifier;

impl OutcomeClassifier for ParityClassifier {
    fn classify(&self, outcome: &ProcessorOutcome) -> Verdict {
        if outcome.signal % 2 == 0 { Verdict::Approved } else { Verdict::Declined }
    }
}

/// Stand-in processor: accepts every submission with a random signal.
#[derive(Debug, Clone, Default)]
pub struct SimulatedProcessor;

impl SimulatedProcessor { pub fn new() -> Self { Self } }

#[async_trait::async_trait]
impl PaymentGateway for SimulatedProcessor {
    async fn submit(&self, payment: &Payment) -> Result<ProcessorOutcome, GatewayError> {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        let (suffix, signal) = {
            let mut rng = rand::thread_rng();
            (rng.gen_range(0..1000), rng.gen_range(0..100))
        };
        let transaction_id = format!("proc_tx_{millis}_{suffix}");
        debug!(order_id = %payment.order_id, token = %payment.masked_token(), %transaction_id, "simulated_processor_submit");
        Ok(ProcessorOutcome { transaction_id, signal })
    }
}
