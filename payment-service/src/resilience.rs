use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::gateway::{GatewayError, PaymentGateway, ProcessorOutcome};
use crate::model::Payment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(2000),
            attempt_timeout: Duration::from_millis(5000),
        }
    }
}

impl RetryPolicy {
    /// `initial * 2^(attempt-1)`, capped at `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff.saturating_mul(factor).min(self.max_backoff)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self { Self { failure_threshold: 5, cooldown: Duration::from_secs(30) } }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
enum Breaker {
    Closed { consecutive_failures: u32 },
    Open { until: Instant },
    HalfOpen { trial_in_flight: bool },
}

/// Far enough out to behave as "never" without overflowing `Instant`.
const MAX_COOLDOWN: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn reopen_deadline(cooldown: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(cooldown.min(MAX_COOLDOWN)).unwrap_or(now)
}

fn lock_breaker(breaker: &Mutex<Breaker>) -> MutexGuard<'_, Breaker> {
    match breaker.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Held by the half-open trial call. If the call is dropped before its result is recorded
/// (client disconnect, cancelled task), the breaker goes back to `Open` for another cooldown
/// so a later caller can run the trial.
struct TrialGuard<'a> {
    breaker: &'a Mutex<Breaker>,
    cooldown: Duration,
    armed: bool,
}

impl TrialGuard<'_> {
    fn disarm(mut self) { self.armed = false; }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut b = lock_breaker(self.breaker);
        if matches!(*b, Breaker::HalfOpen { trial_in_flight: true }) {
            warn!("payment_gateway_trial_abandoned");
            *b = Breaker::Open { until: reopen_deadline(self.cooldown) };
        }
    }
}

/// Wraps a processor with a per-attempt timeout, bounded retries for transient failures
/// and a consecutive-failure circuit breaker.
pub struct ResilientGateway<G> {
    inner: G,
    retry: RetryPolicy,
    breaker_config: BreakerConfig,
    breaker: Mutex<Breaker>,
}

impl<G: PaymentGateway> ResilientGateway<G> {
    pub fn new(inner: G, retry: RetryPolicy, breaker_config: BreakerConfig) -> Self {
        Self {
            inner,
            retry,
            breaker_config,
            breaker: Mutex::new(Breaker::Closed { consecutive_failures: 0 }),
        }
    }

    pub fn circuit_state(&self) -> CircuitState {
        match *lock_breaker(&self.breaker) {
            Breaker::Closed { .. } => CircuitState::Closed,
            Breaker::Open { until } if Instant::now() < until => CircuitState::Open,
            Breaker::Open { .. } | Breaker::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    fn with_breaker<R>(&self, f: impl FnOnce(&mut Breaker) -> R) -> R {
        f(&mut lock_breaker(&self.breaker))
    }

    /// Admits a call. The returned guard is armed only when this call is the half-open trial.
    fn admit(&self) -> Result<TrialGuard<'_>, GatewayError> {
        let trial = self.with_breaker(|b| match *b {
            Breaker::Closed { .. } => Ok(false),
            Breaker::Open { until } if Instant::now() < until => Err(GatewayError::CircuitOpen),
            Breaker::Open { .. } => {
                info!("payment_gateway_circuit_half_open");
                *b = Breaker::HalfOpen { trial_in_flight: true };
                Ok(true)
            }
            Breaker::HalfOpen { trial_in_flight: true } => Err(GatewayError::CircuitOpen),
            Breaker::HalfOpen { trial_in_flight: false } => {
                *b = Breaker::HalfOpen { trial_in_flight: true };
                Ok(true)
            }
        })?;
        Ok(TrialGuard { breaker: &self.breaker, cooldown: self.breaker_config.cooldown, armed: trial })
    }

    fn record(&self, result: &Result<ProcessorOutcome, GatewayError>) {
        // Only an unhealthy processor counts against the breaker; a permanent rejection means it answered.
        let failed = matches!(result, Err(e) if e.is_retryable());
        let threshold = self.breaker_config.failure_threshold.max(1);
        let cooldown = self.breaker_config.cooldown;
        self.with_breaker(|b| {
            let next = match (&*b, failed) {
                (_, false) => Breaker::Closed { consecutive_failures: 0 },
                (Breaker::Closed { consecutive_failures }, true) if consecutive_failures + 1 < threshold => {
                    Breaker::Closed { consecutive_failures: consecutive_failures + 1 }
                }
                (_, true) => {
                    warn!(cooldown_ms = cooldown.as_millis() as u64, "payment_gateway_circuit_opened");
                    Breaker::Open { until: reopen_deadline(cooldown) }
                }
            };
            *b = next;
        });
    }

    async fn submit_with_retry(&self, payment: &Payment) -> Result<ProcessorOutcome, GatewayError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match timeout(self.retry.attempt_timeout, self.inner.submit(payment)).await {
                Ok(Ok(outcome)) => return Ok(outcome),
                Ok(Err(e)) => e,
                Err(_) => GatewayError::Timeout(self.retry.attempt_timeout),
            };
            if !err.is_retryable() || attempt >= max_attempts {
                return Err(err);
            }
            let delay = self.retry.backoff(attempt);
            warn!(
                order_id = %payment.order_id,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "payment_gateway_retry"
            );
            sleep(delay).await;
        }
    }
}

#[async_trait::async_trait]
impl<G: PaymentGateway> PaymentGateway for ResilientGateway<G> {
    async fn submit(&self, payment: &Payment) -> Result<ProcessorOutcome, GatewayError> {
        let trial = self.admit()?;
        let result = self.submit_with_retry(payment).await;
        self.record(&result);
        trial.disarm();
        result
    }
}
