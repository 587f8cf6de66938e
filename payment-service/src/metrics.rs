use std::sync::Arc;

use axum::{extract::State, middleware::Next, response::Response};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

pub const SERVICE_NAME: &str = "payment-service";

/// Service metrics on a private registry, so parallel tests never collide on registration.
#[derive(Clone)]
pub struct PaymentMetrics {
    pub registry: Registry,
    pub payments_processed: IntCounterVec,
    pub gateway_errors: IntCounterVec,
    pub publish_failures: IntCounter,
    pub gateway_latency: Histogram,
    pub http_errors: IntCounterVec,
}

impl PaymentMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();
        let payments_processed = IntCounterVec::new(
            Opts::new("payments_processed_total", "Payments that reached a terminal status"),
            &["entry", "status"],
        )?;
        let gateway_errors = IntCounterVec::new(
            Opts::new("payment_gateway_errors_total", "Processor calls that raised, by error kind"),
            &["kind"],
        )?;
        let publish_failures = IntCounter::with_opts(Opts::new(
            "payment_publish_failures_total",
            "PaymentCreated events that could not be handed to the broker",
        ))?;
        let gateway_latency = Histogram::with_opts(
            HistogramOpts::new("payment_gateway_latency_seconds", "Processor call latency including retries")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        )?;
        let http_errors = IntCounterVec::new(
            Opts::new("http_errors_total", "Count of HTTP error responses emitted (status >= 400)"),
            &["service", "code", "status"],
        )?;
        registry.register(Box::new(payments_processed.clone()))?;
        registry.register(Box::new(gateway_errors.clone()))?;
        registry.register(Box::new(publish_failures.clone()))?;
        registry.register(Box::new(gateway_latency.clone()))?;
        registry.register(Box::new(http_errors.clone()))?;
        Ok(Self { registry, payments_processed, gateway_errors, publish_failures, gateway_latency, http_errors })
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buf = Vec::new();
        if encoder.encode(&self.registry.gather(), &mut buf).is_err() {
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

/// Counts every >= 400 response by its `X-Error-Code`.
pub async fn http_error_metrics(
    State(metrics): State<Arc<PaymentMetrics>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let resp = next.run(req).await;
    let status = resp.status();
    if status.as_u16() >= 400 {
        let code = resp.headers().get("X-Error-Code").and_then(|v| v.to_str().ok()).unwrap_or("unknown");
        metrics.http_errors.with_label_values(&[SERVICE_NAME, code, status.as_str()]).inc();
    }
    resp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_includes_registered_families() {
        let m = PaymentMetrics::new().unwrap();
        m.payments_processed.with_label_values(&["sync", "SUCCESS"]).inc();
        m.publish_failures.inc();
        let text = m.render();
        assert!(text.contains("payments_processed_total{entry=\"sync\",status=\"SUCCESS\"} 1"));
        assert!(text.contains("payment_publish_failures_total 1"));
    }
}
