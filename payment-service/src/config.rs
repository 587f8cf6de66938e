use std::env;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::Context;

use crate::resilience::{BreakerConfig, RetryPolicy};

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub host: String,
    pub port: u16,
    pub database_url: Option<String>,
    pub kafka_bootstrap: String,
    pub order_created_topic: String,
    pub payment_created_topic: String,
    pub consumer_group: String,
    pub consumer_concurrency: usize,
    pub gateway_timeout: Duration,
    pub gateway_max_attempts: u32,
    pub gateway_backoff_base: Duration,
    pub gateway_backoff_max: Duration,
    pub breaker_threshold: u32,
    pub breaker_cooldown: Duration,
    pub internal_secret: Option<String>,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8086,
            database_url: None,
            kafka_bootstrap: "localhost:9092".into(),
            order_created_topic: "order.created".into(),
            payment_created_topic: "payment.created".into(),
            consumer_group: "payment-service-group".into(),
            consumer_concurrency: 8,
            gateway_timeout: Duration::from_millis(5000),
            gateway_max_attempts: 3,
            gateway_backoff_base: Duration::from_millis(100),
            gateway_backoff_max: Duration::from_millis(2000),
            breaker_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
            internal_secret: None,
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

impl PaymentConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            host: non_empty("HOST").unwrap_or(d.host),
            port: parse_or("PORT", d.port),
            database_url: non_empty("DATABASE_URL"),
            kafka_bootstrap: non_empty("KAFKA_BOOTSTRAP").unwrap_or(d.kafka_bootstrap),
            order_created_topic: non_empty("ORDER_CREATED_TOPIC").unwrap_or(d.order_created_topic),
            payment_created_topic: non_empty("PAYMENT_CREATED_TOPIC").unwrap_or(d.payment_created_topic),
            consumer_group: non_empty("PAYMENT_CONSUMER_GROUP").unwrap_or(d.consumer_group),
            consumer_concurrency: parse_or("ORDER_CONSUMER_CONCURRENCY", d.consumer_concurrency).max(1),
            gateway_timeout: Duration::from_millis(parse_or("GATEWAY_TIMEOUT_MS", 5000)),
            gateway_max_attempts: parse_or("GATEWAY_MAX_ATTEMPTS", d.gateway_max_attempts).max(1),
            gateway_backoff_base: Duration::from_millis(parse_or("GATEWAY_BACKOFF_BASE_MS", 100)),
            gateway_backoff_max: Duration::from_millis(parse_or("GATEWAY_BACKOFF_MAX_MS", 2000)),
            breaker_threshold: parse_or("GATEWAY_BREAKER_THRESHOLD", d.breaker_threshold).max(1),
            breaker_cooldown: Duration::from_secs(parse_or("GATEWAY_BREAKER_COOLDOWN_SECS", 30)),
            internal_secret: non_empty("INTERNAL_GATEWAY_SECRET"),
        }
    }

    pub fn bind_addr(&self) -> anyhow::Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().with_context(|| format!("invalid HOST {:?}", self.host))?;
        Ok(SocketAddr::new(ip, self.port))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.gateway_max_attempts,
            initial_backoff: self.gateway_backoff_base,
            max_backoff: self.gateway_backoff_max,
            attempt_timeout: self.gateway_timeout,
        }
    }

    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig { failure_threshold: self.breaker_threshold, cooldown: self.breaker_cooldown }
    }
}
