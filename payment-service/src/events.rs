use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::model::{Payment, PaymentStatus};

/// Inbound: an order is ready to be paid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCreatedEvent {
    pub order_id: String,
    pub user_id: String,
    pub total_amount: BigDecimal,
    pub currency: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub payment_method_token: String,
}

/// Outbound: one per event-driven payment attempt, success or failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCreatedEvent {
    pub order_id: String,
    pub status: PaymentStatus,
    pub payment_id: Option<String>,
    pub error_message: Option<String>,
}

impl From<&Payment> for PaymentCreatedEvent {
    fn from(p: &Payment) -> Self {
        Self {
            order_id: p.order_id.clone(),
            status: p.status(),
            payment_id: p.id.clone(),
            error_message: p.error_message.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("broker rejected event: {0}")]
    Broker(String),
}

#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish_payment_created(&self, event: &PaymentCreatedEvent) -> Result<(), PublishError>;
}

/// Used when no broker is configured: the event only reaches the log.
#[derive(Debug, Clone, Default)]
pub struct LoggingEventPublisher;

#[async_trait::async_trait]
impl EventPublisher for LoggingEventPublisher {
    async fn publish_payment_created(&self, event: &PaymentCreatedEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(event)?;
        info!(order_id = %event.order_id, status = %event.status, %payload, "payment_created_event (no broker)");
        Ok(())
    }
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
pub use kafka::KafkaEventPublisher;

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
mod kafka {
    use std::time::Duration;

    use rdkafka::producer::{FutureProducer, FutureRecord};
    use tracing::debug;

    use super::{EventPublisher, PaymentCreatedEvent, PublishError};

    /// Publishes `PaymentCreated` keyed by order id so events for one order stay ordered.
    #[derive(Clone)]
    pub struct KafkaEventPublisher {
        producer: FutureProducer,
        topic: String,
    }

    impl KafkaEventPublisher {
        pub fn new(producer: FutureProducer, topic: impl Into<String>) -> Self {
            Self { producer, topic: topic.into() }
        }
    }

    #[async_trait::async_trait]
    impl EventPublisher for KafkaEventPublisher {
        async fn publish_payment_created(&self, event: &PaymentCreatedEvent) -> Result<(), PublishError> {
            let payload = serde_json::to_string(event)?;
            self.producer
                .send(
                    FutureRecord::to(&self.topic).payload(&payload).key(&event.order_id),
                    Duration::from_secs(5),
                )
                .await
                .map_err(|(e, _)| PublishError::Broker(e.to_string()))?;
            debug!(topic = %self.topic, order_id = %event.order_id, "payment_created_event_sent");
            Ok(())
        }
    }
}
