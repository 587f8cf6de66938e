use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::PaymentEngine;
use crate::events::OrderCreatedEvent;
use crate::model::Payment;

/// Decode and process one `order.created` payload. Every failure is logged and swallowed so
/// a bad message never stops the consumer; the resulting payment is returned when there is one.
pub async fn handle_order_created_payload(engine: &PaymentEngine, payload: &[u8]) -> Option<Payment> {
    let event: OrderCreatedEvent = match serde_json::from_slice(payload) {
        Ok(evt) => evt,
        Err(e) => {
            warn!(error = %e, bytes = payload.len(), "order_created_decode_failed");
            return None;
        }
    };
    info!(order_id = %event.order_id, "order_created_received");
    let order_id = event.order_id.clone();
    match engine.process_order_created(event).await {
        Ok(payment) => Some(payment),
        Err(e) => {
            error!(%order_id, error = %e, "order_created_processing_failed");
            None
        }
    }
}

/// Runs order payloads on their own tasks with at most `concurrency` in flight.
#[derive(Clone)]
pub struct OrderWorkerPool {
    engine: Arc<PaymentEngine>,
    permits: Arc<Semaphore>,
    concurrency: usize,
}

impl OrderWorkerPool {
    pub fn new(engine: Arc<PaymentEngine>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);
        Self { engine, permits: Arc::new(Semaphore::new(concurrency)), concurrency }
    }

    /// Waits for a free slot, then handles `payload` on a new task. `done` runs after the
    /// payment work finishes, which is where the caller acknowledges the message.
    pub async fn dispatch<F>(&self, payload: Vec<u8>, done: F) -> JoinHandle<()>
    where
        F: FnOnce(Option<&Payment>) + Send + 'static,
    {
        // The semaphore is never closed, so acquiring only waits.
        let permit = self.permits.clone().acquire_owned().await.ok();
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let payment = handle_order_created_payload(&engine, &payload).await;
            done(payment.as_ref());
            drop(permit);
        })
    }

    /// Waits until every dispatched payload has finished.
    pub async fn drain(&self) {
        let all = u32::try_from(self.concurrency).unwrap_or(u32::MAX);
        if let Ok(permits) = self.permits.acquire_many(all).await {
            drop(permits);
        }
    }
}

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
pub use kafka::{build_consumer, run_order_consumer};

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
mod kafka {
    use std::sync::Arc;

    use futures::StreamExt;
    use rdkafka::consumer::{Consumer, StreamConsumer};
    use rdkafka::Message;
    use tracing::{info, warn};

    use super::OrderWorkerPool;
    use crate::config::PaymentConfig;
    use crate::engine::PaymentEngine;

    /// Offsets are stored by hand once a message is processed; the client commits stored
    /// offsets in the background.
    pub fn build_consumer(config: &PaymentConfig) -> anyhow::Result<StreamConsumer> {
        let consumer: StreamConsumer = rdkafka::ClientConfig::new()
            .set("bootstrap.servers", &config.kafka_bootstrap)
            .set("group.id", &config.consumer_group)
            .set("enable.auto.commit", "true")
            .set("enable.auto.offset.store", "false")
            .create()?;
        consumer.subscribe(&[config.order_created_topic.as_str()])?;
        Ok(consumer)
    }

    fn store_offset(consumer: &StreamConsumer, topic: &str, partition: i32, offset: i64) {
        if let Err(e) = consumer.store_offset(topic, partition, offset) {
            warn!(topic, partition, offset, error = %e, "order_created_offset_store_failed");
        }
    }

    /// Messages are handled concurrently up to `concurrency`; a message's offset is stored
    /// only after its payment work is done, so an unfinished order is redelivered.
    pub async fn run_order_consumer(consumer: StreamConsumer, engine: Arc<PaymentEngine>, concurrency: usize) {
        info!(concurrency, "order_created_consumer_started");
        let consumer = Arc::new(consumer);
        let pool = OrderWorkerPool::new(engine, concurrency);
        let mut stream = consumer.stream();
        while let Some(message) = stream.next().await {
            match message {
                Ok(m) => {
                    let (topic, partition, offset) = (m.topic().to_string(), m.partition(), m.offset());
                    let Some(payload) = m.payload().map(<[u8]>::to_vec) else {
                        warn!(offset, "order_created_empty_payload");
                        store_offset(&consumer, &topic, partition, offset);
                        continue;
                    };
                    let acker = consumer.clone();
                    pool.dispatch(payload, move |_| store_offset(&acker, &topic, partition, offset)).await;
                }
                Err(e) => warn!(error = %e, "order_created_consume_error"),
            }
        }
        pool.drain().await;
        warn!("order_created_consumer_stopped");
    }
}
