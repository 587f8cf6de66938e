use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use payment_service::config::PaymentConfig;
use payment_service::events::EventPublisher;
use payment_service::gateway::SimulatedProcessor;
use payment_service::metrics::PaymentMetrics;
use payment_service::repo::{InMemoryPaymentStore, PaymentStore, PgPaymentStore};
use payment_service::resilience::ResilientGateway;
use payment_service::{build_router, AppState, PaymentEngine};

#[cfg(any(feature = "kafka", feature = "kafka-producer"))]
fn build_publisher(config: &PaymentConfig) -> anyhow::Result<Arc<dyn EventPublisher>> {
    use payment_service::events::KafkaEventPublisher;
    use rdkafka::producer::FutureProducer;

    let producer: FutureProducer = rdkafka::ClientConfig::new()
        .set("bootstrap.servers", &config.kafka_bootstrap)
        .create()
        .context("create kafka producer")?;
    info!(bootstrap = %config.kafka_bootstrap, topic = %config.payment_created_topic, "kafka_publisher_ready");
    Ok(Arc::new(KafkaEventPublisher::new(producer, config.payment_created_topic.clone())))
}

#[cfg(not(any(feature = "kafka", feature = "kafka-producer")))]
fn build_publisher(_config: &PaymentConfig) -> anyhow::Result<Arc<dyn EventPublisher>> {
    warn!("built without kafka; payment.created events are only logged");
    Ok(Arc::new(payment_service::events::LoggingEventPublisher))
}

async fn build_store(config: &PaymentConfig) -> anyhow::Result<Arc<dyn PaymentStore>> {
    match &config.database_url {
        Some(url) => {
            let pool = PgPool::connect(url).await.context("connect DATABASE_URL")?;
            info!("using postgres payment store");
            Ok(Arc::new(PgPaymentStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL not set; payments are kept in memory");
            Ok(Arc::new(InMemoryPaymentStore::new()))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = PaymentConfig::from_env();
    let metrics = Arc::new(PaymentMetrics::new().context("register payment metrics")?);
    let store = build_store(&config).await?;
    let gateway = Arc::new(ResilientGateway::new(
        SimulatedProcessor::new(),
        config.retry_policy(),
        config.breaker_config(),
    ));
    let publisher = build_publisher(&config)?;
    let engine = Arc::new(PaymentEngine::new(store, gateway, publisher).with_metrics(metrics.clone()));

    #[cfg(any(feature = "kafka", feature = "kafka-producer"))]
    {
        let consumer = payment_service::consumer::build_consumer(&config)?;
        tokio::spawn(payment_service::consumer::run_order_consumer(consumer, engine.clone(), config.consumer_concurrency));
    }

    let state = AppState::new(engine, metrics).with_internal_secret(config.internal_secret.clone());
    let app = build_router(state);

    let addr = config.bind_addr()?;
    info!(%addr, "starting payment-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
