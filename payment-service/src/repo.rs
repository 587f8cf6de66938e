use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_money::sum_amounts;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::model::{Payment, PaymentStatus};

/// Durable keyed collection of payments. Every multi-row query returns rows ordered by
/// `timestamp` ascending.
#[async_trait::async_trait]
pub trait PaymentStore: Send + Sync {
    /// Insert, or replace every column of the row with the same id. A payment without an id
    /// gets a fresh one.
    async fn save(&self, payment: &Payment) -> Result<Payment>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>>;
    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<Payment>>;
    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Payment>>;
    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>>;
    async fn find_by_status_in(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>>;
    /// Inclusive on both ends.
    async fn find_by_date_range_and_status(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>>;
    /// `None` when no payment falls in the period.
    async fn sum_amount_by_period(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Option<BigDecimal>>;
}

#[derive(Clone, Default)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<String, Payment>>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self { Self::default() }

    async fn select(&self, pred: impl Fn(&Payment) -> bool) -> Vec<Payment> {
        let guard = self.payments.read().await;
        let mut rows: Vec<Payment> = guard.values().filter(|p| pred(p)).cloned().collect();
        rows.sort_by_key(|p| p.timestamp);
        rows
    }
}

#[async_trait::async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn save(&self, payment: &Payment) -> Result<Payment> {
        let mut stored = payment.clone();
        let id = stored.id.get_or_insert_with(|| Uuid::new_v4().to_string()).clone();
        self.payments.write().await.insert(id, stored.clone());
        Ok(stored)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(id).cloned())
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<Payment>> {
        Ok(self.select(|p| p.order_id == order_id).await)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Payment>> {
        Ok(self.select(|p| p.user_id == user_id).await)
    }

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>> {
        Ok(self.select(|p| p.status == status).await)
    }

    async fn find_by_status_in(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>> {
        Ok(self.select(|p| statuses.contains(&p.status)).await)
    }

    async fn find_by_date_range_and_status(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>> {
        Ok(self.select(|p| p.status == status && p.timestamp >= from && p.timestamp <= to).await)
    }

    async fn sum_amount_by_period(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Option<BigDecimal>> {
        let rows = self.select(|p| p.timestamp >= from && p.timestamp <= to).await;
        Ok(sum_amounts(rows.iter().map(|p| &p.amount)))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: String,
    order_id: String,
    user_id: String,
    amount: BigDecimal,
    currency: String,
    status: String,
    timestamp: DateTime<Utc>,
    description: Option<String>,
    payment_method_token: String,
    processor_transaction_id: Option<String>,
    error_code: Option<String>,
    error_message: Option<String>,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = anyhow::Error;

    fn try_from(row: PaymentRow) -> Result<Self> {
        let status = PaymentStatus::parse(&row.status)
            .ok_or_else(|| anyhow!("unknown payment status {:?} for payment {}", row.status, row.id))?;
        Ok(Payment {
            id: Some(row.id),
            order_id: row.order_id,
            user_id: row.user_id,
            amount: row.amount,
            currency: row.currency,
            status,
            timestamp: row.timestamp,
            description: row.description,
            payment_method_token: row.payment_method_token,
            processor_transaction_id: row.processor_transaction_id,
            error_code: row.error_code,
            error_message: row.error_message,
        })
    }
}

const COLUMNS: &str = "id, order_id, user_id, amount, currency, status, timestamp, description, \
     payment_method_token, processor_transaction_id, error_code, error_message";

/// Postgres-backed store; schema lives in `migrations/0001_payments.sql`.
#[derive(Clone)]
pub struct PgPaymentStore {
    db: PgPool,
}

impl PgPaymentStore {
    pub fn new(db: PgPool) -> Self { Self { db } }
}

fn into_payments(rows: Vec<PaymentRow>) -> Result<Vec<Payment>> {
    rows.into_iter().map(Payment::try_from).collect()
}

#[async_trait::async_trait]
impl PaymentStore for PgPaymentStore {
    async fn save(&self, payment: &Payment) -> Result<Payment> {
        let id = payment.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let sql = format!(
            r#"INSERT INTO payments ({COLUMNS})
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
               ON CONFLICT (id) DO UPDATE SET
                   order_id = EXCLUDED.order_id,
                   user_id = EXCLUDED.user_id,
                   amount = EXCLUDED.amount,
                   currency = EXCLUDED.currency,
                   status = EXCLUDED.status,
                   timestamp = EXCLUDED.timestamp,
                   description = EXCLUDED.description,
                   payment_method_token = EXCLUDED.payment_method_token,
                   processor_transaction_id = EXCLUDED.processor_transaction_id,
                   error_code = EXCLUDED.error_code,
                   error_message = EXCLUDED.error_message
               RETURNING {COLUMNS}"#
        );
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(&id)
            .bind(&payment.order_id)
            .bind(&payment.user_id)
            .bind(&payment.amount)
            .bind(&payment.currency)
            .bind(payment.status.as_str())
            .bind(payment.timestamp)
            .bind(&payment.description)
            .bind(&payment.payment_method_token)
            .bind(&payment.processor_transaction_id)
            .bind(&payment.error_code)
            .bind(&payment.error_message)
            .fetch_one(&self.db)
            .await?;
        Payment::try_from(row)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE id = $1");
        let row = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.map(Payment::try_from).transpose()
    }

    async fn find_by_order_id(&self, order_id: &str) -> Result<Vec<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE order_id = $1 ORDER BY timestamp");
        let rows = sqlx::query_as::<_, PaymentRow>(&sql).bind(order_id).fetch_all(&self.db).await?;
        into_payments(rows)
    }

    async fn find_by_user_id(&self, user_id: &str) -> Result<Vec<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE user_id = $1 ORDER BY timestamp");
        let rows = sqlx::query_as::<_, PaymentRow>(&sql).bind(user_id).fetch_all(&self.db).await?;
        into_payments(rows)
    }

    async fn find_by_status(&self, status: PaymentStatus) -> Result<Vec<Payment>> {
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE status = $1 ORDER BY timestamp");
        let rows = sqlx::query_as::<_, PaymentRow>(&sql).bind(status.as_str()).fetch_all(&self.db).await?;
        into_payments(rows)
    }

    async fn find_by_status_in(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>> {
        let names: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let sql = format!("SELECT {COLUMNS} FROM payments WHERE status = ANY($1) ORDER BY timestamp");
        let rows = sqlx::query_as::<_, PaymentRow>(&sql).bind(names).fetch_all(&self.db).await?;
        into_payments(rows)
    }

    async fn find_by_date_range_and_status(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        status: PaymentStatus,
    ) -> Result<Vec<Payment>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM payments WHERE timestamp >= $1 AND timestamp <= $2 AND status = $3 ORDER BY timestamp"
        );
        let rows = sqlx::query_as::<_, PaymentRow>(&sql)
            .bind(from)
            .bind(to)
            .bind(status.as_str())
            .fetch_all(&self.db)
            .await?;
        into_payments(rows)
    }

    async fn sum_amount_by_period(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Option<BigDecimal>> {
        let total = sqlx::query_scalar::<_, Option<BigDecimal>>(
            "SELECT SUM(amount) FROM payments WHERE timestamp >= $1 AND timestamp <= $2",
        )
        .bind(from)
        .bind(to)
        .fetch_one(&self.db)
        .await?;
        Ok(total)
    }
}
