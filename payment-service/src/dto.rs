use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use common_money::{validate_charge, CurrencyCode, MoneyError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::PaymentError;
use crate::model::{Payment, PaymentStatus};

/// Body of `POST /payment`.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub payment_method_token: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub order_id: String,
    pub user_id: String,
    #[serde(default)]
    pub description: Option<String>,
}

fn require_non_blank(value: &str, code: &'static str, field: &str) -> Result<(), PaymentError> {
    if value.trim().is_empty() {
        return Err(PaymentError::validation(code, format!("{field} must not be blank")));
    }
    Ok(())
}

impl PaymentRequest {
    pub fn validate(&self) -> Result<(), PaymentError> {
        require_non_blank(&self.payment_method_token, "invalid_payment_method_token", "paymentMethodToken")?;
        require_non_blank(&self.order_id, "invalid_order_id", "orderId")?;
        require_non_blank(&self.user_id, "invalid_user_id", "userId")?;
        validate_charge(&self.amount).map_err(|e| PaymentError::validation("invalid_amount", e.to_string()))?;
        self.currency
            .parse::<CurrencyCode>()
            .map_err(|e: MoneyError| PaymentError::validation("invalid_currency", e.to_string()))?;
        Ok(())
    }
}

impl std::fmt::Debug for PaymentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentRequest")
            .field("order_id", &self.order_id)
            .field("user_id", &self.user_id)
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("payment_method_token", &crate::model::mask_token(&self.payment_method_token))
            .finish()
    }
}

/// Caller-facing projection. The payment method token is never exposed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: Option<String>,
    pub order_id: String,
    pub user_id: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub processor_transaction_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl From<&Payment> for PaymentResponse {
    fn from(p: &Payment) -> Self {
        Self {
            id: p.id.clone(),
            order_id: p.order_id.clone(),
            user_id: p.user_id.clone(),
            amount: p.amount().clone(),
            currency: p.currency.clone(),
            status: p.status(),
            timestamp: p.timestamp,
            description: p.description.clone(),
            processor_transaction_id: p.processor_transaction_id.clone(),
            error_code: p.error_code.clone(),
            error_message: p.error_message.clone(),
        }
    }
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self { PaymentResponse::from(&p) }
}

/// Settlement totals for an inclusive period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub total_amount: Option<BigDecimal>,
    pub by_status: BTreeMap<String, usize>,
}
