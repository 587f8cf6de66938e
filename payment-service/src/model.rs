use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 3] = [PaymentStatus::Pending, PaymentStatus::Success, PaymentStatus::Failed];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<PaymentStatus> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Valid transitions:
/// PENDING -> SUCCESS | FAILED
/// SUCCESS and FAILED are terminal.
pub fn is_valid_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    matches!((from, to), (PaymentStatus::Pending, PaymentStatus::Success | PaymentStatus::Failed))
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("invalid payment status transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: PaymentStatus,
    pub to: PaymentStatus,
}

/// Show only the last four characters of a payment credential.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(4)..].iter().collect();
    format!("****{tail}")
}

/// One attempt to settle an order.
///
/// `amount` and `status` are crate-private so that the amount stays fixed after creation and
/// status only moves through [`Payment::mark_success`] / [`Payment::mark_failed`].
#[derive(Clone, PartialEq)]
pub struct Payment {
    pub id: Option<String>,
    pub order_id: String,
    pub user_id: String,
    pub(crate) amount: BigDecimal,
    pub currency: String,
    pub(crate) status: PaymentStatus,
    pub timestamp: DateTime<Utc>,
    pub description: Option<String>,
    pub payment_method_token: String,
    pub processor_transaction_id: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
}

impl Payment {
    pub fn pending(
        order_id: impl Into<String>,
        user_id: impl Into<String>,
        amount: BigDecimal,
        currency: impl Into<String>,
        payment_method_token: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            id: None,
            order_id: order_id.into(),
            user_id: user_id.into(),
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            timestamp: Utc::now(),
            description,
            payment_method_token: payment_method_token.into(),
            processor_transaction_id: None,
            error_code: None,
            error_message: None,
        }
    }

    pub fn amount(&self) -> &BigDecimal { &self.amount }

    pub fn status(&self) -> PaymentStatus { self.status }

    fn transition(&mut self, to: PaymentStatus) -> Result<(), InvalidTransition> {
        if !is_valid_transition(self.status, to) {
            return Err(InvalidTransition { from: self.status, to });
        }
        self.status = to;
        Ok(())
    }

    pub fn mark_success(&mut self, transaction_id: impl Into<String>) -> Result<(), InvalidTransition> {
        self.transition(PaymentStatus::Success)?;
        self.processor_transaction_id = Some(transaction_id.into());
        Ok(())
    }

    /// Move to FAILED. The transaction id is kept when the processor accepted the attempt but
    /// signalled failure; the error pair is set only when there is one to record.
    pub fn mark_failed(
        &mut self,
        transaction_id: Option<String>,
        error_code: Option<&str>,
        error_message: Option<String>,
    ) -> Result<(), InvalidTransition> {
        self.transition(PaymentStatus::Failed)?;
        self.processor_transaction_id = transaction_id;
        self.error_code = error_code.map(str::to_string);
        self.error_message = error_message;
        Ok(())
    }

    /// Overwrite an already-failed attempt's error details before the follow-up save.
    pub(crate) fn record_failure(&mut self, error_code: &str, error_message: String) {
        self.status = PaymentStatus::Failed;
        self.error_code = Some(error_code.to_string());
        self.error_message = Some(error_message);
    }

    pub fn masked_token(&self) -> String { mask_token(&self.payment_method_token) }
}

impl fmt::Debug for Payment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payment")
            .field("id", &self.id)
            .field("order_id", &self.order_id)
            .field("user_id", &self.user_id)
            .field("amount", &self.amount)
            .field("currency", &self.currency)
            .field("status", &self.status)
            .field("timestamp", &self.timestamp)
            .field("description", &self.description)
            .field("payment_method_token", &self.masked_token())
            .field("processor_transaction_id", &self.processor_transaction_id)
            .field("error_code", &self.error_code)
            .field("error_message", &self.error_message)
            .finish()
    }
}
