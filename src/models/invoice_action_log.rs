use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Audit action recorded against an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_action", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceAction {
    /// Never persisted.
    NoAction,
    InvoicePaid,
    InvoiceFailed,
    PaymentUpdated,
    PaymentValidateSuccess,
    PaymentValidateFailed,
}

impl InvoiceAction {
    pub fn is_no_action(&self) -> bool {
        matches!(self, InvoiceAction::NoAction)
    }
}

/// Append-only audit trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct InvoiceActionLog {
    pub action_log_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_sequence_number: i32,
    pub action: InvoiceAction,
    pub action_detail: String,
    pub bulk_payment_validations_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl InvoiceActionLog {
    pub fn new(
        invoice_id: Uuid,
        payment_sequence_number: i32,
        action: InvoiceAction,
        action_detail: impl Into<String>,
        bulk_payment_validations_id: Uuid,
    ) -> Self {
        Self {
            action_log_id: Uuid::new_v4(),
            invoice_id,
            payment_sequence_number,
            action,
            action_detail: action_detail.into(),
            bulk_payment_validations_id,
            created_at: Utc::now(),
        }
    }
}
