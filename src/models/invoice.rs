use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Billing status of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "invoice_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Issued,
    Paid,
    Failed,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Failed => "FAILED",
            InvoiceStatus::Void => "VOID",
        }
    }
}

impl std::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub invoice_sequence_number: i32,
    pub student_id: String,
    pub total: Decimal,
    pub amount_paid: Decimal,
    pub outstanding_balance: Decimal,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// Creates an issued invoice with nothing paid yet.
    pub fn issued(invoice_sequence_number: i32, student_id: impl Into<String>, total: Decimal) -> Self {
        let now = Utc::now();
        Self {
            invoice_id: Uuid::new_v4(),
            invoice_sequence_number,
            student_id: student_id.into(),
            total,
            amount_paid: Decimal::ZERO,
            outstanding_balance: total,
            status: InvoiceStatus::Issued,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = status;
        self
    }

    /// Adds a settled amount and recomputes the outstanding balance at two decimal places.
    pub fn apply_payment(&mut self, amount: Decimal) {
        self.amount_paid = (self.amount_paid + amount).round_dp(2);
        self.outstanding_balance = (self.total.round_dp(2) - self.amount_paid).round_dp(2);
    }
}

/// Invoice columns that a validation pass may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvoiceField {
    Status,
    OutstandingBalance,
    AmountPaid,
}

impl InvoiceField {
    pub fn column(&self) -> &'static str {
        match self {
            InvoiceField::Status => "status",
            InvoiceField::OutstandingBalance => "outstanding_balance",
            InvoiceField::AmountPaid => "amount_paid",
        }
    }
}
