use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Invoice, Payment, PaymentMethod, PaymentStatus, UserBasicInfo};

/// One parsed line of a settlement file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericPaymentFileRecord {
    pub payment_number: String,
    pub amount: Decimal,
    /// Raw code as reported by the institution (DD `0`..`9`, CS `01`..`03`).
    pub result_code: String,
    #[serde(default)]
    pub payment_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validated_date: Option<DateTime<Utc>>,
    /// Numeric timestamp (e.g. `20230115`) used to pick between resubmitted lines.
    #[serde(default)]
    pub created_date: i64,
}

impl GenericPaymentFileRecord {
    pub fn new(payment_number: impl Into<String>, amount: Decimal, result_code: impl Into<String>) -> Self {
        Self {
            payment_number: payment_number.into(),
            amount,
            result_code: result_code.into(),
            payment_date: None,
            validated_date: None,
            created_date: 0,
        }
    }

    pub fn with_payment_date(mut self, date: DateTime<Utc>) -> Self {
        self.payment_date = Some(date);
        self
    }

    pub fn with_validated_date(mut self, date: DateTime<Utc>) -> Self {
        self.validated_date = Some(date);
        self
    }

    pub fn with_created_date(mut self, created_date: i64) -> Self {
        self.created_date = created_date;
        self
    }
}

/// Settlement file after format-specific parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenericPaymentFile {
    pub payment_method: PaymentMethod,
    #[serde(rename = "records")]
    pub generic_payment_data: Vec<GenericPaymentFileRecord>,
    #[serde(default)]
    pub transferred_total_amount: Decimal,
    #[serde(default)]
    pub transferred_number: i32,
    #[serde(default)]
    pub failed_total_amount: Decimal,
    #[serde(default)]
    pub failed_number: i32,
}

impl GenericPaymentFile {
    pub fn new(payment_method: PaymentMethod, records: Vec<GenericPaymentFileRecord>) -> Self {
        Self {
            payment_method,
            generic_payment_data: records,
            transferred_total_amount: Decimal::ZERO,
            transferred_number: 0,
            failed_total_amount: Decimal::ZERO,
            failed_number: 0,
        }
    }
}

/// Payment, invoice and student fetched together for one payment number.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentInvoiceUser {
    pub payment: Payment,
    pub invoice: Invoice,
    /// `None` when the invoice's student has no basic info row.
    pub user: Option<UserBasicInfo>,
}

/// Read-model row returned to the caller; never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedPayment {
    pub payment_sequence_number: i32,
    pub result_code: String,
    /// Invoice total, not the reported amount.
    pub amount: Decimal,
    pub student_id: String,
    pub student_name: String,
    pub payment_method: PaymentMethod,
    pub invoice_sequence_number: i32,
    pub payment_created_date: DateTime<Utc>,
    pub invoice_id: Uuid,
    pub payment_status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentValidationResult {
    pub validated_payments: Vec<ValidatedPayment>,
    pub validation_date: DateTime<Utc>,
    pub successful_payments: i32,
    pub pending_payments: i32,
    pub failed_payments: i32,
}
