use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Channel through which a payment is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    DirectDebit,
    ConvenienceStore,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::DirectDebit => "DIRECT_DEBIT",
            PaymentMethod::ConvenienceStore => "CONVENIENCE_STORE",
        }
    }

    /// Leading letter of every result code rendered for this method.
    pub fn prefix_code(&self) -> &'static str {
        match self {
            PaymentMethod::DirectDebit => "D",
            PaymentMethod::ConvenienceStore => "C",
        }
    }

    /// Stable numeric key used for advisory locking.
    pub fn lock_key(&self) -> i32 {
        match self {
            PaymentMethod::DirectDebit => 1,
            PaymentMethod::ConvenienceStore => 2,
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Successful,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Successful => "SUCCESSFUL",
            PaymentStatus::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A payment attempt against exactly one invoice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub payment_id: Uuid,
    pub payment_sequence_number: i32,
    pub invoice_id: Uuid,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    /// Last rendered result code, e.g. `C-R1-1`.
    pub result_code: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub validated_date: Option<DateTime<Utc>>,
    pub receipt_date: Option<DateTime<Utc>>,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Creates a pending payment for an invoice.
    pub fn pending(
        payment_sequence_number: i32,
        invoice_id: Uuid,
        payment_method: PaymentMethod,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            payment_id: Uuid::new_v4(),
            payment_sequence_number,
            invoice_id,
            payment_method,
            payment_status: PaymentStatus::Pending,
            result_code: None,
            payment_date: None,
            validated_date: None,
            receipt_date: None,
            amount,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_status(mut self, status: PaymentStatus) -> Self {
        self.payment_status = status;
        self
    }

    pub fn with_result_code(mut self, result_code: impl Into<String>) -> Self {
        self.result_code = Some(result_code.into());
        self
    }

    /// True when a result code from an earlier validation is present.
    pub fn has_result_code(&self) -> bool {
        self.result_code.as_deref().is_some_and(|code| !code.is_empty())
    }
}

/// Payment columns that a validation pass may write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentField {
    ResultCode,
    PaymentDate,
    ValidatedDate,
    PaymentStatus,
    ReceiptDate,
    Amount,
}

impl PaymentField {
    pub fn column(&self) -> &'static str {
        match self {
            PaymentField::ResultCode => "result_code",
            PaymentField::PaymentDate => "payment_date",
            PaymentField::ValidatedDate => "validated_date",
            PaymentField::PaymentStatus => "payment_status",
            PaymentField::ReceiptDate => "receipt_date",
            PaymentField::Amount => "amount",
        }
    }
}
