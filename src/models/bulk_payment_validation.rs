use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::{PaymentMethod, PaymentStatus};

/// Aggregate row for one validation pass over an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BulkPaymentValidation {
    pub bulk_payment_validations_id: Uuid,
    pub payment_method: PaymentMethod,
    pub successful_payments: i32,
    pub pending_payments: i32,
    pub failed_payments: i32,
    pub validation_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BulkPaymentValidation {
    /// Opens a run with zeroed tallies.
    pub fn start(payment_method: PaymentMethod, validation_date: DateTime<Utc>) -> Self {
        Self {
            bulk_payment_validations_id: Uuid::new_v4(),
            payment_method,
            successful_payments: 0,
            pending_payments: 0,
            failed_payments: 0,
            validation_date,
            created_at: validation_date,
            updated_at: validation_date,
        }
    }

    /// Closes the run: stores the tallies and restamps the validation date.
    pub fn finish(&mut self, successful: i32, pending: i32, failed: i32, validated_at: DateTime<Utc>) {
        self.successful_payments = successful;
        self.pending_payments = pending;
        self.failed_payments = failed;
        self.validation_date = validated_at;
        self.updated_at = validated_at;
    }

    pub fn total_payments(&self) -> i32 {
        self.successful_payments + self.pending_payments + self.failed_payments
    }
}

/// Per-record audit row linking a run to the invoice and payment it touched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct BulkPaymentValidationDetail {
    pub bulk_payment_validations_detail_id: Uuid,
    pub bulk_payment_validations_id: Uuid,
    pub invoice_id: Uuid,
    pub payment_id: Uuid,
    pub validated_result_code: String,
    pub previous_result_code: Option<String>,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl BulkPaymentValidationDetail {
    pub fn new(
        bulk_payment_validations_id: Uuid,
        invoice_id: Uuid,
        payment_id: Uuid,
        validated_result_code: impl Into<String>,
        previous_result_code: Option<String>,
        payment_status: PaymentStatus,
    ) -> Self {
        Self {
            bulk_payment_validations_detail_id: Uuid::new_v4(),
            bulk_payment_validations_id,
            invoice_id,
            payment_id,
            validated_result_code: validated_result_code.into(),
            previous_result_code,
            payment_status,
            created_at: Utc::now(),
        }
    }
}
