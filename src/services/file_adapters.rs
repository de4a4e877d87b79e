//! Front doors for the two settlement file formats.
//!
//! Both formats arrive already decoded into typed records; these adapters only
//! reshape them into a [`GenericPaymentFile`] and hand it to the validator.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{GenericPaymentFile, GenericPaymentFileRecord, PaymentMethod, PaymentValidationResult};

use super::payment_file_validator::PaymentFileValidator;

/// Data line of a Direct Debit transfer result file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectDebitRecord {
    pub payment_number: String,
    pub deposit_amount: Decimal,
    /// Single digit transfer result, `0` meaning collected.
    pub result_code: String,
}

/// Direct Debit file with its header date and trailer totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectDebitFile {
    pub transfer_date: DateTime<Utc>,
    pub records: Vec<DirectDebitRecord>,
    pub transferred_total_amount: Decimal,
    pub transferred_number: i32,
    pub failed_total_amount: Decimal,
    pub failed_number: i32,
}

impl From<DirectDebitFile> for GenericPaymentFile {
    fn from(file: DirectDebitFile) -> Self {
        let transfer_date = file.transfer_date;
        let records = file
            .records
            .into_iter()
            .map(|r| {
                GenericPaymentFileRecord::new(r.payment_number, r.deposit_amount, r.result_code)
                    .with_payment_date(transfer_date)
            })
            .collect();

        GenericPaymentFile {
            payment_method: PaymentMethod::DirectDebit,
            generic_payment_data: records,
            transferred_total_amount: file.transferred_total_amount,
            transferred_number: file.transferred_number,
            failed_total_amount: file.failed_total_amount,
            failed_number: file.failed_number,
        }
    }
}

/// Row of a Convenience Store CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvenienceStoreRecord {
    pub payment_number: String,
    pub amount: Decimal,
    /// Settlement category, `01` preliminary, `02` confirmed, `03` cancelled.
    pub category: String,
    #[serde(default)]
    pub date_of_receipt: Option<DateTime<Utc>>,
    #[serde(default)]
    pub validated_date: Option<DateTime<Utc>>,
    /// `yyyymmdd` creation stamp, newest wins for resubmitted rows.
    pub created_date: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConvenienceStoreFile {
    pub records: Vec<ConvenienceStoreRecord>,
}

impl TryFrom<ConvenienceStoreFile> for GenericPaymentFile {
    type Error = AppError;

    fn try_from(file: ConvenienceStoreFile) -> Result<Self> {
        // CSV files carry no trailer; every row counts as transferred.
        let transferred_total_amount = file.records.iter().map(|r| r.amount).sum();
        let transferred_number = record_count(file.records.len())?;

        let records = file
            .records
            .into_iter()
            .map(|r| GenericPaymentFileRecord {
                payment_number: r.payment_number,
                amount: r.amount,
                result_code: r.category,
                payment_date: r.date_of_receipt,
                validated_date: r.validated_date,
                created_date: r.created_date,
            })
            .collect();

        Ok(GenericPaymentFile {
            payment_method: PaymentMethod::ConvenienceStore,
            generic_payment_data: records,
            transferred_total_amount,
            transferred_number,
            failed_total_amount: Decimal::ZERO,
            failed_number: 0,
        })
    }
}

/// Run tallies are `i32` columns; a file longer than that is rejected up front.
fn record_count(len: usize) -> Result<i32> {
    i32::try_from(len).map_err(|_| {
        AppError::Validation(format!(
            "convenience store file has {} records, more than a run can count",
            len
        ))
    })
}

impl PaymentFileValidator {
    pub async fn validate_direct_debit(&self, file: DirectDebitFile) -> Result<PaymentValidationResult> {
        self.validate(&GenericPaymentFile::from(file)).await
    }

    pub async fn validate_convenience_store(&self, file: ConvenienceStoreFile) -> Result<PaymentValidationResult> {
        self.validate(&GenericPaymentFile::try_from(file)?).await
    }
}
