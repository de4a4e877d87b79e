use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, info_span, Instrument};

use crate::error::Result;
use crate::models::{BulkPaymentValidation, GenericPaymentFile, PaymentValidationResult};
use crate::observability::{get_metrics, mask_amount, LatencyTimer};
use crate::repositories::{TransactionManager, UnitOfWork};

use super::duplicate_resolver::resolve_duplicates;
use super::feature_flags::{FeatureFlagProvider, ValidationOptions};
use super::materializer::{materializer_for, CanonicalRecord, MaterializedRun};
use super::record_validator::RunContext;

/// Runs one validation pass over a parsed settlement file.
///
/// The whole pass shares one transaction: the run row, every payment and
/// invoice update, the audit rows and the final tallies commit together or
/// not at all.
pub struct PaymentFileValidator {
    transactions: Arc<dyn TransactionManager>,
    flags: Arc<dyn FeatureFlagProvider>,
    advisory_lock: bool,
}

impl PaymentFileValidator {
    pub fn new(transactions: Arc<dyn TransactionManager>, flags: Arc<dyn FeatureFlagProvider>) -> Self {
        Self {
            transactions,
            flags,
            advisory_lock: false,
        }
    }

    /// Serializes passes of the same payment method through the unit of work's lock.
    pub fn with_advisory_lock(mut self, enabled: bool) -> Self {
        self.advisory_lock = enabled;
        self
    }

    pub async fn validate(&self, file: &GenericPaymentFile) -> Result<PaymentValidationResult> {
        let options = ValidationOptions::resolve(self.flags.as_ref()).await?;
        self.validate_with_options(file, options).await
    }

    /// Same as [`validate`](Self::validate) with flags already resolved.
    pub async fn validate_with_options(
        &self,
        file: &GenericPaymentFile,
        options: ValidationOptions,
    ) -> Result<PaymentValidationResult> {
        let method = file.payment_method;
        let span = info_span!(
            "bulk_payment_validation",
            method = %method,
            strategy = options.strategy.as_str(),
            phase = ?options.phase,
        );

        async move {
            let timer = LatencyTimer::new();
            let metrics = get_metrics();
            metrics.record_run_started(method.as_str(), options.strategy.as_str());

            let selection = resolve_duplicates(method, &file.generic_payment_data);
            if selection.dropped > 0 {
                info!("Dropped {} duplicate lines from {} file", selection.dropped, method);
                metrics.record_duplicates_dropped(method.as_str(), selection.dropped as u64);
            }
            let records: Vec<CanonicalRecord> = selection
                .indices
                .iter()
                .map(|&index| CanonicalRecord {
                    line_no: index + 1,
                    record: file.generic_payment_data[index].clone(),
                })
                .collect();

            info!(
                "Validating {} records (transferred {} / {}, failed {} / {})",
                records.len(),
                file.transferred_number,
                mask_amount(&file.transferred_total_amount),
                file.failed_number,
                mask_amount(&file.failed_total_amount)
            );

            let mut uow = self.transactions.begin().await?;
            match self.run_in_transaction(uow.as_mut(), file, options, &records).await {
                Ok(result) => {
                    uow.commit().await?;
                    metrics.record_run_completed(method.as_str(), records.len() as u64, timer.elapsed_ms());
                    info!(
                        "Validation committed: {} successful, {} pending, {} failed in {:.2}ms",
                        result.successful_payments,
                        result.pending_payments,
                        result.failed_payments,
                        timer.elapsed_ms()
                    );
                    Ok(result)
                }
                Err(e) => {
                    error!("Validation failed, rolling back: {}", e);
                    metrics.record_run_failed(method.as_str(), failure_reason(&e));
                    if let Err(rollback_err) = uow.rollback().await {
                        error!("Rollback failed: {}", rollback_err);
                    }
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_in_transaction(
        &self,
        uow: &mut dyn UnitOfWork,
        file: &GenericPaymentFile,
        options: ValidationOptions,
        records: &[CanonicalRecord],
    ) -> Result<PaymentValidationResult> {
        let method = file.payment_method;
        if self.advisory_lock {
            uow.lock_payment_method(method).await?;
        }

        let started_at = Utc::now();
        let mut run = BulkPaymentValidation::start(method, started_at);
        run.bulk_payment_validations_id = uow
            .bulk_validations()
            .create(&run)
            .await
            .map_err(|e| e.context("unable to create bulk payment validations"))?;

        let ctx = RunContext {
            bulk_payment_validations_id: run.bulk_payment_validations_id,
            file_method: method,
            phase: options.phase,
            receipt_date: started_at,
        };

        let materialized: MaterializedRun = materializer_for(options.strategy)
            .materialize(uow, &ctx, records)
            .await?;

        let tally = materialized.tally;
        run.finish(tally.successful, tally.pending, tally.failed, Utc::now());
        uow.bulk_validations()
            .update_with_fields(&run)
            .await
            .map_err(|e| e.context("error updating bulk payment validations"))?;

        Ok(PaymentValidationResult {
            validated_payments: materialized.validated_payments,
            validation_date: run.validation_date,
            successful_payments: run.successful_payments,
            pending_payments: run.pending_payments,
            failed_payments: run.failed_payments,
        })
    }
}

fn failure_reason(e: &crate::error::AppError) -> &'static str {
    if e.is_validation() {
        "validation"
    } else {
        "infrastructure"
    }
}
