use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    BulkPaymentValidationDetail, GenericPaymentFileRecord, Invoice, InvoiceActionLog, InvoiceField,
    Payment, PaymentField, UserBasicInfo, ValidatedPayment,
};
use crate::observability::{get_metrics, mask_payment_number};
use crate::repositories::UnitOfWork;

use super::feature_flags::MaterializationStrategy;
use super::record_validator::{parse_payment_number, reconcile_record, RecordOutcome, RunContext, ValidationTally};

/// A record that survived duplicate resolution, with its 1-based file line.
#[derive(Debug, Clone)]
pub struct CanonicalRecord {
    pub line_no: usize,
    pub record: GenericPaymentFileRecord,
}

#[derive(Debug, Clone, Default)]
pub struct MaterializedRun {
    pub validated_payments: Vec<ValidatedPayment>,
    pub tally: ValidationTally,
}

impl MaterializedRun {
    fn push(&mut self, outcome: &RecordOutcome, ctx: &RunContext, user: &UserBasicInfo) {
        self.tally.add(outcome.tally);
        self.validated_payments
            .push(outcome.validated_payment(ctx.file_method, user));
        get_metrics().record_outcome(ctx.file_method.as_str(), outcome.tally.label());
    }
}

/// Loads, validates and writes every canonical record inside the caller's unit of work.
#[async_trait]
pub trait Materializer: Send + Sync {
    fn strategy(&self) -> MaterializationStrategy;

    async fn materialize(
        &self,
        uow: &mut dyn UnitOfWork,
        ctx: &RunContext,
        records: &[CanonicalRecord],
    ) -> Result<MaterializedRun>;
}

pub fn materializer_for(strategy: MaterializationStrategy) -> Box<dyn Materializer> {
    match strategy {
        MaterializationStrategy::Legacy => Box::new(LegacyMaterializer),
        MaterializationStrategy::Optimized => Box::new(OptimizedMaterializer),
    }
}

fn at_line(what: &str, line_no: usize) -> String {
    format!("{} at line {}", what, line_no)
}

/// One read and one write round trip per record.
#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyMaterializer;

#[async_trait]
impl Materializer for LegacyMaterializer {
    fn strategy(&self) -> MaterializationStrategy {
        MaterializationStrategy::Legacy
    }

    async fn materialize(
        &self,
        uow: &mut dyn UnitOfWork,
        ctx: &RunContext,
        records: &[CanonicalRecord],
    ) -> Result<MaterializedRun> {
        let mut run = MaterializedRun::default();

        for canonical in records {
            let line_no = canonical.line_no;
            let payment_number = parse_payment_number(&canonical.record, line_no)?;

            let payment = uow
                .payments()
                .find_by_payment_sequence_number(payment_number)
                .await
                .map_err(|e| e.context(at_line("error finding payment record", line_no)))?;
            let invoice = uow
                .invoices()
                .retrieve_invoice_by_invoice_id(payment.invoice_id)
                .await
                .map_err(|e| e.context(at_line("error finding invoice record", line_no)))?;

            let outcome = reconcile_record(ctx, &canonical.record, line_no, payment, invoice)?;

            uow.payments()
                .update_with_fields(&outcome.payment, &outcome.payment_fields)
                .await
                .map_err(|e| e.context(at_line("error updating payment record", line_no)))?;
            uow.invoices()
                .update_with_fields(&outcome.invoice, &outcome.invoice_fields)
                .await
                .map_err(|e| e.context(at_line("error updating invoice record", line_no)))?;
            if let Some(log) = &outcome.action_log {
                uow.action_logs()
                    .create(log)
                    .await
                    .map_err(|e| e.context("unable to create invoice action log"))?;
            }
            uow.validation_details()
                .create(&outcome.detail)
                .await
                .map_err(|e| e.context("unable to create bulk payment validations detail"))?;

            let user = uow
                .users()
                .find_by_id(&outcome.invoice.student_id)
                .await
                .map_err(|e| e.context(at_line("error retrieving user record", line_no)))?;

            debug!(
                "Validated payment {} at line {}: {}",
                mask_payment_number(&canonical.record.payment_number),
                line_no,
                outcome.validation.result_code
            );
            run.push(&outcome, ctx, &user);
        }

        Ok(run)
    }
}

/// Stages every payment number, fetches all entities in one query and
/// writes the results as multi-row batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptimizedMaterializer;

#[async_trait]
impl Materializer for OptimizedMaterializer {
    fn strategy(&self) -> MaterializationStrategy {
        MaterializationStrategy::Optimized
    }

    async fn materialize(
        &self,
        uow: &mut dyn UnitOfWork,
        ctx: &RunContext,
        records: &[CanonicalRecord],
    ) -> Result<MaterializedRun> {
        let mut run = MaterializedRun::default();
        if records.is_empty() {
            return Ok(run);
        }

        // A malformed number is reported when the loop reaches its line, as the legacy path does.
        let parsed: Vec<Result<i32>> = records
            .iter()
            .map(|c| parse_payment_number(&c.record, c.line_no))
            .collect();
        let staged: Vec<i32> = parsed.iter().filter_map(|n| n.as_ref().ok().copied()).collect();

        let rows = if staged.is_empty() {
            Vec::new()
        } else {
            uow.payments()
                .insert_payment_numbers_temp_table(&staged)
                .await
                .map_err(|e| e.context("error staging payment numbers"))?;
            uow.payments()
                .find_payment_invoice_user_from_temp_table()
                .await
                .map_err(|e| e.context("error fetching payment records"))?
        };
        debug!("Fetched {} payment rows for {} records", rows.len(), records.len());

        // Working copies; a later record for the same payment or invoice sees earlier results.
        let mut payments: HashMap<i32, Payment> = HashMap::with_capacity(rows.len());
        let mut invoices: HashMap<Uuid, Invoice> = HashMap::with_capacity(rows.len());
        let mut users: HashMap<String, UserBasicInfo> = HashMap::with_capacity(rows.len());
        for row in rows {
            if let Some(user) = row.user {
                users.insert(user.user_id.clone(), user);
            }
            invoices.entry(row.invoice.invoice_id).or_insert(row.invoice);
            payments.insert(row.payment.payment_sequence_number, row.payment);
        }

        let mut outcomes = Vec::with_capacity(records.len());
        for (canonical, payment_number) in records.iter().zip(parsed) {
            let line_no = canonical.line_no;
            let payment_number = payment_number?;
            let payment = payments.get(&payment_number).cloned().ok_or_else(|| {
                AppError::NotFound(format!("payment with sequence number {} not found", payment_number))
                    .context(at_line("error finding payment record", line_no))
            })?;
            let invoice = invoices.get(&payment.invoice_id).cloned().ok_or_else(|| {
                AppError::NotFound(format!("invoice {} not found", payment.invoice_id))
                    .context(at_line("error finding invoice record", line_no))
            })?;

            let outcome = reconcile_record(ctx, &canonical.record, line_no, payment, invoice)?;

            let user = users.get(&outcome.invoice.student_id).ok_or_else(|| {
                AppError::NotFound(format!("user {} not found", outcome.invoice.student_id))
                    .context(at_line("error retrieving user record", line_no))
            })?;

            payments.insert(payment_number, outcome.payment.clone());
            invoices.insert(outcome.invoice.invoice_id, outcome.invoice.clone());
            run.push(&outcome, ctx, user);
            outcomes.push(outcome);
        }

        let writes = BatchedWrites::from_outcomes(&outcomes);
        writes.apply(uow).await?;

        Ok(run)
    }
}

/// Multi-row writes derived from the ordered outcomes of a pass.
#[derive(Debug, Clone, Default)]
pub struct BatchedWrites {
    /// Final state per payment, in order of first appearance.
    pub payments: Vec<Payment>,
    pub payment_fields: Vec<PaymentField>,
    pub invoices: Vec<Invoice>,
    pub invoice_fields: Vec<InvoiceField>,
    pub details: Vec<BulkPaymentValidationDetail>,
    pub action_logs: Vec<InvoiceActionLog>,
}

impl BatchedWrites {
    pub fn from_outcomes(outcomes: &[RecordOutcome]) -> Self {
        let mut writes = BatchedWrites::default();
        let mut payment_slots: HashMap<Uuid, usize> = HashMap::new();
        let mut invoice_slots: HashMap<Uuid, usize> = HashMap::new();

        for outcome in outcomes {
            match payment_slots.get(&outcome.payment.payment_id) {
                Some(&slot) => writes.payments[slot] = outcome.payment.clone(),
                None => {
                    payment_slots.insert(outcome.payment.payment_id, writes.payments.len());
                    writes.payments.push(outcome.payment.clone());
                }
            }
            match invoice_slots.get(&outcome.invoice.invoice_id) {
                Some(&slot) => writes.invoices[slot] = outcome.invoice.clone(),
                None => {
                    invoice_slots.insert(outcome.invoice.invoice_id, writes.invoices.len());
                    writes.invoices.push(outcome.invoice.clone());
                }
            }

            for field in &outcome.payment_fields {
                if !writes.payment_fields.contains(field) {
                    writes.payment_fields.push(*field);
                }
            }
            for field in &outcome.invoice_fields {
                if !writes.invoice_fields.contains(field) {
                    writes.invoice_fields.push(*field);
                }
            }

            writes.details.push(outcome.detail.clone());
            writes.action_logs.extend(outcome.action_log.clone());
        }

        writes
    }

    pub async fn apply(&self, uow: &mut dyn UnitOfWork) -> Result<()> {
        if !self.payments.is_empty() {
            uow.payments()
                .update_multiple_with_fields(&self.payments, &self.payment_fields)
                .await
                .map_err(|e| e.context("error updating payment records"))?;
        }
        if !self.invoices.is_empty() {
            uow.invoices()
                .update_multiple_with_fields(&self.invoices, &self.invoice_fields)
                .await
                .map_err(|e| e.context("error updating invoice records"))?;
        }
        if !self.details.is_empty() {
            uow.validation_details()
                .create_multiple(&self.details)
                .await
                .map_err(|e| e.context("unable to create bulk payment validations detail"))?;
        }
        if !self.action_logs.is_empty() {
            uow.action_logs()
                .create_multiple(&self.action_logs)
                .await
                .map_err(|e| e.context("unable to create invoice action log"))?;
        }
        Ok(())
    }
}
