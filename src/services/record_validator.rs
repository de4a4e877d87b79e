use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    BulkPaymentValidationDetail, GenericPaymentFileRecord, Invoice, InvoiceAction, InvoiceActionLog,
    InvoiceField, InvoiceStatus, Payment, PaymentField, PaymentMethod, PaymentStatus, UserBasicInfo,
    ValidatedPayment,
};

use super::result_codes::{ResultCodeTable, RulePhase, SystemCode};

const ACTION_DETAIL: &str = "bulk payment validation";

/// Values fixed for the whole validation pass.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub bulk_payment_validations_id: Uuid,
    pub file_method: PaymentMethod,
    pub phase: RulePhase,
    /// Receipt date given to every payment that becomes successful in this pass.
    pub receipt_date: DateTime<Utc>,
}

/// Final result code and target statuses for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultCodeValidation {
    pub result_code: String,
    pub invoice_status: InvoiceStatus,
    pub payment_status: PaymentStatus,
    pub system_code: Option<SystemCode>,
}

/// Bucket a processed record is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tally {
    Successful,
    Pending,
    Failed,
}

impl Tally {
    pub fn label(&self) -> &'static str {
        match self {
            Tally::Successful => "successful",
            Tally::Pending => "pending",
            Tally::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ValidationTally {
    pub successful: i32,
    pub pending: i32,
    pub failed: i32,
}

impl ValidationTally {
    pub fn add(&mut self, tally: Tally) {
        match tally {
            Tally::Successful => self.successful += 1,
            Tally::Pending => self.pending += 1,
            Tally::Failed => self.failed += 1,
        }
    }

    pub fn total(&self) -> i32 {
        self.successful + self.pending + self.failed
    }
}

/// Everything one canonical record writes: the updated payment and invoice,
/// the columns to persist, and the audit rows.
#[derive(Debug, Clone)]
pub struct RecordOutcome {
    pub line_no: usize,
    pub validation: ResultCodeValidation,
    pub previous_invoice_status: InvoiceStatus,
    pub previous_payment_status: PaymentStatus,
    pub payment: Payment,
    pub invoice: Invoice,
    pub payment_fields: Vec<PaymentField>,
    pub invoice_fields: Vec<InvoiceField>,
    pub detail: BulkPaymentValidationDetail,
    pub action_log: Option<InvoiceActionLog>,
    pub tally: Tally,
}

impl RecordOutcome {
    pub fn validated_payment(&self, file_method: PaymentMethod, user: &UserBasicInfo) -> ValidatedPayment {
        ValidatedPayment {
            payment_sequence_number: self.payment.payment_sequence_number,
            result_code: self.validation.result_code.clone(),
            amount: self.invoice.total.round_dp(2),
            student_id: self.invoice.student_id.clone(),
            student_name: user.name.clone(),
            payment_method: file_method,
            invoice_sequence_number: self.invoice.invoice_sequence_number,
            payment_created_date: self.payment.created_at,
            invoice_id: self.invoice.invoice_id,
            payment_status: self.payment.payment_status,
        }
    }
}

/// Parses the payment number of a record; `line_no` is 1-based.
pub fn parse_payment_number(record: &GenericPaymentFileRecord, line_no: usize) -> Result<i32> {
    let raw = record.payment_number.trim();
    if raw.is_empty() {
        return Err(AppError::Validation(format!(
            "payment number is required at line {}",
            line_no
        )));
    }

    raw.parse::<i32>().map_err(|_| {
        AppError::Validation(format!(
            "payment number {} not numeric at line {}",
            record.payment_number, line_no
        ))
    })
}

/// Rejects a record whose stored payment belongs to another collection channel.
pub fn check_payment_method(file_method: PaymentMethod, payment: &Payment, line_no: usize) -> Result<()> {
    if payment.payment_method != file_method {
        return Err(AppError::Validation(format!(
            "processing {} payment file but contains a record for {} in line {}",
            file_method, payment.payment_method, line_no
        )));
    }
    Ok(())
}

/// Computes the result code and target statuses without touching the entities.
pub fn determine_result_code(
    ctx: &RunContext,
    record: &GenericPaymentFileRecord,
    line_no: usize,
    payment: &Payment,
    invoice: &Invoice,
) -> Result<ResultCodeValidation> {
    let method = ctx.file_method;
    let prior_invoice = invoice.status;
    let prior_payment = payment.payment_status;

    if prior_invoice == InvoiceStatus::Paid && prior_payment == PaymentStatus::Successful {
        return Err(AppError::Validation(format!(
            "invalid invoice paid status and payment successful status on payment method: {}",
            method
        )));
    }

    let existing_code = payment.result_code.as_deref().unwrap_or_default();
    match ctx.phase {
        RulePhase::Phase1 => {
            if prior_invoice == InvoiceStatus::Failed
                && prior_payment == PaymentStatus::Failed
                && payment.has_result_code()
            {
                return Err(AppError::Validation(format!(
                    "invalid invoice failed status and payment failed status with existing result code: {} on payment method: {}",
                    existing_code, method
                )));
            }
        }
        RulePhase::Phase2 => {
            if matches!(prior_invoice, InvoiceStatus::Issued | InvoiceStatus::Void)
                && prior_payment == PaymentStatus::Failed
                && payment.has_result_code()
            {
                return Err(AppError::Validation(format!(
                    "invalid invoice issued status and payment failed status with existing result code: {} on payment method: {}",
                    existing_code, method
                )));
            }
        }
    }

    let table = ResultCodeTable::for_method(method, ctx.phase);
    let entry = table.lookup(&record.result_code).ok_or_else(|| {
        AppError::Validation(format!(
            "invalid {} result code at line {}: {}",
            method, line_no, record.result_code
        ))
    })?;

    let amount_mismatch = invoice.total.round_dp(2) != record.amount;
    let ready = prior_invoice == InvoiceStatus::Issued && prior_payment == PaymentStatus::Pending;
    let system_code = SystemCode::evaluate(amount_mismatch, ready);

    let (mut invoice_status, mut payment_status) = (entry.invoice_status, entry.payment_status);
    if system_code.is_some() {
        (invoice_status, payment_status) = table.override_statuses(prior_invoice);
    }

    // Disregard rules win over everything above.
    if prior_invoice == InvoiceStatus::Void && prior_payment == PaymentStatus::Failed {
        (invoice_status, payment_status) = (InvoiceStatus::Void, PaymentStatus::Failed);
    }
    let convenience_store = method == PaymentMethod::ConvenienceStore;
    match ctx.phase {
        RulePhase::Phase1
            if convenience_store
                && prior_invoice == InvoiceStatus::Failed
                && prior_payment == PaymentStatus::Failed =>
        {
            (invoice_status, payment_status) = (InvoiceStatus::Failed, PaymentStatus::Failed);
        }
        RulePhase::Phase2
            if convenience_store
                && prior_invoice == InvoiceStatus::Issued
                && prior_payment == PaymentStatus::Failed =>
        {
            (invoice_status, payment_status) = (InvoiceStatus::Issued, PaymentStatus::Failed);
        }
        _ => {}
    }

    Ok(ResultCodeValidation {
        result_code: table.render(entry, system_code),
        invoice_status,
        payment_status,
        system_code,
    })
}

/// Validates one canonical record against its payment and invoice and
/// returns the updated entities with the audit rows to write.
pub fn reconcile_record(
    ctx: &RunContext,
    record: &GenericPaymentFileRecord,
    line_no: usize,
    mut payment: Payment,
    mut invoice: Invoice,
) -> Result<RecordOutcome> {
    check_payment_method(ctx.file_method, &payment, line_no)?;

    let previous_result_code = payment.result_code.clone();
    let previous_payment_status = payment.payment_status;
    let previous_invoice_status = invoice.status;

    let validation = determine_result_code(ctx, record, line_no, &payment, &invoice)
        .and_then(|validation| {
            apply_side_effects(ctx, record, line_no, &validation, &mut payment, &mut invoice)?;
            Ok(validation)
        })
        .map_err(|e| e.context("file validation failed"))?;

    let mut payment_fields = vec![
        PaymentField::ResultCode,
        PaymentField::PaymentDate,
        PaymentField::ValidatedDate,
        PaymentField::PaymentStatus,
        PaymentField::ReceiptDate,
    ];
    if ctx.phase == RulePhase::Phase2 && payment.payment_status == PaymentStatus::Failed {
        payment.amount = Decimal::ZERO;
        payment_fields.push(PaymentField::Amount);
    }

    let mut invoice_fields = vec![InvoiceField::Status];
    if invoice.status == InvoiceStatus::Paid {
        invoice_fields.extend([InvoiceField::OutstandingBalance, InvoiceField::AmountPaid]);
    }

    payment.updated_at = ctx.receipt_date;
    invoice.updated_at = ctx.receipt_date;

    let tally = match invoice.status {
        InvoiceStatus::Paid => Tally::Successful,
        InvoiceStatus::Issued
            if ctx.phase == RulePhase::Phase2 && payment.payment_status == PaymentStatus::Failed =>
        {
            Tally::Failed
        }
        InvoiceStatus::Issued => Tally::Pending,
        InvoiceStatus::Failed | InvoiceStatus::Void => Tally::Failed,
    };

    let action = decide_action(
        ctx.phase,
        (previous_invoice_status, previous_payment_status),
        (invoice.status, payment.payment_status),
    );
    let action_log = (!action.is_no_action()).then(|| {
        let detail = match ctx.phase {
            RulePhase::Phase1 => ACTION_DETAIL.to_string(),
            RulePhase::Phase2 => format!("{}: {}", ACTION_DETAIL, validation.result_code),
        };
        InvoiceActionLog::new(
            invoice.invoice_id,
            payment.payment_sequence_number,
            action,
            detail,
            ctx.bulk_payment_validations_id,
        )
    });

    let detail = BulkPaymentValidationDetail::new(
        ctx.bulk_payment_validations_id,
        invoice.invoice_id,
        payment.payment_id,
        validation.result_code.clone(),
        previous_result_code,
        payment.payment_status,
    );

    Ok(RecordOutcome {
        line_no,
        validation,
        previous_invoice_status,
        previous_payment_status,
        payment,
        invoice,
        payment_fields,
        invoice_fields,
        detail,
        action_log,
        tally,
    })
}

fn apply_side_effects(
    ctx: &RunContext,
    record: &GenericPaymentFileRecord,
    line_no: usize,
    validation: &ResultCodeValidation,
    payment: &mut Payment,
    invoice: &mut Invoice,
) -> Result<()> {
    if payment.payment_status == PaymentStatus::Successful && validation.system_code.is_some() {
        payment.payment_date = None;
    }
    payment.receipt_date = None;

    if validation.payment_status == PaymentStatus::Successful {
        let payment_date = record.payment_date.ok_or_else(|| {
            AppError::Validation(format!("payment date required at line {}", line_no))
        })?;
        payment.payment_date = Some(payment_date);

        if payment.payment_method == PaymentMethod::ConvenienceStore {
            let validated_date = record.validated_date.ok_or_else(|| {
                AppError::Validation(format!(
                    "validated date required if payment method is convenience store at line {}",
                    line_no
                ))
            })?;
            payment.validated_date = Some(validated_date);
        }
        payment.receipt_date = Some(ctx.receipt_date);
    }

    if validation.invoice_status == InvoiceStatus::Paid {
        invoice.apply_payment(record.amount);
    }

    invoice.status = validation.invoice_status;
    payment.payment_status = validation.payment_status;
    payment.result_code = Some(validation.result_code.clone());
    Ok(())
}

/// Audit action for a status change; `NoAction` is never persisted.
pub fn decide_action(
    phase: RulePhase,
    previous: (InvoiceStatus, PaymentStatus),
    current: (InvoiceStatus, PaymentStatus),
) -> InvoiceAction {
    let (previous_invoice, previous_payment) = previous;
    let (invoice_status, payment_status) = current;

    let mut action = match invoice_status {
        InvoiceStatus::Paid => InvoiceAction::InvoicePaid,
        InvoiceStatus::Failed => InvoiceAction::InvoiceFailed,
        InvoiceStatus::Issued | InvoiceStatus::Void => InvoiceAction::NoAction,
    };

    if previous_invoice == invoice_status && previous_payment == payment_status {
        action = InvoiceAction::PaymentUpdated;
    }

    if phase == RulePhase::Phase2 {
        if previous_payment == payment_status {
            action = InvoiceAction::PaymentUpdated;
        }
        if previous_payment != payment_status && payment_status == PaymentStatus::Failed {
            action = InvoiceAction::PaymentValidateFailed;
        }
        if payment_status == PaymentStatus::Successful {
            action = InvoiceAction::PaymentValidateSuccess;
        }
    }

    action
}
