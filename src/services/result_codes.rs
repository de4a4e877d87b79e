use serde::{Deserialize, Serialize};

use crate::models::{InvoiceStatus, PaymentMethod, PaymentStatus};

/// Generation of the reconciliation rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePhase {
    Phase1,
    Phase2,
}

/// Correction appended to a result code when the engine disagrees with the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SystemCode {
    /// Reported amount differs from the invoice total.
    AmountMismatch,
    /// Invoice not ISSUED or payment not PENDING.
    NotReady,
    AmountMismatchNotReady,
}

impl SystemCode {
    pub fn code(&self) -> u8 {
        match self {
            SystemCode::AmountMismatch => 1,
            SystemCode::NotReady => 2,
            SystemCode::AmountMismatchNotReady => 3,
        }
    }

    /// Combined condition wins, then amount, then readiness.
    pub fn evaluate(amount_mismatch: bool, ready: bool) -> Option<SystemCode> {
        match (amount_mismatch, ready) {
            (true, false) => Some(SystemCode::AmountMismatchNotReady),
            (true, true) => Some(SystemCode::AmountMismatch),
            (false, false) => Some(SystemCode::NotReady),
            (false, true) => None,
        }
    }
}

/// Mapping of one file code to the rendered code and target statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileCodeEntry {
    pub file_code: &'static str,
    pub rendered: &'static str,
    pub invoice_status: InvoiceStatus,
    pub payment_status: PaymentStatus,
}

/// How an applied system code rewrites the base statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverridePolicy {
    FailInvoiceAndPayment,
    FailPaymentKeepInvoice,
}

#[derive(Debug)]
pub struct ResultCodeTable {
    pub method: PaymentMethod,
    entries: &'static [FileCodeEntry],
    override_policy: OverridePolicy,
}

const fn entry(
    file_code: &'static str,
    rendered: &'static str,
    invoice_status: InvoiceStatus,
    payment_status: PaymentStatus,
) -> FileCodeEntry {
    FileCodeEntry {
        file_code,
        rendered,
        invoice_status,
        payment_status,
    }
}

use InvoiceStatus::{Issued, Paid};
use PaymentStatus::{Failed as PaymentFailed, Pending, Successful};

const DIRECT_DEBIT_PHASE1_ENTRIES: [FileCodeEntry; 7] = [
    entry("0", "0", Paid, Successful),
    entry("1", "1", InvoiceStatus::Failed, PaymentFailed),
    entry("2", "2", InvoiceStatus::Failed, PaymentFailed),
    entry("3", "3", InvoiceStatus::Failed, PaymentFailed),
    entry("4", "4", InvoiceStatus::Failed, PaymentFailed),
    entry("8", "8", InvoiceStatus::Failed, PaymentFailed),
    entry("9", "9", InvoiceStatus::Failed, PaymentFailed),
];

const DIRECT_DEBIT_PHASE2_ENTRIES: [FileCodeEntry; 7] = [
    entry("0", "0", Paid, Successful),
    entry("1", "1", Issued, PaymentFailed),
    entry("2", "2", Issued, PaymentFailed),
    entry("3", "3", Issued, PaymentFailed),
    entry("4", "4", Issued, PaymentFailed),
    entry("8", "8", Issued, PaymentFailed),
    entry("9", "9", Issued, PaymentFailed),
];

const CONVENIENCE_STORE_ENTRIES: [FileCodeEntry; 3] = [
    entry("01", "1", Issued, Pending),
    entry("02", "0", Paid, Successful),
    entry("03", "2", Issued, Pending),
];

static DIRECT_DEBIT_PHASE1: ResultCodeTable = ResultCodeTable {
    method: PaymentMethod::DirectDebit,
    entries: &DIRECT_DEBIT_PHASE1_ENTRIES,
    override_policy: OverridePolicy::FailInvoiceAndPayment,
};

static DIRECT_DEBIT_PHASE2: ResultCodeTable = ResultCodeTable {
    method: PaymentMethod::DirectDebit,
    entries: &DIRECT_DEBIT_PHASE2_ENTRIES,
    override_policy: OverridePolicy::FailPaymentKeepInvoice,
};

static CONVENIENCE_STORE_PHASE1: ResultCodeTable = ResultCodeTable {
    method: PaymentMethod::ConvenienceStore,
    entries: &CONVENIENCE_STORE_ENTRIES,
    override_policy: OverridePolicy::FailInvoiceAndPayment,
};

static CONVENIENCE_STORE_PHASE2: ResultCodeTable = ResultCodeTable {
    method: PaymentMethod::ConvenienceStore,
    entries: &CONVENIENCE_STORE_ENTRIES,
    override_policy: OverridePolicy::FailPaymentKeepInvoice,
};

impl ResultCodeTable {
    pub fn for_method(method: PaymentMethod, phase: RulePhase) -> &'static ResultCodeTable {
        match (method, phase) {
            (PaymentMethod::DirectDebit, RulePhase::Phase1) => &DIRECT_DEBIT_PHASE1,
            (PaymentMethod::DirectDebit, RulePhase::Phase2) => &DIRECT_DEBIT_PHASE2,
            (PaymentMethod::ConvenienceStore, RulePhase::Phase1) => &CONVENIENCE_STORE_PHASE1,
            (PaymentMethod::ConvenienceStore, RulePhase::Phase2) => &CONVENIENCE_STORE_PHASE2,
        }
    }

    /// Looks up a raw file code; `None` means the code is not valid for this method.
    pub fn lookup(&self, file_code: &str) -> Option<&'static FileCodeEntry> {
        self.entries.iter().find(|e| e.file_code == file_code)
    }

    pub fn file_codes(&self) -> impl Iterator<Item = &'static str> {
        self.entries.iter().map(|e| e.file_code)
    }

    /// Statuses imposed by a system code.
    pub fn override_statuses(&self, prior_invoice_status: InvoiceStatus) -> (InvoiceStatus, PaymentStatus) {
        match self.override_policy {
            OverridePolicy::FailInvoiceAndPayment => (InvoiceStatus::Failed, PaymentStatus::Failed),
            OverridePolicy::FailPaymentKeepInvoice => (prior_invoice_status, PaymentStatus::Failed),
        }
    }

    /// Renders `{prefix}-R{code}[-{system}]`.
    pub fn render(&self, entry: &FileCodeEntry, system_code: Option<SystemCode>) -> String {
        let base = format!("{}-R{}", self.method.prefix_code(), entry.rendered);
        match system_code {
            Some(code) => format!("{}-{}", base, code.code()),
            None => base,
        }
    }
}
