pub mod bulk_payment_validation;
pub mod invoice;
pub mod invoice_action_log;
pub mod payment;
pub mod payment_file;
pub mod user_basic_info;

pub use bulk_payment_validation::{BulkPaymentValidation, BulkPaymentValidationDetail};
pub use invoice::{Invoice, InvoiceField, InvoiceStatus};
pub use invoice_action_log::{InvoiceAction, InvoiceActionLog};
pub use payment::{Payment, PaymentField, PaymentMethod, PaymentStatus};
pub use payment_file::{
    GenericPaymentFile, GenericPaymentFileRecord, PaymentInvoiceUser, PaymentValidationResult,
    ValidatedPayment,
};
pub use user_basic_info::UserBasicInfo;
