pub mod duplicate_resolver;
pub mod feature_flags;
pub mod file_adapters;
pub mod materializer;
pub mod payment_file_validator;
pub mod record_validator;
pub mod result_codes;

pub use duplicate_resolver::{resolve_duplicates, CanonicalSelection};
pub use feature_flags::{
    FeatureFlagProvider, MaterializationStrategy, SettingsFeatureFlags, ValidationOptions,
    BULK_ADD_VALIDATE_PHASE2, IMPROVED_BULK_VALIDATION,
};
pub use file_adapters::{ConvenienceStoreFile, ConvenienceStoreRecord, DirectDebitFile, DirectDebitRecord};
pub use materializer::{
    materializer_for, BatchedWrites, CanonicalRecord, LegacyMaterializer, MaterializedRun, Materializer,
    OptimizedMaterializer,
};
pub use payment_file_validator::PaymentFileValidator;
pub use record_validator::{
    determine_result_code, reconcile_record, RecordOutcome, ResultCodeValidation, RunContext, Tally,
    ValidationTally,
};
pub use result_codes::{ResultCodeTable, RulePhase, SystemCode};
