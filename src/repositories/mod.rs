pub mod bulk_payment_validation_repository;
pub mod invoice_action_log_repository;
pub mod invoice_repository;
pub mod payment_repository;
pub mod user_basic_info_repository;

pub use bulk_payment_validation_repository::{BulkPaymentValidationsDetailRepo, BulkPaymentValidationsRepo};
pub use invoice_action_log_repository::InvoiceActionLogRepo;
pub use invoice_repository::InvoiceRepo;
pub use payment_repository::PaymentRepo;
pub use user_basic_info_repository::UserBasicInfoRepo;

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::error::{AppError, Result};
use crate::models::PaymentMethod;

/// Database connection pool type alias.
pub type DbPool = PgPool;

/// Rows per statement for multi-row writes, keeps bind parameters under the Postgres limit.
pub(crate) const WRITE_BATCH_SIZE: usize = 1000;

const BULK_VALIDATION_LOCK_NAMESPACE: i32 = 0x4250_5600;

/// All repositories of one validation pass, bound to a single transaction.
/// Dropping an uncommitted unit of work discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    fn payments(&mut self) -> &mut dyn PaymentRepo;
    fn invoices(&mut self) -> &mut dyn InvoiceRepo;
    fn bulk_validations(&mut self) -> &mut dyn BulkPaymentValidationsRepo;
    fn validation_details(&mut self) -> &mut dyn BulkPaymentValidationsDetailRepo;
    fn action_logs(&mut self) -> &mut dyn InvoiceActionLogRepo;
    fn users(&mut self) -> &mut dyn UserBasicInfoRepo;

    /// Blocks until no other pass for the same method holds the lock; released at commit or rollback.
    async fn lock_payment_method(&mut self, method: PaymentMethod) -> Result<()>;
    async fn commit(&mut self) -> Result<()>;
    async fn rollback(&mut self) -> Result<()>;
}

#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Starts Postgres transactions for validation passes.
#[derive(Clone)]
pub struct PgTransactionManager {
    pool: PgPool,
}

impl PgTransactionManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TransactionManager for PgTransactionManager {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await.map_err(AppError::Database)?;
        Ok(Box::new(PgUnitOfWork { tx: Some(tx) }))
    }
}

pub struct PgUnitOfWork {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgUnitOfWork {
    pub(crate) fn conn(&mut self) -> Result<&mut PgConnection> {
        self.tx
            .as_deref_mut()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("transaction already finished")))
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    fn payments(&mut self) -> &mut dyn PaymentRepo {
        self
    }

    fn invoices(&mut self) -> &mut dyn InvoiceRepo {
        self
    }

    fn bulk_validations(&mut self) -> &mut dyn BulkPaymentValidationsRepo {
        self
    }

    fn validation_details(&mut self) -> &mut dyn BulkPaymentValidationsDetailRepo {
        self
    }

    fn action_logs(&mut self) -> &mut dyn InvoiceActionLogRepo {
        self
    }

    fn users(&mut self) -> &mut dyn UserBasicInfoRepo {
        self
    }

    async fn lock_payment_method(&mut self, method: PaymentMethod) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query("SELECT pg_advisory_xact_lock($1, $2)")
            .bind(BULK_VALIDATION_LOCK_NAMESPACE)
            .bind(method.lock_key())
            .execute(&mut *conn)
            .await
            .map_err(db_error("UnitOfWork.LockPaymentMethod"))?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(AppError::Database)?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(AppError::Database)?;
        }
        Ok(())
    }
}

/// Wraps a driver error with the repository call that produced it.
pub(crate) fn db_error(call: &'static str) -> impl FnOnce(sqlx::Error) -> AppError {
    move |e| AppError::Internal(anyhow::anyhow!("{}: {}", call, e))
}

pub(crate) fn check_rows_affected(call: &'static str, expected: usize, actual: u64) -> Result<()> {
    if actual != expected as u64 {
        return Err(AppError::Internal(anyhow::anyhow!(
            "{}: expected {} rows affected, got {}",
            call,
            expected,
            actual
        )));
    }
    Ok(())
}
