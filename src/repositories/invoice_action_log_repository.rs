use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use super::{check_rows_affected, db_error, PgUnitOfWork, WRITE_BATCH_SIZE};
use crate::error::Result;
use crate::models::InvoiceActionLog;

#[async_trait]
pub trait InvoiceActionLogRepo: Send {
    async fn create(&mut self, log: &InvoiceActionLog) -> Result<()>;
    async fn create_multiple(&mut self, logs: &[InvoiceActionLog]) -> Result<()>;
}

#[async_trait]
impl InvoiceActionLogRepo for PgUnitOfWork {
    async fn create(&mut self, log: &InvoiceActionLog) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query(
            r#"
            INSERT INTO invoice_action_log (action_log_id, invoice_id, payment_sequence_number, action, action_detail,
                                            bulk_payment_validations_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(log.action_log_id)
        .bind(log.invoice_id)
        .bind(log.payment_sequence_number)
        .bind(log.action)
        .bind(&log.action_detail)
        .bind(log.bulk_payment_validations_id)
        .bind(log.created_at)
        .execute(&mut *conn)
        .await
        .map_err(db_error("InvoiceActionLogRepo.Create"))?;

        Ok(())
    }

    async fn create_multiple(&mut self, logs: &[InvoiceActionLog]) -> Result<()> {
        let conn = self.conn()?;
        for chunk in logs.chunks(WRITE_BATCH_SIZE) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO invoice_action_log (action_log_id, invoice_id, payment_sequence_number, action, \
                 action_detail, bulk_payment_validations_id, created_at) ",
            );
            qb.push_values(chunk, |mut row, log| {
                row.push_bind(log.action_log_id)
                    .push_bind(log.invoice_id)
                    .push_bind(log.payment_sequence_number)
                    .push_bind(log.action)
                    .push_bind(log.action_detail.clone())
                    .push_bind(log.bulk_payment_validations_id)
                    .push_bind(log.created_at);
            });

            let result = qb
                .build()
                .execute(&mut *conn)
                .await
                .map_err(db_error("InvoiceActionLogRepo.CreateMultiple"))?;
            check_rows_affected("InvoiceActionLogRepo.CreateMultiple", chunk.len(), result.rows_affected())?;
        }

        Ok(())
    }
}
