use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{check_rows_affected, db_error, PgUnitOfWork, WRITE_BATCH_SIZE};
use crate::error::Result;
use crate::models::{BulkPaymentValidation, BulkPaymentValidationDetail};

#[async_trait]
pub trait BulkPaymentValidationsRepo: Send {
    /// Inserts the run row and returns its id.
    async fn create(&mut self, validation: &BulkPaymentValidation) -> Result<Uuid>;

    /// Persists the final tallies and validation date of a run.
    async fn update_with_fields(&mut self, validation: &BulkPaymentValidation) -> Result<()>;
}

#[async_trait]
pub trait BulkPaymentValidationsDetailRepo: Send {
    async fn create(&mut self, detail: &BulkPaymentValidationDetail) -> Result<Uuid>;
    async fn create_multiple(&mut self, details: &[BulkPaymentValidationDetail]) -> Result<()>;
}

#[async_trait]
impl BulkPaymentValidationsRepo for PgUnitOfWork {
    async fn create(&mut self, validation: &BulkPaymentValidation) -> Result<Uuid> {
        let conn = self.conn()?;
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bulk_payment_validations (bulk_payment_validations_id, payment_method, successful_payments,
                                                  pending_payments, failed_payments, validation_date, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING bulk_payment_validations_id
            "#,
        )
        .bind(validation.bulk_payment_validations_id)
        .bind(validation.payment_method)
        .bind(validation.successful_payments)
        .bind(validation.pending_payments)
        .bind(validation.failed_payments)
        .bind(validation.validation_date)
        .bind(validation.created_at)
        .bind(validation.updated_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("BulkPaymentValidationsRepo.Create"))?;

        Ok(id)
    }

    async fn update_with_fields(&mut self, validation: &BulkPaymentValidation) -> Result<()> {
        let conn = self.conn()?;
        let result = sqlx::query(
            r#"
            UPDATE bulk_payment_validations
            SET successful_payments = $2,
                pending_payments = $3,
                failed_payments = $4,
                validation_date = $5,
                updated_at = now()
            WHERE bulk_payment_validations_id = $1
            "#,
        )
        .bind(validation.bulk_payment_validations_id)
        .bind(validation.successful_payments)
        .bind(validation.pending_payments)
        .bind(validation.failed_payments)
        .bind(validation.validation_date)
        .execute(&mut *conn)
        .await
        .map_err(db_error("BulkPaymentValidationsRepo.UpdateWithFields"))?;

        check_rows_affected("BulkPaymentValidationsRepo.UpdateWithFields", 1, result.rows_affected())
    }
}

#[async_trait]
impl BulkPaymentValidationsDetailRepo for PgUnitOfWork {
    async fn create(&mut self, detail: &BulkPaymentValidationDetail) -> Result<Uuid> {
        let conn = self.conn()?;
        let id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO bulk_payment_validations_detail (bulk_payment_validations_detail_id, bulk_payment_validations_id,
                                                         invoice_id, payment_id, validated_result_code,
                                                         previous_result_code, payment_status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING bulk_payment_validations_detail_id
            "#,
        )
        .bind(detail.bulk_payment_validations_detail_id)
        .bind(detail.bulk_payment_validations_id)
        .bind(detail.invoice_id)
        .bind(detail.payment_id)
        .bind(&detail.validated_result_code)
        .bind(&detail.previous_result_code)
        .bind(detail.payment_status)
        .bind(detail.created_at)
        .fetch_one(&mut *conn)
        .await
        .map_err(db_error("BulkPaymentValidationsDetailRepo.Create"))?;

        Ok(id)
    }

    async fn create_multiple(&mut self, details: &[BulkPaymentValidationDetail]) -> Result<()> {
        let conn = self.conn()?;
        for chunk in details.chunks(WRITE_BATCH_SIZE) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO bulk_payment_validations_detail (bulk_payment_validations_detail_id, \
                 bulk_payment_validations_id, invoice_id, payment_id, validated_result_code, previous_result_code, \
                 payment_status, created_at) ",
            );
            qb.push_values(chunk, |mut row, detail| {
                row.push_bind(detail.bulk_payment_validations_detail_id)
                    .push_bind(detail.bulk_payment_validations_id)
                    .push_bind(detail.invoice_id)
                    .push_bind(detail.payment_id)
                    .push_bind(detail.validated_result_code.clone())
                    .push_bind(detail.previous_result_code.clone())
                    .push_bind(detail.payment_status)
                    .push_bind(detail.created_at);
            });

            let result = qb
                .build()
                .execute(&mut *conn)
                .await
                .map_err(db_error("BulkPaymentValidationsDetailRepo.CreateMultiple"))?;
            check_rows_affected(
                "BulkPaymentValidationsDetailRepo.CreateMultiple",
                chunk.len(),
                result.rows_affected(),
            )?;
        }

        Ok(())
    }
}
