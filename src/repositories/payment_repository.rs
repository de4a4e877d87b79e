use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{check_rows_affected, db_error, PgUnitOfWork, WRITE_BATCH_SIZE};
use crate::error::{AppError, Result};
use crate::models::{
    Invoice, InvoiceStatus, Payment, PaymentField, PaymentInvoiceUser, PaymentMethod, PaymentStatus,
    UserBasicInfo,
};

#[async_trait]
pub trait PaymentRepo: Send {
    async fn find_by_payment_sequence_number(&mut self, payment_sequence_number: i32) -> Result<Payment>;

    /// Writes the given columns; exactly one row must change.
    async fn update_with_fields(&mut self, payment: &Payment, fields: &[PaymentField]) -> Result<()>;

    async fn update_multiple_with_fields(&mut self, payments: &[Payment], fields: &[PaymentField]) -> Result<()>;

    /// Stages payment numbers in a transaction-scoped temp table.
    async fn insert_payment_numbers_temp_table(&mut self, payment_sequence_numbers: &[i32]) -> Result<()>;

    /// Fetches payment, invoice and student for every staged payment number.
    async fn find_payment_invoice_user_from_temp_table(&mut self) -> Result<Vec<PaymentInvoiceUser>>;
}

#[derive(FromRow)]
struct PaymentInvoiceUserRow {
    payment_id: Uuid,
    payment_sequence_number: i32,
    invoice_id: Uuid,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    result_code: Option<String>,
    payment_date: Option<DateTime<Utc>>,
    validated_date: Option<DateTime<Utc>>,
    receipt_date: Option<DateTime<Utc>>,
    amount: Decimal,
    payment_created_at: DateTime<Utc>,
    payment_updated_at: DateTime<Utc>,
    invoice_sequence_number: i32,
    student_id: String,
    total: Decimal,
    amount_paid: Decimal,
    outstanding_balance: Decimal,
    invoice_status: InvoiceStatus,
    invoice_created_at: DateTime<Utc>,
    invoice_updated_at: DateTime<Utc>,
    user_id: Option<String>,
    user_name: Option<String>,
}

impl From<PaymentInvoiceUserRow> for PaymentInvoiceUser {
    fn from(row: PaymentInvoiceUserRow) -> Self {
        let user = match (row.user_id, row.user_name) {
            (Some(user_id), Some(name)) => Some(UserBasicInfo { user_id, name }),
            _ => None,
        };

        PaymentInvoiceUser {
            payment: Payment {
                payment_id: row.payment_id,
                payment_sequence_number: row.payment_sequence_number,
                invoice_id: row.invoice_id,
                payment_method: row.payment_method,
                payment_status: row.payment_status,
                result_code: row.result_code,
                payment_date: row.payment_date,
                validated_date: row.validated_date,
                receipt_date: row.receipt_date,
                amount: row.amount,
                created_at: row.payment_created_at,
                updated_at: row.payment_updated_at,
            },
            invoice: Invoice {
                invoice_id: row.invoice_id,
                invoice_sequence_number: row.invoice_sequence_number,
                student_id: row.student_id,
                total: row.total,
                amount_paid: row.amount_paid,
                outstanding_balance: row.outstanding_balance,
                status: row.invoice_status,
                created_at: row.invoice_created_at,
                updated_at: row.invoice_updated_at,
            },
            user,
        }
    }
}

fn push_payment_field(qb: &mut QueryBuilder<'_, Postgres>, payment: &Payment, field: PaymentField) {
    match field {
        PaymentField::ResultCode => qb.push_bind(payment.result_code.clone()),
        PaymentField::PaymentDate => qb.push_bind(payment.payment_date),
        PaymentField::ValidatedDate => qb.push_bind(payment.validated_date),
        PaymentField::PaymentStatus => qb.push_bind(payment.payment_status),
        PaymentField::ReceiptDate => qb.push_bind(payment.receipt_date),
        PaymentField::Amount => qb.push_bind(payment.amount),
    };
}

#[async_trait]
impl PaymentRepo for PgUnitOfWork {
    async fn find_by_payment_sequence_number(&mut self, payment_sequence_number: i32) -> Result<Payment> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, Payment>(
            r#"
            SELECT payment_id, payment_sequence_number, invoice_id, payment_method, payment_status, result_code,
                   payment_date, validated_date, receipt_date, amount, created_at, updated_at
            FROM payment
            WHERE payment_sequence_number = $1
            "#,
        )
        .bind(payment_sequence_number)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("PaymentRepo.FindByPaymentSequenceNumber"))?;

        row.ok_or_else(|| {
            AppError::NotFound(format!(
                "payment with sequence number {} not found",
                payment_sequence_number
            ))
        })
    }

    async fn update_with_fields(&mut self, payment: &Payment, fields: &[PaymentField]) -> Result<()> {
        let conn = self.conn()?;
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE payment SET ");
        for field in fields {
            qb.push(field.column()).push(" = ");
            push_payment_field(&mut qb, payment, *field);
            qb.push(", ");
        }
        qb.push("updated_at = now() WHERE payment_id = ");
        qb.push_bind(payment.payment_id);

        let result = qb
            .build()
            .execute(&mut *conn)
            .await
            .map_err(db_error("PaymentRepo.UpdateWithFields"))?;

        check_rows_affected("PaymentRepo.UpdateWithFields", 1, result.rows_affected())
    }

    async fn update_multiple_with_fields(&mut self, payments: &[Payment], fields: &[PaymentField]) -> Result<()> {
        let conn = self.conn()?;
        let mut assignments: Vec<String> = fields
            .iter()
            .map(|f| format!("{0} = nv.{0}", f.column()))
            .collect();
        assignments.push("updated_at = now()".to_string());
        let columns: Vec<&str> = std::iter::once("payment_id")
            .chain(fields.iter().map(|f| f.column()))
            .collect();

        for chunk in payments.chunks(WRITE_BATCH_SIZE) {
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE payment AS p SET ");
            qb.push(assignments.join(", "));
            qb.push(" FROM (");
            qb.push_values(chunk, |mut row, payment| {
                row.push_bind(payment.payment_id);
                for field in fields {
                    match field {
                        PaymentField::ResultCode => row.push_bind(payment.result_code.clone()),
                        PaymentField::PaymentDate => row.push_bind(payment.payment_date),
                        PaymentField::ValidatedDate => row.push_bind(payment.validated_date),
                        PaymentField::PaymentStatus => row.push_bind(payment.payment_status),
                        PaymentField::ReceiptDate => row.push_bind(payment.receipt_date),
                        PaymentField::Amount => row.push_bind(payment.amount),
                    };
                }
            });
            qb.push(format!(") AS nv({}) WHERE p.payment_id = nv.payment_id", columns.join(", ")));

            let result = qb
                .build()
                .execute(&mut *conn)
                .await
                .map_err(db_error("PaymentRepo.UpdateMultipleWithFields"))?;
            check_rows_affected("PaymentRepo.UpdateMultipleWithFields", chunk.len(), result.rows_affected())?;
        }

        Ok(())
    }

    async fn insert_payment_numbers_temp_table(&mut self, payment_sequence_numbers: &[i32]) -> Result<()> {
        let conn = self.conn()?;
        sqlx::query(
            r#"
            CREATE TEMPORARY TABLE IF NOT EXISTS temp_tbl__payment_number (
                temp_payment_sequence_number INT PRIMARY KEY,
                resource_path TEXT
            ) ON COMMIT DROP
            "#,
        )
        .execute(&mut *conn)
        .await
        .map_err(db_error("PaymentRepo.InsertPaymentNumbersTempTable"))?;

        let mut numbers = payment_sequence_numbers.to_vec();
        numbers.sort_unstable();
        numbers.dedup();
        let expected = numbers.len();

        let result = sqlx::query(
            r#"
            INSERT INTO temp_tbl__payment_number (temp_payment_sequence_number)
            SELECT UNNEST($1::int[])
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(numbers)
        .execute(&mut *conn)
        .await
        .map_err(db_error("PaymentRepo.InsertPaymentNumbersTempTable"))?;

        check_rows_affected("PaymentRepo.InsertPaymentNumbersTempTable", expected, result.rows_affected())
    }

    async fn find_payment_invoice_user_from_temp_table(&mut self) -> Result<Vec<PaymentInvoiceUser>> {
        let conn = self.conn()?;
        let rows = sqlx::query_as::<_, PaymentInvoiceUserRow>(
            r#"
            SELECT p.payment_id, p.payment_sequence_number, p.invoice_id, p.payment_method, p.payment_status,
                   p.result_code, p.payment_date, p.validated_date, p.receipt_date, p.amount,
                   p.created_at AS payment_created_at, p.updated_at AS payment_updated_at,
                   i.invoice_sequence_number, i.student_id, i.total, i.amount_paid, i.outstanding_balance,
                   i.status AS invoice_status, i.created_at AS invoice_created_at, i.updated_at AS invoice_updated_at,
                   u.user_id, u.name AS user_name
            FROM payment p
            INNER JOIN invoice i ON i.invoice_id = p.invoice_id
            LEFT JOIN user_basic_info u ON u.user_id = i.student_id
            WHERE EXISTS (
                SELECT 1 FROM temp_tbl__payment_number t
                WHERE t.temp_payment_sequence_number = p.payment_sequence_number
            )
            ORDER BY p.payment_sequence_number
            "#,
        )
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error("PaymentRepo.FindPaymentInvoiceUserFromTempTable"))?;

        Ok(rows.into_iter().map(PaymentInvoiceUser::from).collect())
    }
}
