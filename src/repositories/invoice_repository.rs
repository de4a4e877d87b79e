use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use super::{check_rows_affected, db_error, PgUnitOfWork, WRITE_BATCH_SIZE};
use crate::error::{AppError, Result};
use crate::models::{Invoice, InvoiceField};

#[async_trait]
pub trait InvoiceRepo: Send {
    async fn retrieve_invoice_by_invoice_id(&mut self, invoice_id: Uuid) -> Result<Invoice>;

    /// Writes the given columns; exactly one row must change.
    async fn update_with_fields(&mut self, invoice: &Invoice, fields: &[InvoiceField]) -> Result<()>;

    async fn update_multiple_with_fields(&mut self, invoices: &[Invoice], fields: &[InvoiceField]) -> Result<()>;
}

fn push_invoice_field(qb: &mut QueryBuilder<'_, Postgres>, invoice: &Invoice, field: InvoiceField) {
    match field {
        InvoiceField::Status => qb.push_bind(invoice.status),
        InvoiceField::OutstandingBalance => qb.push_bind(invoice.outstanding_balance),
        InvoiceField::AmountPaid => qb.push_bind(invoice.amount_paid),
    };
}

#[async_trait]
impl InvoiceRepo for PgUnitOfWork {
    async fn retrieve_invoice_by_invoice_id(&mut self, invoice_id: Uuid) -> Result<Invoice> {
        let conn = self.conn()?;
        let row = sqlx::query_as::<_, Invoice>(
            r#"
            SELECT invoice_id, invoice_sequence_number, student_id, total, amount_paid, outstanding_balance,
                   status, created_at, updated_at
            FROM invoice
            WHERE invoice_id = $1
            "#,
        )
        .bind(invoice_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("InvoiceRepo.RetrieveInvoiceByInvoiceID"))?;

        row.ok_or_else(|| AppError::NotFound(format!("invoice {} not found", invoice_id)))
    }

    async fn update_with_fields(&mut self, invoice: &Invoice, fields: &[InvoiceField]) -> Result<()> {
        let conn = self.conn()?;
        let mut qb = QueryBuilder::<Postgres>::new("UPDATE invoice SET ");
        for field in fields {
            qb.push(field.column()).push(" = ");
            push_invoice_field(&mut qb, invoice, *field);
            qb.push(", ");
        }
        qb.push("updated_at = now() WHERE invoice_id = ");
        qb.push_bind(invoice.invoice_id);

        let result = qb
            .build()
            .execute(&mut *conn)
            .await
            .map_err(db_error("InvoiceRepo.UpdateWithFields"))?;

        check_rows_affected("InvoiceRepo.UpdateWithFields", 1, result.rows_affected())
    }

    async fn update_multiple_with_fields(&mut self, invoices: &[Invoice], fields: &[InvoiceField]) -> Result<()> {
        let conn = self.conn()?;
        let mut assignments: Vec<String> = fields
            .iter()
            .map(|f| format!("{0} = nv.{0}", f.column()))
            .collect();
        assignments.push("updated_at = now()".to_string());
        let columns: Vec<&str> = std::iter::once("invoice_id")
            .chain(fields.iter().map(|f| f.column()))
            .collect();

        for chunk in invoices.chunks(WRITE_BATCH_SIZE) {
            let mut qb = QueryBuilder::<Postgres>::new("UPDATE invoice AS i SET ");
            qb.push(assignments.join(", "));
            qb.push(" FROM (");
            qb.push_values(chunk, |mut row, invoice| {
                row.push_bind(invoice.invoice_id);
                for field in fields {
                    match field {
                        InvoiceField::Status => row.push_bind(invoice.status),
                        InvoiceField::OutstandingBalance => row.push_bind(invoice.outstanding_balance),
                        InvoiceField::AmountPaid => row.push_bind(invoice.amount_paid),
                    };
                }
            });
            qb.push(format!(") AS nv({}) WHERE i.invoice_id = nv.invoice_id", columns.join(", ")));

            let result = qb
                .build()
                .execute(&mut *conn)
                .await
                .map_err(db_error("InvoiceRepo.UpdateMultipleWithFields"))?;
            check_rows_affected("InvoiceRepo.UpdateMultipleWithFields", chunk.len(), result.rows_affected())?;
        }

        Ok(())
    }
}
