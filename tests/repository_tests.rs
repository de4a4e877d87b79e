mod common;

use std::sync::Arc;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sqlx::PgPool;
use uuid::Uuid;

use common::{fixed_time, StaticFlags};
use payment_validation_engine::models::{
    GenericPaymentFile, GenericPaymentFileRecord, Invoice, InvoiceField, InvoiceStatus, Payment, PaymentField,
    PaymentMethod, PaymentStatus, UserBasicInfo,
};
use payment_validation_engine::repositories::{PgTransactionManager, TransactionManager, UnitOfWork};
use payment_validation_engine::services::{
    MaterializationStrategy, PaymentFileValidator, RulePhase, ValidationOptions,
};

/// Sequence numbers unique to one test run, so tests can share a database.
fn sequence_base() -> i32 {
    (Uuid::new_v4().as_u128() % 100_000) as i32 * 100 + 1
}

async fn insert_fixture(
    pool: &PgPool,
    sequence_number: i32,
    method: PaymentMethod,
    total: Decimal,
    with_user: bool,
) -> (Invoice, Payment) {
    let student_id = format!("student-{}", Uuid::new_v4());
    let invoice = Invoice::issued(sequence_number, student_id.clone(), total);
    let payment = Payment::pending(sequence_number, invoice.invoice_id, method, total);

    if with_user {
        let user = UserBasicInfo::new(student_id, format!("Student {}", sequence_number));
        sqlx::query("INSERT INTO user_basic_info (user_id, name) VALUES ($1, $2)")
            .bind(&user.user_id)
            .bind(&user.name)
            .execute(pool)
            .await
            .expect("Failed to insert user");
    }

    sqlx::query(
        r#"
        INSERT INTO invoice (invoice_id, invoice_sequence_number, student_id, total, amount_paid,
                             outstanding_balance, status, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(invoice.invoice_id)
    .bind(invoice.invoice_sequence_number)
    .bind(&invoice.student_id)
    .bind(invoice.total)
    .bind(invoice.amount_paid)
    .bind(invoice.outstanding_balance)
    .bind(invoice.status)
    .bind(invoice.created_at)
    .bind(invoice.updated_at)
    .execute(pool)
    .await
    .expect("Failed to insert invoice");

    sqlx::query(
        r#"
        INSERT INTO payment (payment_id, payment_sequence_number, invoice_id, payment_method, payment_status,
                             amount, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(payment.payment_id)
    .bind(payment.payment_sequence_number)
    .bind(payment.invoice_id)
    .bind(payment.payment_method)
    .bind(payment.payment_status)
    .bind(payment.amount)
    .bind(payment.created_at)
    .bind(payment.updated_at)
    .execute(pool)
    .await
    .expect("Failed to insert payment");

    (invoice, payment)
}

async fn load_payment(pool: &PgPool, sequence_number: i32) -> Payment {
    sqlx::query_as::<_, Payment>("SELECT * FROM payment WHERE payment_sequence_number = $1")
        .bind(sequence_number)
        .fetch_one(pool)
        .await
        .expect("Failed to load payment")
}

async fn load_invoice(pool: &PgPool, invoice_id: Uuid) -> Invoice {
    sqlx::query_as::<_, Invoice>("SELECT * FROM invoice WHERE invoice_id = $1")
        .bind(invoice_id)
        .fetch_one(pool)
        .await
        .expect("Failed to load invoice")
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_temp_table_join_returns_payment_invoice_user() {
    let pool = common::setup_test_db().await;
    let base = sequence_base();
    insert_fixture(&pool, base, PaymentMethod::DirectDebit, dec!(100), true).await;
    insert_fixture(&pool, base + 1, PaymentMethod::DirectDebit, dec!(200), false).await;

    let manager = PgTransactionManager::new(pool.clone());
    let mut uow = manager.begin().await.expect("Failed to begin");

    uow.payments()
        .insert_payment_numbers_temp_table(&[base, base + 1, base, base + 50])
        .await
        .expect("Failed to stage payment numbers");
    let rows = uow
        .payments()
        .find_payment_invoice_user_from_temp_table()
        .await
        .expect("Failed to fetch joined rows");

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].payment.payment_sequence_number, base);
    assert_eq!(rows[0].invoice.total, dec!(100));
    assert!(rows[0].user.is_some());
    assert!(rows[1].user.is_none());

    // Staging an already staged number in the same transaction changes no row.
    let err = uow
        .payments()
        .insert_payment_numbers_temp_table(&[base])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("PaymentRepo.InsertPaymentNumbersTempTable"));

    uow.rollback().await.expect("Failed to roll back");
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_update_with_fields_writes_listed_columns() {
    let pool = common::setup_test_db().await;
    let base = sequence_base();
    let (mut invoice, mut payment) =
        insert_fixture(&pool, base, PaymentMethod::ConvenienceStore, dec!(100), true).await;

    payment.result_code = Some("C-R0".to_string());
    payment.payment_status = PaymentStatus::Successful;
    payment.amount = dec!(1);
    invoice.status = InvoiceStatus::Paid;
    invoice.apply_payment(dec!(100));

    let manager = PgTransactionManager::new(pool.clone());
    let mut uow = manager.begin().await.expect("Failed to begin");
    uow.payments()
        .update_with_fields(&payment, &[PaymentField::ResultCode, PaymentField::PaymentStatus])
        .await
        .expect("Failed to update payment");
    uow.invoices()
        .update_with_fields(&invoice, &[InvoiceField::Status])
        .await
        .expect("Failed to update invoice");
    uow.commit().await.expect("Failed to commit");

    let stored = load_payment(&pool, base).await;
    assert_eq!(stored.result_code.as_deref(), Some("C-R0"));
    assert_eq!(stored.payment_status, PaymentStatus::Successful);
    assert_eq!(stored.amount, dec!(100));

    let stored = load_invoice(&pool, invoice.invoice_id).await;
    assert_eq!(stored.status, InvoiceStatus::Paid);
    assert_eq!(stored.amount_paid, dec!(0));
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_update_multiple_with_fields_checks_row_count() {
    let pool = common::setup_test_db().await;
    let base = sequence_base();
    let (_, mut first) = insert_fixture(&pool, base, PaymentMethod::DirectDebit, dec!(100), true).await;
    let (_, mut second) = insert_fixture(&pool, base + 1, PaymentMethod::DirectDebit, dec!(100), true).await;

    first.result_code = Some("D-R0".to_string());
    second.result_code = Some("D-R1".to_string());
    second.payment_status = PaymentStatus::Failed;

    let manager = PgTransactionManager::new(pool.clone());
    let mut uow = manager.begin().await.expect("Failed to begin");
    uow.payments()
        .update_multiple_with_fields(
            &[first.clone(), second.clone()],
            &[PaymentField::ResultCode, PaymentField::PaymentStatus],
        )
        .await
        .expect("Failed to update payments");

    let mut missing = first.clone();
    missing.payment_id = Uuid::new_v4();
    let err = uow
        .payments()
        .update_multiple_with_fields(&[missing], &[PaymentField::ResultCode])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("PaymentRepo.UpdateMultipleWithFields"));
    uow.rollback().await.expect("Failed to roll back");

    // Rolling back discards the first batch too.
    assert_eq!(load_payment(&pool, base + 1).await.result_code, None);
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_validation_pass_commits_for_both_strategies() {
    let pool = common::setup_test_db().await;

    for strategy in [MaterializationStrategy::Legacy, MaterializationStrategy::Optimized] {
        let base = sequence_base();
        let (paid_invoice, _) = insert_fixture(&pool, base, PaymentMethod::DirectDebit, dec!(100), true).await;
        let (failed_invoice, _) =
            insert_fixture(&pool, base + 1, PaymentMethod::DirectDebit, dec!(250.75), true).await;

        let options = ValidationOptions::new(strategy, RulePhase::Phase1);
        let validator = PaymentFileValidator::new(
            Arc::new(PgTransactionManager::new(pool.clone())),
            Arc::new(StaticFlags::for_options(options)),
        )
        .with_advisory_lock(true);

        let file = GenericPaymentFile::new(
            PaymentMethod::DirectDebit,
            vec![
                GenericPaymentFileRecord::new(base.to_string(), dec!(100), "0").with_payment_date(fixed_time()),
                GenericPaymentFileRecord::new((base + 1).to_string(), dec!(250.75), "1"),
            ],
        );
        let result = validator.validate(&file).await.expect("Validation failed");

        assert_eq!(result.successful_payments, 1, "{:?}", strategy);
        assert_eq!(result.failed_payments, 1);

        let invoice = load_invoice(&pool, paid_invoice.invoice_id).await;
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.amount_paid, dec!(100.00));
        assert_eq!(invoice.outstanding_balance, dec!(0));
        assert_eq!(load_invoice(&pool, failed_invoice.invoice_id).await.status, InvoiceStatus::Failed);

        let payment = load_payment(&pool, base).await;
        assert_eq!(payment.result_code.as_deref(), Some("D-R0"));
        assert_eq!(payment.payment_date, Some(fixed_time()));
        assert!(payment.receipt_date.is_some());

        let details: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM bulk_payment_validations_detail d
            JOIN payment p ON p.payment_id = d.payment_id
            WHERE p.payment_sequence_number IN ($1, $2)
            "#,
        )
        .bind(base)
        .bind(base + 1)
        .fetch_one(&pool)
        .await
        .expect("Failed to count details");
        assert_eq!(details, 2);

        let logs: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invoice_action_log WHERE payment_sequence_number IN ($1, $2)",
        )
        .bind(base)
        .bind(base + 1)
        .fetch_one(&pool)
        .await
        .expect("Failed to count action logs");
        assert_eq!(logs, 2);
    }
}

#[tokio::test]
#[ignore = "Requires running Postgres"]
async fn test_failed_pass_leaves_database_untouched() {
    let pool = common::setup_test_db().await;
    let base = sequence_base();
    let (invoice, _) = insert_fixture(&pool, base, PaymentMethod::ConvenienceStore, dec!(100), true).await;

    let options = ValidationOptions::new(MaterializationStrategy::Optimized, RulePhase::Phase2);
    let validator = PaymentFileValidator::new(
        Arc::new(PgTransactionManager::new(pool.clone())),
        Arc::new(StaticFlags::for_options(options)),
    );

    let file = GenericPaymentFile::new(
        PaymentMethod::ConvenienceStore,
        vec![
            GenericPaymentFileRecord::new(base.to_string(), dec!(100), "02")
                .with_payment_date(fixed_time())
                .with_validated_date(fixed_time()),
            GenericPaymentFileRecord::new((base + 99).to_string(), dec!(100), "02"),
        ],
    );
    let err = validator.validate(&file).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        format!(
            "error finding payment record at line 2: payment with sequence number {} not found",
            base + 99
        )
    );

    assert_eq!(load_invoice(&pool, invoice.invoice_id).await.status, InvoiceStatus::Issued);
    assert_eq!(load_payment(&pool, base).await.result_code, None);
}
