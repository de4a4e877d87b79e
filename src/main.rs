use std::sync::Arc;
use std::time::Duration;

use payment_validation_engine::config::Settings;
use payment_validation_engine::error::AppError;
use payment_validation_engine::models::GenericPaymentFile;
use payment_validation_engine::observability::{init_logging, init_metrics, LogConfig};
use payment_validation_engine::repositories::PgTransactionManager;
use payment_validation_engine::services::{PaymentFileValidator, SettingsFeatureFlags};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let path = std::env::args()
        .nth(1)
        .ok_or_else(|| AppError::Validation("usage: payment-validation-engine <file.json>".to_string()))?;

    // Load configuration
    let settings = Settings::new()?;
    init_logging(&LogConfig::from(&settings.application))?;
    init_metrics()?;
    info!("Configuration loaded");

    // Connect to PostgreSQL
    let pool = PgPoolOptions::new()
        .max_connections(settings.database.pool_size)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&settings.database.url)
        .await
        .map_err(AppError::Database)?;
    info!("Database connection established");

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await.map_err(AppError::Migration)?;
    info!("Migrations applied successfully");

    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("unable to read {}: {}", path, e)))?;
    let file: GenericPaymentFile = serde_json::from_str(&raw)
        .map_err(|e| AppError::Validation(format!("invalid payment file {}: {}", path, e)))?;
    info!("Loaded {} {} records from {}", file.generic_payment_data.len(), file.payment_method, path);

    let validator = PaymentFileValidator::new(
        Arc::new(PgTransactionManager::new(pool)),
        Arc::new(SettingsFeatureFlags::new(settings.features.clone())),
    )
    .with_advisory_lock(settings.database.advisory_lock);

    let result = validator.validate(&file).await?;
    println!("{}", serde_json::to_string_pretty(&result)?);

    Ok(())
}
