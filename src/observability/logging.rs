use rust_decimal::Decimal;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ApplicationSettings;
use crate::error::{AppError, Result};

/// Log level and output format for the runner.
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
    Compact,
}

impl From<&str> for LogFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

impl From<&ApplicationSettings> for LogConfig {
    fn from(settings: &ApplicationSettings) -> Self {
        Self {
            level: settings.log_level.clone(),
            format: LogFormat::from(settings.log_format.as_str()),
        }
    }
}

/// Installs the global subscriber. `RUST_LOG` overrides the configured level.
///
/// Fails when another subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    // Exactly one of these is Some; a None layer is a no-op.
    let json = (config.format == LogFormat::Json).then(|| fmt::layer().json().with_current_span(true));
    let compact = (config.format == LogFormat::Compact).then(|| fmt::layer().compact());
    let pretty = (config.format == LogFormat::Pretty).then(|| fmt::layer().pretty());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json)
        .with(compact)
        .with(pretty)
        .try_init()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("failed to install log subscriber: {}", e)))?;

    tracing::info!(level = %config.level, format = ?config.format, "Logging initialized");
    Ok(())
}

/// Keeps the last two characters of a payment number, e.g. `****0042` for `10000042`.
pub fn mask_payment_number(payment_number: &str) -> String {
    let chars: Vec<char> = payment_number.chars().collect();
    if chars.len() <= 2 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 2), tail)
}

/// Reports only the count of whole-yen digits of a file total, e.g. `***(6 digits)`.
pub fn mask_amount(amount: &Decimal) -> String {
    let whole = amount.abs().trunc().to_string();
    let digits = whole.trim_start_matches('0').len().max(1);
    format!("***({} digits)", digits)
}
