use thiserror::Error;

/// Errors surfaced by the validation engine. Any of them aborts the whole
/// validation pass and rolls back its transaction.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl AppError {
    /// Prefixes the message of business errors, keeps infrastructure errors intact.
    pub fn context(self, prefix: impl std::fmt::Display) -> Self {
        match self {
            AppError::Validation(msg) => AppError::Validation(format!("{}: {}", prefix, msg)),
            AppError::NotFound(msg) => AppError::NotFound(format!("{}: {}", prefix, msg)),
            AppError::Database(e) => AppError::Internal(anyhow::anyhow!("{}: {}", prefix, e)),
            other => other,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_))
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
