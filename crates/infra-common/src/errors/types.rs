use thiserror::Error;

/// Result alias for infrastructure operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result alias for persistence gateway calls
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by the shared infrastructure itself
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Failure reported by a persistence gateway.
///
/// Gateways never retry. Callers wrap these with an [`ErrorContext`](super::ErrorContext)
/// and surface them unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("record not found: {0}")]
    NotFound(String),

    #[error("constraint violated: {0}")]
    Constraint(String),
}

impl StoreError {
    /// True when the failure is a uniqueness/constraint violation rather than an outage
    pub fn is_constraint(&self) -> bool {
        match self {
            StoreError::Constraint(_) => true,
            StoreError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}
