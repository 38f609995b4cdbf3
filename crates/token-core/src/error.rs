//! Error types for token operations

use credgate_common::{ErrorContext, StoreError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Unknown rule kind '{0}'")]
    UnknownRuleKind(String),

    #[error("Invalid configuration for {kind} rule: {reason}")]
    InvalidRuleConfig { kind: String, reason: String },

    #[error("Token type '{0}' is configured more than once")]
    DuplicateTokenType(String),

    #[error("Malformed token state: {0}")]
    MalformedState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store failure {context}: {source}")]
    Store {
        context: ErrorContext,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, TokenError>;

impl TokenError {
    pub fn store(operation: &str, source: StoreError) -> Self {
        TokenError::Store {
            context: ErrorContext::new("token-store", operation),
            source,
        }
    }

    pub(crate) fn invalid_config(kind: &str, reason: impl ToString) -> Self {
        TokenError::InvalidRuleConfig {
            kind: kind.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub(crate) trait StoreResultExt<T> {
    fn during(self, operation: &str) -> Result<T>;
}

impl<T> StoreResultExt<T> for credgate_common::StoreResult<T> {
    fn during(self, operation: &str) -> Result<T> {
        self.map_err(|source| TokenError::store(operation, source))
    }
}
