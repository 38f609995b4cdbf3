//! Error types for identity and credential operations

use credgate_common::{ErrorContext, StoreError};
use thiserror::Error;

use crate::policy::PolicyViolation;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid username: {0}")]
    InvalidUsername(PolicyViolation),

    #[error("Invalid password: {0}")]
    InvalidPassword(PolicyViolation),

    #[error("Invalid purpose '{0}'")]
    InvalidPurpose(String),

    #[error("Username '{0}' is not available")]
    UsernameUnavailable(String),

    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    #[error("Unsupported password hash version {0}")]
    UnsupportedHashVersion(u32),

    #[error("Password hashing failed: {0}")]
    Hashing(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store failure {context}: {source}")]
    Store {
        context: ErrorContext,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, IdentityError>;

impl IdentityError {
    /// Wrap a gateway failure with the operation it interrupted
    pub fn store(operation: &str, source: StoreError) -> Self {
        IdentityError::Store {
            context: ErrorContext::new("identity-store", operation),
            source,
        }
    }
}

/// Attach gateway context to a `StoreResult`
pub(crate) trait StoreResultExt<T> {
    fn during(self, operation: &str) -> Result<T>;
}

impl<T> StoreResultExt<T> for credgate_common::StoreResult<T> {
    fn during(self, operation: &str) -> Result<T> {
        self.map_err(|source| IdentityError::store(operation, source))
    }
}
