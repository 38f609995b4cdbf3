//! Token check results

use serde::{Deserialize, Serialize};

use crate::validator::Validity;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenStatus {
    /// Every rule passed
    Allowed,
    /// Refused for now; the token survives
    NotAllowed,
    /// Unknown, deleted, or of another type
    Invalid,
    /// The requested token type is not configured
    Unsupported,
}

impl TokenStatus {
    pub fn is_allowed(self) -> bool {
        self == TokenStatus::Allowed
    }
}

impl From<Validity> for TokenStatus {
    fn from(validity: Validity) -> Self {
        match validity {
            Validity::Valid => TokenStatus::Allowed,
            Validity::TemporaryInvalid => TokenStatus::NotAllowed,
            Validity::PermanentInvalid => TokenStatus::Invalid,
        }
    }
}

/// Result of checking one token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub value: String,
    pub identity: Option<String>,
    pub purpose: Option<String>,
    pub status: TokenStatus,
}

impl TokenResponse {
    pub fn new(value: &str, identity: Option<&str>, purpose: Option<&str>, status: TokenStatus) -> Self {
        Self {
            value: value.to_string(),
            identity: identity.map(str::to_string),
            purpose: purpose.map(str::to_string),
            status,
        }
    }
}
