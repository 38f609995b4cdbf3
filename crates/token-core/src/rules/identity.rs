//! Binds a token to one identity

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, encode};
use crate::error::Result;
use crate::validator::{CheckRequest, CheckResult, TokenValidator, Validity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityState {
    pub identity: String,
}

/// Passes only when the caller presents the bound identity (exact match)
#[derive(Debug)]
pub struct IdentityValidator {
    identity: String,
}

impl IdentityValidator {
    pub const KIND: &'static str = "identity";

    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
        }
    }

    pub fn hydrate(state: &Value) -> Result<Self> {
        let state: IdentityState = decode(Self::KIND, state)?;
        Ok(Self::new(state.identity))
    }
}

impl TokenValidator for IdentityValidator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, request: &CheckRequest<'_>) -> CheckResult {
        let validity = match request.identity {
            Some(identity) if identity == self.identity => Validity::Valid,
            _ => Validity::TemporaryInvalid,
        };
        CheckResult::unchanged(validity)
    }

    fn is_expired(&self, _now: chrono::DateTime<chrono::Utc>) -> bool {
        false
    }

    fn state(&self) -> Result<Value> {
        encode(&IdentityState {
            identity: self.identity.clone(),
        })
    }
}
