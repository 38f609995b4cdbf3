//! Restricts a token to a set of purposes

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, encode};
use crate::error::Result;
use crate::validator::{CheckRequest, CheckResult, TokenValidator, Validity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurposeState {
    pub purposes: Vec<String>,
}

/// Case-insensitive purpose allow-list
#[derive(Debug)]
pub struct PurposeValidator {
    purposes: Vec<String>,
}

impl PurposeValidator {
    pub const KIND: &'static str = "purpose";

    pub fn new<I, S>(purposes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut purposes: Vec<String> = purposes
            .into_iter()
            .map(|p| p.as_ref().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        purposes.sort();
        purposes.dedup();
        Self { purposes }
    }

    pub fn hydrate(state: &Value) -> Result<Self> {
        let state: PurposeState = decode(Self::KIND, state)?;
        Ok(Self::new(state.purposes))
    }
}

impl TokenValidator for PurposeValidator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, request: &CheckRequest<'_>) -> CheckResult {
        if self.purposes.is_empty() {
            return CheckResult::unchanged(Validity::Valid);
        }
        let validity = match request.purpose {
            Some(purpose) if self.purposes.contains(&purpose.to_lowercase()) => Validity::Valid,
            _ => Validity::TemporaryInvalid,
        };
        CheckResult::unchanged(validity)
    }

    fn is_expired(&self, _now: chrono::DateTime<chrono::Utc>) -> bool {
        false
    }

    fn state(&self) -> Result<Value> {
        encode(&PurposeState {
            purposes: self.purposes.clone(),
        })
    }
}
