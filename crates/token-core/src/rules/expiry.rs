//! Absolute expiry time

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{add_saturating, check_duration, decode, encode};
use crate::error::Result;
use crate::validator::{CheckRequest, CheckResult, TokenValidator, Validity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryConfig {
    #[serde(with = "crate::timespan")]
    pub expiry_time: Duration,
}

impl ExpiryConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        check_duration("Expiry", "expiryTime", self.expiry_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpiryState {
    pub expires: DateTime<Utc>,
}

#[derive(Debug)]
pub struct ExpiryValidator {
    expires: DateTime<Utc>,
}

impl ExpiryValidator {
    pub const KIND: &'static str = "expiry";

    pub fn new(config: &ExpiryConfig, now: DateTime<Utc>) -> Self {
        Self {
            expires: add_saturating(now, config.expiry_time),
        }
    }

    pub fn hydrate(state: &Value) -> Result<Self> {
        let state: ExpiryState = decode(Self::KIND, state)?;
        Ok(Self {
            expires: state.expires,
        })
    }

    pub fn expires(&self) -> DateTime<Utc> {
        self.expires
    }
}

impl TokenValidator for ExpiryValidator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, request: &CheckRequest<'_>) -> CheckResult {
        let validity = if request.now < self.expires {
            Validity::Valid
        } else {
            Validity::PermanentInvalid
        };
        CheckResult::unchanged(validity)
    }

    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires
    }

    fn state(&self) -> Result<Value> {
        encode(&ExpiryState {
            expires: self.expires,
        })
    }
}
