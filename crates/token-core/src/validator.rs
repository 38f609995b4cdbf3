//! The live, stateful half of a validation rule

use std::fmt;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::Result;

/// Outcome of one validator for one check
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Validity {
    Valid,
    /// Refused now, may pass later
    TemporaryInvalid,
    /// Can never pass again; the token is deleted
    PermanentInvalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckResult {
    pub validity: Validity,
    /// The validator's persisted state changed during the check
    pub modified: bool,
}

impl CheckResult {
    pub fn unchanged(validity: Validity) -> Self {
        Self {
            validity,
            modified: false,
        }
    }

    pub fn modified(validity: Validity) -> Self {
        Self {
            validity,
            modified: true,
        }
    }
}

/// What a token is being checked for
#[derive(Debug, Clone, Copy)]
pub struct CheckRequest<'a> {
    pub identity: Option<&'a str>,
    pub purpose: Option<&'a str>,
    pub now: DateTime<Utc>,
}

impl<'a> CheckRequest<'a> {
    pub fn new(identity: Option<&'a str>, purpose: Option<&'a str>, now: DateTime<Utc>) -> Self {
        Self {
            identity: identity.filter(|i| !i.is_empty()),
            purpose: purpose.filter(|p| !p.is_empty()),
            now,
        }
    }
}

/// A validator instance attached to one token.
///
/// `check` takes `&self`; validators with mutable state guard it with their own
/// short-lived lock or atomic so one chain can be checked from several tasks.
pub trait TokenValidator: Send + Sync + fmt::Debug {
    /// Rule kind, also the default key of the state fragment
    fn kind(&self) -> &'static str;

    fn check(&self, request: &CheckRequest<'_>) -> CheckResult;

    /// True once the validator can never pass again
    fn is_expired(&self, now: DateTime<Utc>) -> bool;

    /// The mutable state to persist
    fn state(&self) -> Result<Value>;
}
