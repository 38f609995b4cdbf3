//! Fixed budget of uses

use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{decode, encode};
use crate::error::Result;
use crate::validator::{CheckRequest, CheckResult, TokenValidator, Validity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UseCountConfig {
    pub max_use_count: u32,
}

/// Uses consumed so far; remaining uses follow from the configured maximum
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UseCountState {
    pub used: u32,
}

#[derive(Debug)]
pub struct UseCountValidator {
    max_use_count: u32,
    remaining: AtomicU32,
}

impl UseCountValidator {
    pub const KIND: &'static str = "usecount";

    pub fn new(config: &UseCountConfig) -> Self {
        Self {
            max_use_count: config.max_use_count,
            remaining: AtomicU32::new(config.max_use_count),
        }
    }

    pub fn hydrate(config: &UseCountConfig, state: &Value) -> Result<Self> {
        let state: UseCountState = decode(Self::KIND, state)?;
        Ok(Self {
            max_use_count: config.max_use_count,
            remaining: AtomicU32::new(config.max_use_count.saturating_sub(state.used)),
        })
    }

    pub fn remaining(&self) -> u32 {
        self.remaining.load(Ordering::Acquire)
    }
}

impl TokenValidator for UseCountValidator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, _request: &CheckRequest<'_>) -> CheckResult {
        let decremented = self
            .remaining
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |remaining| {
                remaining.checked_sub(1)
            });
        match decremented {
            Ok(_) => CheckResult::modified(Validity::Valid),
            Err(_) => CheckResult::unchanged(Validity::PermanentInvalid),
        }
    }

    fn is_expired(&self, _now: DateTime<Utc>) -> bool {
        self.remaining() == 0
    }

    fn state(&self) -> Result<Value> {
        encode(&UseCountState {
            used: self.max_use_count.saturating_sub(self.remaining()),
        })
    }
}
