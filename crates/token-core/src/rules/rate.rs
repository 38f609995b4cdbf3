//! Fixed-window rate limit

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{add_saturating, check_duration, decode, encode};
use crate::error::Result;
use crate::validator::{CheckRequest, CheckResult, TokenValidator, Validity};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateConfig {
    #[serde(with = "crate::timespan")]
    pub window: Duration,
    pub max_use_count: u32,
}

impl RateConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        check_duration("Rate", "window", self.window)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateState {
    pub count: u32,
    pub window_end: Option<DateTime<Utc>>,
}

/// Allows `max_use_count` checks per window.
///
/// The window starts with the first check after the previous window ended.
/// Limits come from the current configuration; only the counter and window
/// end are persisted.
#[derive(Debug)]
pub struct RateValidator {
    config: RateConfig,
    state: Mutex<RateState>,
}

impl RateValidator {
    pub const KIND: &'static str = "rate";

    pub fn new(config: &RateConfig) -> Self {
        Self {
            config: config.clone(),
            state: Mutex::new(RateState::default()),
        }
    }

    pub fn hydrate(config: &RateConfig, state: &Value) -> Result<Self> {
        let state: RateState = decode(Self::KIND, state)?;
        Ok(Self {
            config: config.clone(),
            state: Mutex::new(state),
        })
    }
}

impl TokenValidator for RateValidator {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    fn check(&self, request: &CheckRequest<'_>) -> CheckResult {
        let mut state = self.state.lock();
        let window_over = state.window_end.map_or(true, |end| request.now > end);

        let validity = if window_over {
            state.window_end = Some(add_saturating(request.now, self.config.window));
            state.count = 1;
            Validity::Valid
        } else {
            state.count = state.count.saturating_add(1);
            if state.count > self.config.max_use_count {
                Validity::TemporaryInvalid
            } else {
                Validity::Valid
            }
        };
        CheckResult::modified(validity)
    }

    fn is_expired(&self, _now: DateTime<Utc>) -> bool {
        false
    }

    fn state(&self) -> Result<Value> {
        encode(&*self.state.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(window_seconds: i64, max_use_count: u32) -> RateConfig {
        RateConfig {
            window: Duration::seconds(window_seconds),
            max_use_count,
        }
    }

    #[test]
    fn limits_checks_per_window() {
        let validator = RateValidator::new(&config(2, 3));
        let start = Utc::now();
        let at = |t| validator.check(&CheckRequest::new(None, None, t));

        for _ in 0..3 {
            assert_eq!(at(start), CheckResult::modified(Validity::Valid));
        }
        assert_eq!(at(start), CheckResult::modified(Validity::TemporaryInvalid));
        assert_eq!(at(start + Duration::seconds(2)).validity, Validity::TemporaryInvalid);
        assert_eq!(at(start + Duration::milliseconds(2001)).validity, Validity::Valid);
    }

    #[test]
    fn hydrated_state_uses_new_limits() {
        let start = Utc::now();
        let validator = RateValidator::new(&config(60, 10));
        for _ in 0..3 {
            validator.check(&CheckRequest::new(None, None, start));
        }
        let state = validator.state().unwrap();
        assert_eq!(state["count"], 3);

        let tighter = RateValidator::hydrate(&config(60, 3), &state).unwrap();
        let result = tighter.check(&CheckRequest::new(None, None, start));
        assert_eq!(result.validity, Validity::TemporaryInvalid);
    }

    #[test]
    fn config_parses_camel_case() {
        let config: RateConfig =
            serde_json::from_str(r#"{"window": "00:00:02", "maxUseCount": 10}"#).unwrap();
        assert_eq!(config.window, Duration::seconds(2));
        assert_eq!(config.max_use_count, 10);
    }

    proptest::proptest! {
        #[test]
        fn grants_exactly_max_within_one_window(max in 1u32..40, checks in 0usize..80) {
            let validator = RateValidator::new(&config(60, max));
            let now = Utc::now();
            let granted = (0..checks)
                .filter(|_| validator.check(&CheckRequest::new(None, None, now)).validity == Validity::Valid)
                .count();
            proptest::prop_assert_eq!(granted, checks.min(max as usize));
        }
    }
}
