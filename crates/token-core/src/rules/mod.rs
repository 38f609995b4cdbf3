//! Rule catalog.
//!
//! The configurable rule kinds are a fixed table: each entry maps a kind name
//! (matched case-insensitively) to a parser for its configuration. A parsed
//! configuration is a [`RuleTemplate`], the immutable half of a rule; each
//! token gets its own validator instances from the templates of its type.
//!
//! Identity and purpose validators are not in the catalog. They are added by
//! the factory from the arguments of each token's creation.

pub mod expiry;
pub mod identity;
pub mod purpose;
pub mod rate;
pub mod use_count;

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

pub use expiry::{ExpiryConfig, ExpiryValidator};
pub use identity::IdentityValidator;
pub use purpose::PurposeValidator;
pub use rate::{RateConfig, RateValidator};
pub use use_count::{UseCountConfig, UseCountValidator};

use crate::error::{Result, TokenError};
use crate::validator::TokenValidator;

/// Immutable configuration of one rule in a token type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleTemplate {
    Expiry(ExpiryConfig),
    Rate(RateConfig),
    UseCount(UseCountConfig),
}

impl RuleTemplate {
    /// Validator kind produced by this template
    pub fn kind(&self) -> &'static str {
        match self {
            RuleTemplate::Expiry(_) => ExpiryValidator::KIND,
            RuleTemplate::Rate(_) => RateValidator::KIND,
            RuleTemplate::UseCount(_) => UseCountValidator::KIND,
        }
    }

    /// A fresh validator for a new token
    pub fn instantiate(&self, now: DateTime<Utc>) -> Box<dyn TokenValidator> {
        match self {
            RuleTemplate::Expiry(config) => Box::new(ExpiryValidator::new(config, now)),
            RuleTemplate::Rate(config) => Box::new(RateValidator::new(config)),
            RuleTemplate::UseCount(config) => Box::new(UseCountValidator::new(config)),
        }
    }

    /// A validator with this template's configuration and persisted state
    pub fn hydrate(&self, state: &Value) -> Result<Box<dyn TokenValidator>> {
        Ok(match self {
            RuleTemplate::Expiry(_) => Box::new(ExpiryValidator::hydrate(state)?),
            RuleTemplate::Rate(config) => Box::new(RateValidator::hydrate(config, state)?),
            RuleTemplate::UseCount(config) => Box::new(UseCountValidator::hydrate(config, state)?),
        })
    }
}

/// One entry of the rule catalog
#[derive(Debug)]
pub struct RuleDescriptor {
    pub name: &'static str,
    /// Configuration fields, for error messages and documentation
    pub schema: &'static str,
    parse: fn(Value) -> Result<RuleTemplate>,
}

impl RuleDescriptor {
    pub fn parse(&self, config: Value) -> Result<RuleTemplate> {
        (self.parse)(config)
    }
}

static CATALOG: [RuleDescriptor; 3] = [
    RuleDescriptor {
        name: "Expiry",
        schema: r#"{"expiryTime": "[d.]hh:mm:ss"}"#,
        parse: parse_expiry,
    },
    RuleDescriptor {
        name: "Rate",
        schema: r#"{"window": "[d.]hh:mm:ss", "maxUseCount": integer}"#,
        parse: parse_rate,
    },
    RuleDescriptor {
        name: "UseCount",
        schema: r#"{"maxUseCount": integer}"#,
        parse: parse_use_count,
    },
];

/// Every configurable rule kind
pub fn catalog() -> &'static [RuleDescriptor] {
    &CATALOG
}

pub fn find(kind: &str) -> Option<&'static RuleDescriptor> {
    CATALOG.iter().find(|d| d.name.eq_ignore_ascii_case(kind.trim()))
}

/// Resolve a rule kind and parse its configuration
pub fn parse_rule(kind: &str, config: Value) -> Result<RuleTemplate> {
    let descriptor = find(kind).ok_or_else(|| TokenError::UnknownRuleKind(kind.to_string()))?;
    descriptor.parse(config)
}

fn parse_config<T: DeserializeOwned>(descriptor: &str, schema: &str, config: Value) -> Result<T> {
    let config = match config {
        Value::Null => Value::Object(Default::default()),
        other => other,
    };
    serde_json::from_value(config)
        .map_err(|e| TokenError::invalid_config(descriptor, format!("{e}; expected {schema}")))
}

fn parse_expiry(config: Value) -> Result<RuleTemplate> {
    let config: ExpiryConfig = parse_config("Expiry", CATALOG[0].schema, config)?;
    config.validate()?;
    Ok(RuleTemplate::Expiry(config))
}

fn parse_rate(config: Value) -> Result<RuleTemplate> {
    let config: RateConfig = parse_config("Rate", CATALOG[1].schema, config)?;
    config.validate()?;
    Ok(RuleTemplate::Rate(config))
}

fn parse_use_count(config: Value) -> Result<RuleTemplate> {
    let config: UseCountConfig = parse_config("UseCount", CATALOG[2].schema, config)?;
    Ok(RuleTemplate::UseCount(config))
}

/// Longest expiry or rate window a rule accepts
pub const MAX_RULE_DURATION_DAYS: i64 = 36_500;

pub(crate) fn check_duration(kind: &str, field: &str, duration: Duration) -> Result<()> {
    if duration <= Duration::zero() {
        return Err(TokenError::invalid_config(kind, format!("{field} must be positive")));
    }
    if duration > Duration::days(MAX_RULE_DURATION_DAYS) {
        return Err(TokenError::invalid_config(
            kind,
            format!("{field} must not exceed {MAX_RULE_DURATION_DAYS} days"),
        ));
    }
    Ok(())
}

/// `start + duration`, clamped to the latest representable instant
pub(crate) fn add_saturating(start: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    start
        .checked_add_signed(duration)
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Decode a validator's state fragment
pub(crate) fn decode<T: DeserializeOwned>(kind: &str, state: &Value) -> Result<T> {
    T::deserialize(state).map_err(|e| TokenError::MalformedState(format!("{kind}: {e}")))
}

pub(crate) fn encode<T: Serialize>(state: &T) -> Result<Value> {
    serde_json::to_value(state).map_err(|e| TokenError::MalformedState(e.to_string()))
}
