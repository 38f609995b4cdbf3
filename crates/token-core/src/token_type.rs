//! Token types and the registry that publishes them

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use credgate_common::Reloadable;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::chain::{NamedValidator, ValidatorChain};
use crate::error::{Result, TokenError};
use crate::rules::{self, IdentityValidator, PurposeValidator, RuleTemplate};
use crate::state::StateDocument;

/// One rule of a configured token type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Rule kind from the catalog, e.g. `Expiry`
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,
    /// Inline object, or the same object encoded as a JSON string
    #[serde(default)]
    pub config: Value,
}

impl RuleConfig {
    pub fn new(kind: impl Into<String>, config: Value) -> Self {
        Self {
            kind: kind.into(),
            config,
        }
    }

    fn config_value(&self) -> Result<Value> {
        match &self.config {
            Value::String(json) => serde_json::from_str(json)
                .map_err(|e| TokenError::invalid_config(&self.kind, format!("config is not JSON: {e}"))),
            other => Ok(other.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenTypeConfig {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

/// Token store configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenStoreConfig {
    pub token_types: Vec<TokenTypeConfig>,
}

/// A named, ordered list of rule templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenType {
    name: String,
    rules: Vec<RuleTemplate>,
    /// State fragment key of each rule
    rule_names: Vec<String>,
}

impl TokenType {
    pub fn new(name: impl Into<String>, rules: Vec<RuleTemplate>) -> Self {
        let rule_names = fragment_names(&rules);
        Self {
            name: name.into().to_lowercase(),
            rules,
            rule_names,
        }
    }

    pub fn from_config(config: &TokenTypeConfig) -> Result<Self> {
        let rules = config
            .rules
            .iter()
            .map(|rule| rules::parse_rule(&rule.kind, rule.config_value()?))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(&config.name, rules))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[RuleTemplate] {
        &self.rules
    }

    /// Fresh validators for a new token: identity, then purpose, then the
    /// configured rules in declaration order
    pub fn create_chain(
        &self,
        identity: Option<&str>,
        purposes: &[String],
        now: DateTime<Utc>,
    ) -> ValidatorChain {
        let mut validators = Vec::with_capacity(self.rules.len() + 2);

        if let Some(identity) = identity.filter(|i| !i.is_empty()) {
            validators.push(NamedValidator {
                name: IdentityValidator::KIND.to_string(),
                validator: Box::new(IdentityValidator::new(identity)),
            });
        }

        if !purpose_is_empty(purposes) {
            validators.push(NamedValidator {
                name: PurposeValidator::KIND.to_string(),
                validator: Box::new(PurposeValidator::new(purposes)),
            });
        }

        for (template, name) in self.rules.iter().zip(&self.rule_names) {
            validators.push(NamedValidator {
                name: name.clone(),
                validator: template.instantiate(now),
            });
        }

        ValidatorChain::new(&self.name, validators)
    }

    /// Rebuild a token's validators from its stored state.
    ///
    /// Limits come from this token type as currently configured; counters,
    /// timestamps, bound identity and purposes come from the document. A rule
    /// added after the token was issued starts with fresh state.
    pub fn hydrate_chain(&self, document: &StateDocument, now: DateTime<Utc>) -> Result<ValidatorChain> {
        let mut validators = Vec::with_capacity(self.rules.len() + 2);

        if let Some(state) = document.fragment(IdentityValidator::KIND) {
            validators.push(NamedValidator {
                name: IdentityValidator::KIND.to_string(),
                validator: Box::new(IdentityValidator::hydrate(state)?),
            });
        }

        if let Some(state) = document.fragment(PurposeValidator::KIND) {
            validators.push(NamedValidator {
                name: PurposeValidator::KIND.to_string(),
                validator: Box::new(PurposeValidator::hydrate(state)?),
            });
        }

        for (template, name) in self.rules.iter().zip(&self.rule_names) {
            let validator = match document.fragment(name) {
                Some(state) => template.hydrate(state)?,
                None => {
                    debug!(token_type = %self.name, rule = %name, "No stored state for rule, starting fresh");
                    template.instantiate(now)
                }
            };
            validators.push(NamedValidator {
                name: name.clone(),
                validator,
            });
        }

        Ok(ValidatorChain::new(&self.name, validators))
    }
}

fn purpose_is_empty(purposes: &[String]) -> bool {
    purposes.iter().all(|p| p.is_empty())
}

/// `rate`, `rate#2`, ... when a kind appears more than once
fn fragment_names(rules: &[RuleTemplate]) -> Vec<String> {
    let mut seen: HashMap<&'static str, usize> = HashMap::new();
    rules
        .iter()
        .map(|rule| {
            let count = seen.entry(rule.kind()).or_insert(0);
            *count += 1;
            if *count == 1 {
                rule.kind().to_string()
            } else {
                format!("{}#{}", rule.kind(), count)
            }
        })
        .collect()
}

type TokenTypeMap = HashMap<String, Arc<TokenType>>;

/// Configured token types, published as an immutable snapshot.
///
/// [`apply`](Self::apply) builds a complete new map and swaps it in; a check
/// in flight keeps the snapshot it started with.
#[derive(Debug, Default)]
pub struct TokenTypeRegistry {
    types: Reloadable<TokenTypeMap>,
}

impl TokenTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(configs: &[TokenTypeConfig]) -> Result<Self> {
        Ok(Self {
            types: Reloadable::new(build(configs)?),
        })
    }

    /// Replace every token type. Nothing changes if any entry is invalid.
    pub fn apply(&self, configs: &[TokenTypeConfig]) -> Result<()> {
        let types = build(configs)?;
        let count = types.len();
        self.types.replace(types);
        info!(token_types = count, "Token types reconfigured");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<TokenType>> {
        self.types.current().get(&name.to_lowercase()).cloned()
    }

    /// Configured type names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.types.current().keys().cloned().collect();
        names.sort();
        names
    }
}

fn build(configs: &[TokenTypeConfig]) -> Result<TokenTypeMap> {
    let mut types = TokenTypeMap::with_capacity(configs.len());
    for config in configs {
        if config.name.trim().is_empty() {
            return Err(TokenError::Config("token type name is empty".to_string()));
        }
        let token_type = TokenType::from_config(config)?;
        let name = token_type.name().to_string();
        if types.contains_key(&name) {
            return Err(TokenError::DuplicateTokenType(name));
        }
        types.insert(name, Arc::new(token_type));
    }
    Ok(types)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn session_config() -> TokenTypeConfig {
        serde_json::from_value(json!({
            "name": "Session",
            "rules": [
                {"type": "Expiry", "config": "{\"expiryTime\":\"00:00:10\"}"},
                {"type": "rate", "config": {"window": "00:00:02", "maxUseCount": 10}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn config_accepts_string_or_object() {
        let token_type = TokenType::from_config(&session_config()).unwrap();
        assert_eq!(token_type.name(), "session");
        assert_eq!(token_type.rules().len(), 2);
    }

    #[test]
    fn chain_order_is_identity_purpose_rules() {
        let token_type = TokenType::from_config(&session_config()).unwrap();
        let chain = token_type.create_chain(
            Some("urn:identity:1"),
            &["login".to_string()],
            Utc::now(),
        );
        let names: Vec<&str> = chain.names().collect();
        assert_eq!(names, vec!["identity", "purpose", "expiry", "rate"]);

        let bare = token_type.create_chain(None, &[String::new()], Utc::now());
        assert_eq!(bare.names().collect::<Vec<_>>(), vec!["expiry", "rate"]);
    }

    #[test]
    fn repeated_kinds_get_distinct_fragments() {
        let token_type = TokenType::new(
            "burst",
            vec![
                rules::parse_rule("Rate", json!({"window": 1, "maxUseCount": 5})).unwrap(),
                rules::parse_rule("Rate", json!({"window": 60, "maxUseCount": 50})).unwrap(),
            ],
        );
        let chain = token_type.create_chain(None, &[], Utc::now());
        assert_eq!(chain.names().collect::<Vec<_>>(), vec!["rate", "rate#2"]);
    }

    #[test]
    fn unknown_rule_fails_whole_rebuild() {
        let registry = TokenTypeRegistry::from_config(&[session_config()]).unwrap();

        let bad = vec![
            TokenTypeConfig {
                name: "api".into(),
                rules: vec![RuleConfig::new("UseCount", json!({"maxUseCount": 1}))],
            },
            TokenTypeConfig {
                name: "broken".into(),
                rules: vec![RuleConfig::new("Teleport", json!({}))],
            },
        ];
        assert!(matches!(registry.apply(&bad), Err(TokenError::UnknownRuleKind(_))));
        assert_eq!(registry.names(), vec!["session"]);
        assert!(registry.get("api").is_none());
    }

    #[test]
    fn duplicate_names_rejected() {
        let configs = vec![session_config(), session_config()];
        assert!(matches!(
            TokenTypeRegistry::from_config(&configs),
            Err(TokenError::DuplicateTokenType(name)) if name == "session"
        ));
    }

    #[test]
    fn unnamed_type_rejected() {
        let unnamed = TokenTypeConfig {
            name: " ".into(),
            rules: vec![],
        };
        assert!(matches!(TokenTypeRegistry::from_config(&[unnamed]), Err(TokenError::Config(_))));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let registry = TokenTypeRegistry::from_config(&[session_config()]).unwrap();
        assert!(registry.get("SESSION").is_some());
        assert!(registry.get("other").is_none());
    }
}
