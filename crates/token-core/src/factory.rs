//! Builds validator chains for new and stored tokens

use std::sync::Arc;

use credgate_common::SharedClock;

use crate::chain::ValidatorChain;
use crate::error::Result;
use crate::state::StateDocument;
use crate::token_type::{TokenType, TokenTypeRegistry};

/// A stored token brought back to life
#[derive(Debug)]
pub struct HydratedToken {
    pub token_type: Arc<TokenType>,
    /// The document the chain was read from; fragments of rules no longer
    /// configured are carried in here
    pub document: StateDocument,
    pub chain: ValidatorChain,
}

#[derive(Clone)]
pub struct TokenFactory {
    registry: Arc<TokenTypeRegistry>,
    clock: SharedClock,
}

impl TokenFactory {
    pub fn new(registry: Arc<TokenTypeRegistry>, clock: SharedClock) -> Self {
        Self { registry, clock }
    }

    pub fn registry(&self) -> &TokenTypeRegistry {
        &self.registry
    }

    /// Fresh chain for a new token, or `None` when the type is not configured
    pub fn create(
        &self,
        token_type: &str,
        identity: Option<&str>,
        purposes: &[String],
    ) -> Option<ValidatorChain> {
        let token_type = self.registry.get(token_type)?;
        Some(token_type.create_chain(identity, purposes, self.clock.now()))
    }

    /// Rebuild the chain of a stored token against the current configuration
    /// of its type. `Ok(None)` when the type is no longer configured.
    pub fn hydrate(&self, token_type: &str, state: &str) -> Result<Option<HydratedToken>> {
        let Some(token_type) = self.registry.get(token_type) else {
            return Ok(None);
        };
        let document = StateDocument::parse(state)?;
        let chain = token_type.hydrate_chain(&document, self.clock.now())?;
        Ok(Some(HydratedToken {
            token_type,
            document,
            chain,
        }))
    }
}

impl std::fmt::Debug for TokenFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenFactory")
            .field("token_types", &self.registry.names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token_type::{RuleConfig, TokenTypeConfig};
    use crate::validator::{CheckRequest, Validity};
    use credgate_common::{Clock, ManualClock};
    use serde_json::json;

    fn factory() -> (TokenFactory, Arc<ManualClock>) {
        let registry = TokenTypeRegistry::from_config(&[TokenTypeConfig {
            name: "onetime".into(),
            rules: vec![RuleConfig::new("UseCount", json!({"maxUseCount": 1}))],
        }])
        .unwrap();
        let clock = ManualClock::starting_now();
        (TokenFactory::new(Arc::new(registry), clock.clone()), clock)
    }

    #[test]
    fn unknown_type_creates_nothing() {
        let (factory, _) = factory();
        assert!(factory.create("session", None, &[]).is_none());
        assert!(factory.hydrate("session", "{}").unwrap().is_none());
    }

    #[test]
    fn stored_state_is_restored() {
        let (factory, clock) = factory();
        let chain = factory.create("onetime", Some("urn:identity:a"), &[]).unwrap();
        let state = chain.to_document(None).unwrap().to_json().unwrap();

        let hydrated = factory.hydrate("onetime", &state).unwrap().unwrap();
        assert_eq!(hydrated.chain.names().collect::<Vec<_>>(), vec!["identity", "usecount"]);

        let request = CheckRequest::new(Some("urn:identity:a"), None, clock.now());
        assert_eq!(hydrated.chain.check(&request).validity, Validity::Valid);
        assert!(hydrated.chain.is_expired(clock.now()));
    }
}
