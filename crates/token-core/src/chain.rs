//! Ordered validators attached to one token

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::state::StateDocument;
use crate::validator::{CheckRequest, TokenValidator, Validity};

/// A validator and the key of its state fragment
#[derive(Debug)]
pub struct NamedValidator {
    pub name: String,
    pub validator: Box<dyn TokenValidator>,
}

/// Aggregate of one check over the whole chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainOutcome {
    /// The worst result of any validator
    pub validity: Validity,
    /// At least one validator changed its state
    pub modified: bool,
}

#[derive(Debug)]
pub struct ValidatorChain {
    token_type: String,
    validators: Vec<NamedValidator>,
}

impl ValidatorChain {
    pub fn new(token_type: impl Into<String>, validators: Vec<NamedValidator>) -> Self {
        Self {
            token_type: token_type.into(),
            validators,
        }
    }

    pub fn token_type(&self) -> &str {
        &self.token_type
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.validators.iter().map(|v| v.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.validators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }

    /// Run every validator in order and keep the worst result.
    ///
    /// All of them run even after a refusal, so a refused check still spends
    /// a use or a rate slot, and a token that can never pass again is
    /// reported as such whatever else refused it.
    pub fn check(&self, request: &CheckRequest<'_>) -> ChainOutcome {
        self.validators.iter().fold(
            ChainOutcome {
                validity: Validity::Valid,
                modified: false,
            },
            |outcome, named| {
                let result = named.validator.check(request);
                ChainOutcome {
                    validity: outcome.validity.max(result.validity),
                    modified: outcome.modified || result.modified,
                }
            },
        )
    }

    /// True when any validator can never pass again
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.validators.iter().any(|v| v.validator.is_expired(now))
    }

    /// Write every validator's state over `base`, keeping fragments this chain
    /// does not own
    pub fn to_document(&self, base: Option<StateDocument>) -> Result<StateDocument> {
        let mut document = base.unwrap_or_else(|| StateDocument::new(&self.token_type));
        document.token_type = self.token_type.clone();
        for named in &self.validators {
            document.set_fragment(named.name.clone(), named.validator.state()?);
        }
        Ok(document)
    }
}
