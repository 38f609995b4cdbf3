//! Persisted token state document.
//!
//! ```json
//! {"version": 1, "type": "session", "identity": {...}, "rate": {...}}
//! ```
//!
//! Each validator owns one fragment keyed by its name. Fragments are merged
//! into the previously stored document, so fragments written by rules that
//! have since been removed from the token type survive a round trip.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TokenError};

/// Current document layout
pub const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(rename = "type")]
    pub token_type: String,
    #[serde(flatten)]
    pub fragments: BTreeMap<String, Value>,
}

fn default_version() -> u32 {
    STATE_VERSION
}

impl StateDocument {
    pub fn new(token_type: impl Into<String>) -> Self {
        Self {
            version: STATE_VERSION,
            token_type: token_type.into(),
            fragments: BTreeMap::new(),
        }
    }

    pub fn parse(json: &str) -> Result<Self> {
        let document: StateDocument =
            serde_json::from_str(json).map_err(|e| TokenError::MalformedState(e.to_string()))?;
        if document.version > STATE_VERSION {
            return Err(TokenError::MalformedState(format!(
                "state version {} is newer than supported version {STATE_VERSION}",
                document.version
            )));
        }
        Ok(document)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| TokenError::MalformedState(e.to_string()))
    }

    pub fn fragment(&self, name: &str) -> Option<&Value> {
        self.fragments.get(name)
    }

    pub fn set_fragment(&mut self, name: impl Into<String>, state: Value) {
        self.fragments.insert(name.into(), state);
    }
}
