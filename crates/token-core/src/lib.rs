//! # credgate-tokens
//!
//! Opaque tokens checked against configurable rules.
//!
//! A token type is an ordered list of rules (expiry, rate limit, use count)
//! configured as JSON. Issuing a token instantiates one validator per rule,
//! plus identity and purpose validators from the creation arguments, and
//! stores their state. Every check rebuilds the validators from that state
//! and the *current* type configuration, runs them, and persists whatever
//! they changed.
//!
//! ```json
//! [{ "name": "session", "rules": [
//!     { "type": "Expiry", "config": { "expiryTime": "01:00:00" } },
//!     { "type": "Rate", "config": { "window": "00:00:02", "maxUseCount": 10 } }
//! ]}]
//! ```

pub mod chain;
pub mod error;
pub mod factory;
pub mod rules;
pub mod service;
pub mod state;
pub mod store;
pub mod timespan;
pub mod token_type;
pub mod types;
pub mod validator;

use std::sync::Arc;

use credgate_common::SystemClock;

pub use chain::{ChainOutcome, NamedValidator, ValidatorChain};
pub use error::{Result, TokenError};
pub use factory::{HydratedToken, TokenFactory};
pub use rules::{RuleDescriptor, RuleTemplate};
pub use service::TokenStore;
pub use state::{StateDocument, STATE_VERSION};
pub use store::{MemoryTokenDatabase, SqliteTokenDatabase, TokenDatabase, TokenRecord};
pub use token_type::{RuleConfig, TokenStoreConfig, TokenType, TokenTypeConfig, TokenTypeRegistry};
pub use types::{TokenResponse, TokenStatus};
pub use validator::{CheckRequest, CheckResult, TokenValidator, Validity};

/// Initialize a token store on a SQLite database
pub async fn init(config: &TokenStoreConfig, database_url: &str) -> Result<TokenStore> {
    let database = SqliteTokenDatabase::new(database_url)
        .await
        .map_err(|e| TokenError::store("connect", e))?;
    TokenStore::new(config, Arc::new(database), SystemClock::shared())
}
