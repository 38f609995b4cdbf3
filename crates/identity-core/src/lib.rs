//! # credgate-identity
//!
//! Identities, claims and password credentials.
//!
//! This crate provides:
//! - Versioned password hashing (SHA-256 and Argon2id)
//! - Username and password policy checks
//! - Credential authentication with lockout after repeated failures
//! - Remember-me tokens and shared secrets
//! - Identity directory with claims and search
//! - In-memory and SQLite identity stores
//!
//! ## Architecture
//!
//! Every component reads its configuration from a hot-reloadable snapshot and
//! talks to storage only through the [`IdentityStore`] trait. Token
//! validation lives in `credgate-tokens`.

pub mod authenticator;
pub mod config;
pub mod directory;
pub mod error;
pub mod hashing;
pub mod policy;
pub mod service;
pub mod shared_secrets;
pub mod store;
pub mod types;

use std::sync::Arc;

use credgate_common::SystemClock;

pub use authenticator::CredentialAuthenticator;
pub use config::{IdentityConfig, IdentitySettings, LockoutConfig, PasswordConfig, UsernameConfig};
pub use directory::IdentityDirectory;
pub use error::{IdentityError, Result};
pub use hashing::{HashScheme, HashSchemeRegistry, PasswordHash};
pub use policy::{CredentialPolicy, PasswordCheck, PolicyViolation};
pub use service::IdentityService;
pub use shared_secrets::SharedSecrets;
pub use store::{IdentityStore, MemoryIdentityStore, SqliteIdentityStore};
pub use types::{
    AuthenticationResult, AuthenticationStatus, Claim, ClaimStatus, Credential,
    IdentitySearchResult, SharedSecret,
};

/// Initialize the identity service on a SQLite database
pub async fn init(config: IdentityConfig, database_url: &str) -> Result<IdentityService> {
    let store = SqliteIdentityStore::new(database_url)
        .await
        .map_err(|e| IdentityError::store("connect", e))?;
    IdentityService::new(config, Arc::new(store), SystemClock::shared())
}
