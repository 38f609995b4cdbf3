//! Identity persistence gateway

mod memory;
mod sqlite;

pub use memory::MemoryIdentityStore;
pub use sqlite::SqliteIdentityStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credgate_common::StoreResult;

use crate::types::{
    AuthenticationRecord, Claim, CredentialRecord, NewCredential, SharedSecretRecord,
};

/// Storage for identities, claims, credentials, authentication records and
/// shared secrets.
///
/// Usernames are unique and compared case-insensitively. Implementations never
/// retry a failed write.
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn add_identity(&self, identity: &str) -> StoreResult<()>;
    async fn identity_exists(&self, identity: &str) -> StoreResult<bool>;

    async fn get_claims(&self, identity: &str) -> StoreResult<Vec<Claim>>;
    /// Insert a claim, replacing any existing claim with the same name (case-insensitive)
    async fn put_claim(&self, identity: &str, claim: &Claim) -> StoreResult<()>;
    async fn delete_claim(&self, identity: &str, name: &str) -> StoreResult<bool>;
    /// Identities with a claim value containing `text` (case-insensitive), oldest first, distinct
    async fn search_claims(&self, text: &str) -> StoreResult<Vec<String>>;

    /// Fails with a constraint error when the username is taken
    async fn add_credential(&self, credential: NewCredential) -> StoreResult<CredentialRecord>;
    async fn get_credential_by_username(&self, username: &str) -> StoreResult<Option<CredentialRecord>>;
    async fn get_credential(&self, id: i64) -> StoreResult<Option<CredentialRecord>>;
    async fn get_identity_credentials(&self, identity: &str) -> StoreResult<Vec<CredentialRecord>>;
    async fn update_password(
        &self,
        username: &str,
        hash_version: u32,
        salt: &[u8],
        hash: &[u8],
    ) -> StoreResult<bool>;
    async fn delete_credential(&self, username: &str) -> StoreResult<bool>;
    /// Add `credential` and remove every other credential of its identity in
    /// one step. Returns the new record and the number removed. Nothing
    /// changes when the username belongs to another identity.
    async fn replace_credentials(&self, credential: NewCredential) -> StoreResult<(CredentialRecord, u64)>;

    /// Atomically add one failed login and return the new count
    async fn increment_fail_count(&self, credential_id: i64) -> StoreResult<u32>;
    async fn lock(&self, username: &str, until: DateTime<Utc>) -> StoreResult<()>;
    /// Clear the lock and the failure count
    async fn unlock(&self, username: &str) -> StoreResult<()>;

    /// Store a successful login. A credentials login also resets the
    /// credential's failure count.
    async fn record_success(&self, record: AuthenticationRecord) -> StoreResult<()>;
    async fn get_authentication(&self, remember_me_token: &str) -> StoreResult<Option<AuthenticationRecord>>;

    async fn add_shared_secret(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
        purposes: &[String],
    ) -> StoreResult<SharedSecretRecord>;
    async fn get_shared_secret(&self, secret: &str) -> StoreResult<Option<SharedSecretRecord>>;
    async fn delete_shared_secret(&self, secret: &str) -> StoreResult<bool>;
    async fn get_identity_shared_secrets(&self, identity: &str) -> StoreResult<Vec<SharedSecretRecord>>;
}
