//! Token persistence gateway

mod memory;
mod sqlite;

pub use memory::MemoryTokenDatabase;
pub use sqlite::SqliteTokenDatabase;

use async_trait::async_trait;
use credgate_common::StoreResult;

/// A stored token and its serialized validator state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub id: i64,
    pub token: String,
    pub token_type: String,
    pub state: String,
    /// Bumped by every successful [`TokenDatabase::update_token`]
    pub version: i64,
}

/// Storage for issued tokens.
///
/// State writes are compare-and-swap on the record version so that two
/// concurrent checks of one token cannot both persist a stale counter.
#[async_trait]
pub trait TokenDatabase: Send + Sync {
    /// Fails with a constraint error when the token string already exists
    async fn add_token(&self, token: &str, token_type: &str, state: &str) -> StoreResult<TokenRecord>;
    async fn get_token(&self, token: &str) -> StoreResult<Option<TokenRecord>>;
    /// Replace the state if the record is still at `expected_version`.
    /// Returns false when the record changed or no longer exists.
    async fn update_token(&self, id: i64, expected_version: i64, state: &str) -> StoreResult<bool>;
    async fn delete_token(&self, token: &str) -> StoreResult<bool>;
    async fn delete_token_by_id(&self, id: i64) -> StoreResult<bool>;
    /// Up to `limit` records with an id greater than `after_id`, in id order
    async fn list_tokens(&self, after_id: i64, limit: u32) -> StoreResult<Vec<TokenRecord>>;
}
