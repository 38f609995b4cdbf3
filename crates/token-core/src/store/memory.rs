//! In-memory token database

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use credgate_common::{StoreError, StoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::{TokenDatabase, TokenRecord};

/// Token database backed by concurrent hash maps.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryTokenDatabase {
    tokens: Arc<DashMap<String, TokenRecord>>,
    /// Record id to token string
    ids: Arc<DashMap<i64, String>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryTokenDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl TokenDatabase for MemoryTokenDatabase {
    async fn add_token(&self, token: &str, token_type: &str, state: &str) -> StoreResult<TokenRecord> {
        match self.tokens.entry(token.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Constraint("token already exists".to_string())),
            Entry::Vacant(vacant) => {
                let record = TokenRecord {
                    id: self.next_id.fetch_add(1, Ordering::Relaxed) + 1,
                    token: token.to_string(),
                    token_type: token_type.to_string(),
                    state: state.to_string(),
                    version: 1,
                };
                self.ids.insert(record.id, record.token.clone());
                vacant.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get_token(&self, token: &str) -> StoreResult<Option<TokenRecord>> {
        Ok(self.tokens.get(token).map(|entry| entry.value().clone()))
    }

    async fn update_token(&self, id: i64, expected_version: i64, state: &str) -> StoreResult<bool> {
        let Some(token) = self.ids.get(&id).map(|entry| entry.value().clone()) else {
            return Ok(false);
        };
        let Some(mut record) = self.tokens.get_mut(&token) else {
            return Ok(false);
        };
        if record.id != id || record.version != expected_version {
            return Ok(false);
        }
        record.state = state.to_string();
        record.version += 1;
        Ok(true)
    }

    async fn delete_token(&self, token: &str) -> StoreResult<bool> {
        match self.tokens.remove(token) {
            Some((_, record)) => {
                self.ids.remove(&record.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_token_by_id(&self, id: i64) -> StoreResult<bool> {
        match self.ids.remove(&id) {
            Some((_, token)) => Ok(self.tokens.remove_if(&token, |_, record| record.id == id).is_some()),
            None => Ok(false),
        }
    }

    async fn list_tokens(&self, after_id: i64, limit: u32) -> StoreResult<Vec<TokenRecord>> {
        let mut records: Vec<TokenRecord> = self
            .tokens
            .iter()
            .filter(|entry| entry.id > after_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by_key(|record| record.id);
        records.truncate(limit as usize);
        Ok(records)
    }
}
