//! In-memory identity store

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credgate_common::{StoreError, StoreResult};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::IdentityStore;
use crate::types::{
    AuthenticationMethod, AuthenticationRecord, Claim, CredentialRecord, NewCredential,
    SharedSecretRecord,
};

#[derive(Debug, Clone)]
struct IdentityEntry {
    created: u64,
    claims: Vec<Claim>,
}

/// Identity store backed by concurrent hash maps.
///
/// Cloning shares the underlying maps.
#[derive(Debug, Clone, Default)]
pub struct MemoryIdentityStore {
    identities: Arc<DashMap<String, IdentityEntry>>,
    credentials: Arc<DashMap<i64, CredentialRecord>>,
    /// Lower-cased username to credential id
    usernames: Arc<DashMap<String, i64>>,
    authentications: Arc<DashMap<String, AuthenticationRecord>>,
    shared_secrets: Arc<DashMap<String, SharedSecretRecord>>,
    next_id: Arc<AtomicI64>,
    next_identity: Arc<AtomicU64>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn credential_id(&self, username: &str) -> Option<i64> {
        self.usernames
            .get(&username.to_lowercase())
            .map(|entry| *entry.value())
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn add_identity(&self, identity: &str) -> StoreResult<()> {
        match self.identities.entry(identity.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Constraint(format!(
                "identity {identity} already exists"
            ))),
            Entry::Vacant(vacant) => {
                vacant.insert(IdentityEntry {
                    created: self.next_identity.fetch_add(1, Ordering::Relaxed),
                    claims: Vec::new(),
                });
                Ok(())
            }
        }
    }

    async fn identity_exists(&self, identity: &str) -> StoreResult<bool> {
        Ok(self.identities.contains_key(identity))
    }

    async fn get_claims(&self, identity: &str) -> StoreResult<Vec<Claim>> {
        Ok(self
            .identities
            .get(identity)
            .map(|entry| entry.claims.clone())
            .unwrap_or_default())
    }

    async fn put_claim(&self, identity: &str, claim: &Claim) -> StoreResult<()> {
        let mut entry = self
            .identities
            .get_mut(identity)
            .ok_or_else(|| StoreError::NotFound(format!("identity {identity}")))?;
        entry.claims.retain(|c| !c.name.eq_ignore_ascii_case(&claim.name));
        entry.claims.push(claim.clone());
        Ok(())
    }

    async fn delete_claim(&self, identity: &str, name: &str) -> StoreResult<bool> {
        let Some(mut entry) = self.identities.get_mut(identity) else {
            return Ok(false);
        };
        let before = entry.claims.len();
        entry.claims.retain(|c| !c.name.eq_ignore_ascii_case(name));
        Ok(entry.claims.len() != before)
    }

    async fn search_claims(&self, text: &str) -> StoreResult<Vec<String>> {
        let needle = text.to_lowercase();
        let mut matches: Vec<(u64, String)> = self
            .identities
            .iter()
            .filter(|entry| {
                entry
                    .claims
                    .iter()
                    .any(|c| c.value.to_lowercase().contains(&needle))
            })
            .map(|entry| (entry.created, entry.key().clone()))
            .collect();
        matches.sort();
        Ok(matches.into_iter().map(|(_, identity)| identity).collect())
    }

    async fn add_credential(&self, credential: NewCredential) -> StoreResult<CredentialRecord> {
        let id = match self.usernames.entry(credential.username.to_lowercase()) {
            Entry::Occupied(_) => {
                return Err(StoreError::Constraint(format!(
                    "username {} already exists",
                    credential.username
                )))
            }
            Entry::Vacant(vacant) => {
                let id = self.allocate_id();
                vacant.insert(id);
                id
            }
        };

        let record = CredentialRecord {
            id,
            identity: credential.identity,
            username: credential.username,
            purposes: credential.purposes,
            hash_version: credential.hash_version,
            salt: credential.salt,
            hash: credential.hash,
            fail_count: 0,
            locked_until: None,
        };
        self.credentials.insert(id, record.clone());
        Ok(record)
    }

    async fn get_credential_by_username(&self, username: &str) -> StoreResult<Option<CredentialRecord>> {
        Ok(self
            .credential_id(username)
            .and_then(|id| self.credentials.get(&id).map(|r| r.clone())))
    }

    async fn get_credential(&self, id: i64) -> StoreResult<Option<CredentialRecord>> {
        Ok(self.credentials.get(&id).map(|r| r.clone()))
    }

    async fn get_identity_credentials(&self, identity: &str) -> StoreResult<Vec<CredentialRecord>> {
        let mut records: Vec<CredentialRecord> = self
            .credentials
            .iter()
            .filter(|r| r.identity == identity)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }

    async fn update_password(
        &self,
        username: &str,
        hash_version: u32,
        salt: &[u8],
        hash: &[u8],
    ) -> StoreResult<bool> {
        let Some(id) = self.credential_id(username) else {
            return Ok(false);
        };
        let Some(mut record) = self.credentials.get_mut(&id) else {
            return Ok(false);
        };
        record.hash_version = hash_version;
        record.salt = salt.to_vec();
        record.hash = hash.to_vec();
        Ok(true)
    }

    async fn delete_credential(&self, username: &str) -> StoreResult<bool> {
        let Some((_, id)) = self.usernames.remove(&username.to_lowercase()) else {
            return Ok(false);
        };
        Ok(self.credentials.remove(&id).is_some())
    }

    async fn replace_credentials(&self, credential: NewCredential) -> StoreResult<(CredentialRecord, u64)> {
        let doomed: Vec<(i64, String)> = self
            .credentials
            .iter()
            .filter(|r| r.identity == credential.identity)
            .map(|r| (r.id, r.username.to_lowercase()))
            .collect();

        if let Some(owner) = self.credential_id(&credential.username) {
            if !doomed.iter().any(|(id, _)| *id == owner) {
                return Err(StoreError::Constraint(format!(
                    "username {} already exists",
                    credential.username
                )));
            }
        }

        for (id, username) in &doomed {
            self.credentials.remove(id);
            self.usernames.remove(username);
        }
        let record = self.add_credential(credential).await?;
        Ok((record, doomed.len() as u64))
    }

    async fn increment_fail_count(&self, credential_id: i64) -> StoreResult<u32> {
        let mut record = self
            .credentials
            .get_mut(&credential_id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {credential_id}")))?;
        record.fail_count = record.fail_count.saturating_add(1);
        Ok(record.fail_count)
    }

    async fn lock(&self, username: &str, until: DateTime<Utc>) -> StoreResult<()> {
        let id = self
            .credential_id(username)
            .ok_or_else(|| StoreError::NotFound(format!("username {username}")))?;
        if let Some(mut record) = self.credentials.get_mut(&id) {
            record.locked_until = Some(until);
        }
        Ok(())
    }

    async fn unlock(&self, username: &str) -> StoreResult<()> {
        let id = self
            .credential_id(username)
            .ok_or_else(|| StoreError::NotFound(format!("username {username}")))?;
        if let Some(mut record) = self.credentials.get_mut(&id) {
            record.locked_until = None;
            record.fail_count = 0;
        }
        Ok(())
    }

    async fn record_success(&self, record: AuthenticationRecord) -> StoreResult<()> {
        if let (AuthenticationMethod::Credentials, Some(id)) = (record.method, record.method_id) {
            if let Some(mut credential) = self.credentials.get_mut(&id) {
                credential.fail_count = 0;
            }
        }
        self.authentications
            .insert(record.remember_me_token.clone(), record);
        Ok(())
    }

    async fn get_authentication(&self, remember_me_token: &str) -> StoreResult<Option<AuthenticationRecord>> {
        Ok(self
            .authentications
            .get(remember_me_token)
            .map(|r| r.clone()))
    }

    async fn add_shared_secret(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
        purposes: &[String],
    ) -> StoreResult<SharedSecretRecord> {
        match self.shared_secrets.entry(secret.to_string()) {
            Entry::Occupied(_) => Err(StoreError::Constraint("shared secret collision".into())),
            Entry::Vacant(vacant) => {
                let record = SharedSecretRecord {
                    id: self.allocate_id(),
                    identity: identity.to_string(),
                    name: name.to_string(),
                    secret: secret.to_string(),
                    purposes: purposes.to_vec(),
                };
                vacant.insert(record.clone());
                Ok(record)
            }
        }
    }

    async fn get_shared_secret(&self, secret: &str) -> StoreResult<Option<SharedSecretRecord>> {
        Ok(self.shared_secrets.get(secret).map(|r| r.clone()))
    }

    async fn delete_shared_secret(&self, secret: &str) -> StoreResult<bool> {
        Ok(self.shared_secrets.remove(secret).is_some())
    }

    async fn get_identity_shared_secrets(&self, identity: &str) -> StoreResult<Vec<SharedSecretRecord>> {
        let mut records: Vec<SharedSecretRecord> = self
            .shared_secrets
            .iter()
            .filter(|r| r.identity == identity)
            .map(|r| r.clone())
            .collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}
