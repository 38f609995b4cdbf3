//! Token store facade

use std::sync::Arc;

use credgate_common::ids::short_id;
use credgate_common::SharedClock;
use tracing::{debug, info, warn};

use crate::error::{Result, StoreResultExt};
use crate::factory::{HydratedToken, TokenFactory};
use crate::store::{TokenDatabase, TokenRecord};
use crate::token_type::{TokenStoreConfig, TokenTypeConfig, TokenTypeRegistry};
use crate::types::{TokenResponse, TokenStatus};
use crate::validator::{CheckRequest, Validity};

/// Attempts at a check whose state write keeps losing to concurrent checks
const MAX_CHECK_ATTEMPTS: usize = 3;

/// Attempts at finding an unused token string
const MAX_CREATE_ATTEMPTS: usize = 3;

/// Records read per batch by [`TokenStore::clean`]
const CLEAN_BATCH_SIZE: u32 = 200;

/// Issues tokens and checks them against the rules of their type.
///
/// Each check reads the token record, rebuilds its validators from the
/// current token type configuration, runs them and writes back any state
/// they changed. The write is a compare-and-swap on the record version;
/// a check that loses the race starts again from a fresh read.
#[derive(Clone)]
pub struct TokenStore {
    database: Arc<dyn TokenDatabase>,
    factory: TokenFactory,
    registry: Arc<TokenTypeRegistry>,
    clock: SharedClock,
}

impl TokenStore {
    pub fn new(config: &TokenStoreConfig, database: Arc<dyn TokenDatabase>, clock: SharedClock) -> Result<Self> {
        let registry = Arc::new(TokenTypeRegistry::from_config(&config.token_types)?);
        info!(token_types = ?registry.names(), "Token store ready");
        Ok(Self {
            database,
            factory: TokenFactory::new(registry.clone(), clock.clone()),
            registry,
            clock,
        })
    }

    /// Replace the configured token types. Issued tokens pick up the new
    /// limits at their next check. On error the running types are kept.
    pub fn apply(&self, token_types: &[TokenTypeConfig]) -> Result<()> {
        self.registry.apply(token_types)
    }

    /// Names of the configured token types
    pub fn token_types(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Issue a token. Returns `None` when `token_type` is not configured.
    pub async fn create_token(
        &self,
        token_type: &str,
        purposes: &[String],
        identity: Option<&str>,
    ) -> Result<Option<String>> {
        let Some(chain) = self.factory.create(token_type, identity, purposes) else {
            warn!(token_type = %token_type, "Token requested for unconfigured type");
            return Ok(None);
        };
        let state = chain.to_document(None)?.to_json()?;

        let mut attempt = 1;
        loop {
            let token = short_id(false);
            match self.database.add_token(&token, chain.token_type(), &state).await {
                Ok(_) => {
                    debug!(token_type = %chain.token_type(), rules = chain.len(), "Token created");
                    return Ok(Some(token));
                }
                Err(e) if e.is_constraint() && attempt < MAX_CREATE_ATTEMPTS => {
                    debug!(attempt, "Token string collision, generating another");
                    attempt += 1;
                }
                Err(e) => return Err(e).during("add token"),
            }
        }
    }

    /// Check a token for one use.
    ///
    /// `Unsupported` when `token_type` is not configured, `Invalid` when the
    /// token does not exist, belongs to another type or has been used up.
    /// A token that can never pass again is deleted by the check that finds it.
    pub async fn get_token(
        &self,
        token_type: &str,
        token: &str,
        purpose: Option<&str>,
        identity: Option<&str>,
    ) -> Result<TokenResponse> {
        let respond = |status| TokenResponse::new(token, identity, purpose, status);

        let Some(requested) = self.registry.get(token_type) else {
            debug!(token_type = %token_type, "Check against unconfigured token type");
            return Ok(respond(TokenStatus::Unsupported));
        };
        let key = token.trim().to_lowercase();

        for attempt in 1..=MAX_CHECK_ATTEMPTS {
            let Some(record) = self.database.get_token(&key).await.during("get token")? else {
                debug!(token_type = %requested.name(), "Token not found");
                return Ok(respond(TokenStatus::Invalid));
            };
            if !record.token_type.eq_ignore_ascii_case(requested.name()) {
                debug!(
                    token_type = %requested.name(),
                    actual = %record.token_type,
                    "Token presented as the wrong type"
                );
                return Ok(respond(TokenStatus::Invalid));
            }

            let hydrated = match self.factory.hydrate(&record.token_type, &record.state) {
                Ok(Some(hydrated)) => hydrated,
                Ok(None) => return Ok(respond(TokenStatus::Unsupported)),
                Err(e) => {
                    warn!(token_type = %record.token_type, id = record.id, error = %e, "Unreadable token state");
                    return Ok(respond(TokenStatus::Invalid));
                }
            };

            match self.check(&record, hydrated, identity, purpose).await? {
                Some(status) => return Ok(respond(status)),
                None => debug!(attempt, id = record.id, "Token state changed concurrently, retrying check"),
            }
        }

        warn!(token_type = %requested.name(), "Token check abandoned after repeated write conflicts");
        Ok(respond(TokenStatus::NotAllowed))
    }

    /// One read-check-write cycle. `None` when the state write lost a race.
    async fn check(
        &self,
        record: &TokenRecord,
        hydrated: HydratedToken,
        identity: Option<&str>,
        purpose: Option<&str>,
    ) -> Result<Option<TokenStatus>> {
        let HydratedToken { document, chain, .. } = hydrated;
        let outcome = chain.check(&CheckRequest::new(identity, purpose, self.clock.now()));

        if outcome.validity == Validity::PermanentInvalid {
            self.database
                .delete_token_by_id(record.id)
                .await
                .during("delete token")?;
            info!(token_type = %record.token_type, id = record.id, "Token can no longer be used, deleted");
            return Ok(Some(TokenStatus::Invalid));
        }

        if outcome.modified {
            let state = chain.to_document(Some(document))?.to_json()?;
            let written = self
                .database
                .update_token(record.id, record.version, &state)
                .await
                .during("update token")?;
            if !written {
                return Ok(None);
            }
        }

        Ok(Some(outcome.validity.into()))
    }

    pub async fn delete_token(&self, token: &str) -> Result<bool> {
        let deleted = self
            .database
            .delete_token(&token.trim().to_lowercase())
            .await
            .during("delete token")?;
        if deleted {
            debug!("Token deleted");
        }
        Ok(deleted)
    }

    /// Delete every token that can never pass a check again: expired or used
    /// up, of a type that is no longer configured, or with unreadable state.
    /// Returns the number of deleted tokens.
    pub async fn clean(&self) -> Result<u64> {
        let now = self.clock.now();
        let mut after_id = 0;
        let mut deleted = 0;

        loop {
            let batch = self
                .database
                .list_tokens(after_id, CLEAN_BATCH_SIZE)
                .await
                .during("list tokens")?;
            let Some(last) = batch.last() else {
                break;
            };
            after_id = last.id;

            for record in &batch {
                let reason = match self.factory.hydrate(&record.token_type, &record.state) {
                    Ok(Some(hydrated)) if hydrated.chain.is_expired(now) => "expired",
                    Ok(Some(_)) => continue,
                    Ok(None) => "unconfigured type",
                    Err(_) => "malformed state",
                };
                if self
                    .database
                    .delete_token_by_id(record.id)
                    .await
                    .during("delete token")?
                {
                    debug!(token_type = %record.token_type, id = record.id, reason, "Token collected");
                    deleted += 1;
                }
            }
        }

        info!(deleted, "Token clean finished");
        Ok(deleted)
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("factory", &self.factory)
            .finish_non_exhaustive()
    }
}
