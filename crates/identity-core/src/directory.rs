//! Identity creation, claims and search

use std::sync::Arc;

use credgate_common::ids::short_id;
use tracing::info;

use crate::error::{IdentityError, Result, StoreResultExt};
use crate::service::IdentityContext;
use crate::types::{Claim, IdentitySearchResult, MatchingIdentity};

/// Largest page returned by [`IdentityDirectory::search`]
pub const MAX_SEARCH_RESULTS: usize = 50;

#[derive(Clone)]
pub struct IdentityDirectory {
    ctx: Arc<IdentityContext>,
}

impl IdentityDirectory {
    pub(crate) fn new(ctx: Arc<IdentityContext>) -> Self {
        Self { ctx }
    }

    /// Mint and store a new identity URN
    pub async fn create_identity(&self) -> Result<String> {
        let settings = self.ctx.settings.current();
        let identity = format!(
            "urn:{}:{}",
            settings.config.identity_urn_namespace,
            short_id(settings.config.mixed_case_identity)
        );

        self.ctx
            .store
            .add_identity(&identity)
            .await
            .during("add_identity")?;

        info!(identity = %identity, reason = "Create identity", "Identity created");
        Ok(identity)
    }

    pub async fn get_claims(&self, identity: &str) -> Result<Vec<Claim>> {
        self.ctx.store.get_claims(identity).await.during("get_claims")
    }

    /// Add a claim, replacing any claim with the same name
    pub async fn update_claim(&self, identity: &str, claim: Claim) -> Result<()> {
        let store = &self.ctx.store;
        if !store.identity_exists(identity).await.during("identity_exists")? {
            return Err(IdentityError::UnknownIdentity(identity.to_string()));
        }
        store.put_claim(identity, &claim).await.during("put_claim")?;
        info!(who = %identity, claim = %claim.name, reason = "Update claim", "Claim updated");
        Ok(())
    }

    pub async fn delete_claim(&self, identity: &str, name: &str) -> Result<bool> {
        let deleted = self
            .ctx
            .store
            .delete_claim(identity, name)
            .await
            .during("delete_claim")?;
        if deleted {
            info!(who = %identity, claim = %name, reason = "Delete claim", "Claim deleted");
        }
        Ok(deleted)
    }

    /// Identities having a claim value that contains `text`.
    ///
    /// The pager token is the offset of the page; pass the returned token to
    /// continue. Page size is clamped to `1..=50`.
    pub async fn search(
        &self,
        text: &str,
        pager_token: Option<&str>,
        max_results: usize,
    ) -> Result<IdentitySearchResult> {
        let skip = pager_token
            .and_then(|token| token.trim().parse::<usize>().ok())
            .unwrap_or(0);
        let take = max_results.clamp(1, MAX_SEARCH_RESULTS);

        let store = &self.ctx.store;
        let matches = store.search_claims(text).await.during("search_claims")?;

        let mut identities = Vec::new();
        for identity in matches.into_iter().skip(skip).take(take) {
            let claims = store.get_claims(&identity).await.during("get_claims")?;
            identities.push(MatchingIdentity { identity, claims });
        }

        Ok(IdentitySearchResult {
            pager_token: (skip + take).to_string(),
            identities,
        })
    }
}
