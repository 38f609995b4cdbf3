//! Named shared secrets that authenticate an identity without a password

use std::sync::Arc;

use credgate_common::ids::short_id;
use tracing::{debug, info};

use crate::error::{IdentityError, Result, StoreResultExt};
use crate::policy::check_purposes;
use crate::service::IdentityContext;
use crate::types::{
    AuthenticationMethod, AuthenticationRecord, AuthenticationResult, AuthenticationStatus,
    SharedSecret, SharedSecretRecord,
};

#[derive(Clone)]
pub struct SharedSecrets {
    ctx: Arc<IdentityContext>,
}

impl SharedSecrets {
    pub(crate) fn new(ctx: Arc<IdentityContext>) -> Self {
        Self { ctx }
    }

    /// Generate a secret for the identity and return it
    pub async fn add_shared_secret(
        &self,
        identity: &str,
        name: &str,
        purposes: &[String],
    ) -> Result<String> {
        check_purposes(purposes)?;

        let store = &self.ctx.store;
        if !store.identity_exists(identity).await.during("identity_exists")? {
            return Err(IdentityError::UnknownIdentity(identity.to_string()));
        }

        let settings = self.ctx.settings.current();
        let secret = short_id(settings.config.mixed_case_shared_secret);
        store
            .add_shared_secret(identity, name, &secret, purposes)
            .await
            .during("add_shared_secret")?;

        info!(who = %identity, name = %name, reason = "Add shared secret", "Shared secret added");
        Ok(secret)
    }

    pub async fn authenticate_with_shared_secret(&self, secret: &str) -> Result<AuthenticationResult> {
        let store = &self.ctx.store;
        let Some(record) = store
            .get_shared_secret(secret)
            .await
            .during("get_shared_secret")?
        else {
            debug!("Authentication failed: unknown shared secret");
            return Ok(AuthenticationResult::with_status(AuthenticationStatus::NotFound));
        };

        let settings = self.ctx.settings.current();
        let now = self.ctx.clock.now();
        let token = short_id(settings.config.mixed_case_tokens);

        store
            .record_success(AuthenticationRecord {
                remember_me_token: token.clone(),
                identity: record.identity.clone(),
                purposes: record.purposes.clone(),
                method: AuthenticationMethod::SharedSecret,
                method_id: Some(record.id),
                when: now,
                expires: Some(settings.config.remember_me_expiry(now)),
            })
            .await
            .during("record_success")?;

        info!(identity = %record.identity, name = %record.name, "Authenticated with shared secret");
        Ok(AuthenticationResult {
            identity: Some(record.identity),
            purposes: record.purposes,
            status: AuthenticationStatus::Authenticated,
            remember_me_token: Some(token),
        })
    }

    pub async fn delete_shared_secret(&self, secret: &str) -> Result<bool> {
        let deleted = self
            .ctx
            .store
            .delete_shared_secret(secret)
            .await
            .during("delete_shared_secret")?;
        if deleted {
            info!(reason = "Delete shared secret", "Shared secret deleted");
        }
        Ok(deleted)
    }

    pub async fn get_all_shared_secrets(&self, identity: &str) -> Result<Vec<SharedSecret>> {
        let records = self
            .ctx
            .store
            .get_identity_shared_secrets(identity)
            .await
            .during("get_identity_shared_secrets")?;
        Ok(records.iter().map(SharedSecretRecord::to_shared_secret).collect())
    }
}
