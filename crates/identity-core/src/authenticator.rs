//! Username/password authentication with lockout and remember-me tokens

use std::sync::Arc;

use credgate_common::ids::short_id;
use tracing::{debug, info, warn};

use crate::error::{IdentityError, Result, StoreResultExt};
use crate::hashing::SALT_LEN;
use crate::policy::{check_purposes, PasswordCheck};
use crate::service::IdentityContext;
use crate::types::{
    claim_names, AuthenticationMethod, AuthenticationRecord, AuthenticationResult,
    AuthenticationStatus, Claim, ClaimStatus, Credential, CredentialRecord, NewCredential,
};

/// Validates passwords, enforces lockout and manages credentials
#[derive(Clone)]
pub struct CredentialAuthenticator {
    ctx: Arc<IdentityContext>,
}

impl CredentialAuthenticator {
    pub(crate) fn new(ctx: Arc<IdentityContext>) -> Self {
        Self { ctx }
    }

    /// Check a username and password.
    ///
    /// A locked credential stays `Locked` without its password being checked
    /// until the lock expires. Wrong passwords count towards the lockout
    /// threshold; a successful login resets the count and issues a
    /// remember-me token.
    pub async fn authenticate_with_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticationResult> {
        let settings = self.ctx.settings.current();
        let store = &self.ctx.store;
        let now = self.ctx.clock.now();

        let Some(credential) = store
            .get_credential_by_username(username)
            .await
            .during("get_credential_by_username")?
        else {
            self.equalize_timing(password);
            debug!(username = %username, "Authentication failed: no such username");
            return Ok(AuthenticationResult::with_status(AuthenticationStatus::NotFound));
        };

        let mut result = AuthenticationResult {
            identity: Some(credential.identity.clone()),
            purposes: credential.purposes.clone(),
            status: AuthenticationStatus::Authenticated,
            remember_me_token: None,
        };

        if let Some(locked_until) = credential.locked_until {
            if now < locked_until {
                debug!(username = %credential.username, %locked_until, "Authentication refused: credential locked");
                result.status = AuthenticationStatus::Locked;
                return Ok(result);
            }
            store.unlock(&credential.username).await.during("unlock")?;
            info!(username = %credential.username, who = %credential.identity, reason = "Lock expired", "Credential unlocked");
        }

        let verified = match self.ctx.hashing.verify(
            password,
            credential.hash_version,
            &credential.salt,
            &credential.hash,
        ) {
            Ok(verified) => verified,
            Err(IdentityError::UnsupportedHashVersion(version)) => {
                warn!(username = %credential.username, version, "Credential hashed with an unsupported scheme");
                result.status = AuthenticationStatus::Unsupported;
                return Ok(result);
            }
            Err(e) => return Err(e),
        };

        if !verified {
            result.status = AuthenticationStatus::InvalidCredentials;
            self.record_failure(&credential).await?;
            return Ok(result);
        }

        let token = short_id(settings.config.mixed_case_tokens);
        store
            .record_success(AuthenticationRecord {
                remember_me_token: token.clone(),
                identity: credential.identity.clone(),
                purposes: credential.purposes.clone(),
                method: AuthenticationMethod::Credentials,
                method_id: Some(credential.id),
                when: now,
                expires: Some(settings.config.remember_me_expiry(now)),
            })
            .await
            .during("record_success")?;

        info!(identity = %credential.identity, username = %credential.username, "Authenticated with credentials");
        result.remember_me_token = Some(token);
        Ok(result)
    }

    async fn record_failure(&self, credential: &CredentialRecord) -> Result<()> {
        let settings = self.ctx.settings.current();
        let lockout = &settings.config.lockout;

        let fail_count = self
            .ctx
            .store
            .increment_fail_count(credential.id)
            .await
            .during("increment_fail_count")?;
        debug!(username = %credential.username, fail_count, "Wrong password");

        if lockout.failed_logins_to_lock > 0 && fail_count >= lockout.failed_logins_to_lock {
            let until = lockout.locked_until(self.ctx.clock.now());
            self.ctx
                .store
                .lock(&credential.username, until)
                .await
                .during("lock")?;
            warn!(
                username = %credential.username,
                fail_count,
                locked_until = %until,
                "Credential locked after repeated failed logins"
            );
        }
        Ok(())
    }

    /// Burn roughly the same CPU as a real check so unknown usernames are not
    /// distinguishable by response time
    fn equalize_timing(&self, password: &str) {
        let _ = self.ctx.hashing.compute(password, Some(&[0u8; SALT_LEN][..]));
    }

    /// Exchange a remember-me token for the identity that earned it
    pub async fn remember_me(&self, remember_me_token: &str) -> Result<AuthenticationResult> {
        let Some(record) = self
            .ctx
            .store
            .get_authentication(remember_me_token)
            .await
            .during("get_authentication")?
        else {
            return Ok(AuthenticationResult::with_status(AuthenticationStatus::NotFound));
        };

        let now = self.ctx.clock.now();
        let expired = record.expires.is_some_and(|expires| now > expires);
        Ok(AuthenticationResult {
            identity: Some(record.identity),
            purposes: record.purposes,
            status: if expired {
                AuthenticationStatus::Expired
            } else {
                AuthenticationStatus::Authenticated
            },
            remember_me_token: Some(record.remember_me_token),
        })
    }

    /// Bind a username and password to an existing identity.
    ///
    /// With `replace_existing` every other credential of the identity is
    /// removed in the same store operation, so a failed add keeps them.
    pub async fn add_credentials(
        &self,
        identity: &str,
        username: &str,
        password: &str,
        replace_existing: bool,
        purposes: &[String],
    ) -> Result<Credential> {
        let settings = self.ctx.settings.current();
        settings.policy.check_username(username)?;
        settings.policy.validate_password(password)?;
        check_purposes(purposes)?;

        let hashed = self.ctx.hashing.compute(password, None)?;
        let store = &self.ctx.store;

        if !store.identity_exists(identity).await.during("identity_exists")? {
            return Err(IdentityError::UnknownIdentity(identity.to_string()));
        }

        if let Some(existing) = store
            .get_credential_by_username(username)
            .await
            .during("get_credential_by_username")?
        {
            if existing.identity != identity || !replace_existing {
                return Err(IdentityError::UsernameUnavailable(username.to_string()));
            }
        }

        let credential = NewCredential {
            identity: identity.to_string(),
            username: username.to_string(),
            purposes: purposes.to_vec(),
            hash_version: hashed.version,
            salt: hashed.salt,
            hash: hashed.hash,
        };
        let added = if replace_existing {
            store.replace_credentials(credential).await.map(|(record, removed)| {
                if removed > 0 {
                    info!(who = %identity, removed, reason = "Replace credentials", "Deleted existing credentials");
                }
                record
            })
        } else {
            store.add_credential(credential).await
        };
        let record = added.map_err(|e| {
            if e.is_constraint() {
                IdentityError::UsernameUnavailable(username.to_string())
            } else {
                IdentityError::store("add_credential", e)
            }
        })?;

        store
            .put_claim(
                identity,
                &Claim::new(claim_names::USERNAME, username, ClaimStatus::Verified),
            )
            .await
            .during("put_claim")?;

        info!(who = %identity, username = %username, reason = "Add credentials", "Credentials added");
        Ok(record.to_credential())
    }

    /// Re-hash the password of a resolved credential with the latest scheme
    pub async fn change_password(&self, credential: &Credential, new_password: &str) -> Result<bool> {
        let settings = self.ctx.settings.current();
        settings.policy.validate_password(new_password)?;

        let hashed = self.ctx.hashing.compute(new_password, None)?;
        let changed = self
            .ctx
            .store
            .update_password(&credential.username, hashed.version, &hashed.salt, &hashed.hash)
            .await
            .during("update_password")?;

        if changed {
            info!(who = %credential.identity, username = %credential.username, reason = "Change password", "Password changed");
        }
        Ok(changed)
    }

    /// Remove a credential along with its username claim
    pub async fn delete_credential(&self, credential: &Credential) -> Result<bool> {
        let store = &self.ctx.store;
        let deleted = store
            .delete_credential(&credential.username)
            .await
            .during("delete_credential")?;

        if deleted {
            store
                .delete_claim(&credential.identity, claim_names::USERNAME)
                .await
                .during("delete_claim")?;
            info!(who = %credential.identity, username = %credential.username, reason = "Delete credentials", "Credential deleted");
        }
        Ok(deleted)
    }

    pub async fn get_credentials(&self, identity: &str) -> Result<Vec<Credential>> {
        let records = self
            .ctx
            .store
            .get_identity_credentials(identity)
            .await
            .during("get_identity_credentials")?;
        Ok(records.iter().map(CredentialRecord::to_credential).collect())
    }

    pub async fn get_username_credential(&self, username: &str) -> Result<Option<Credential>> {
        let record = self
            .ctx
            .store
            .get_credential_by_username(username)
            .await
            .during("get_credential_by_username")?;
        Ok(record.as_ref().map(CredentialRecord::to_credential))
    }

    /// The credential a remember-me token was issued for, if it was a password login
    pub async fn get_remember_me_credential(&self, remember_me_token: &str) -> Result<Option<Credential>> {
        let store = &self.ctx.store;
        let Some(record) = store
            .get_authentication(remember_me_token)
            .await
            .during("get_authentication")?
        else {
            return Ok(None);
        };

        let (AuthenticationMethod::Credentials, Some(id)) = (record.method, record.method_id) else {
            return Ok(None);
        };

        let credential = store.get_credential(id).await.during("get_credential")?;
        Ok(credential.as_ref().map(CredentialRecord::to_credential))
    }

    pub fn check_password_allowed(&self, password: &str) -> PasswordCheck {
        self.ctx.settings.current().policy.check_password(password)
    }
}
