//! Identity service facade

use std::sync::Arc;

use credgate_common::{Reloadable, SharedClock};
use tracing::info;

use crate::authenticator::CredentialAuthenticator;
use crate::config::{IdentityConfig, IdentitySettings};
use crate::directory::IdentityDirectory;
use crate::error::Result;
use crate::hashing::HashSchemeRegistry;
use crate::shared_secrets::SharedSecrets;
use crate::store::IdentityStore;

/// State shared by the identity components
pub(crate) struct IdentityContext {
    pub(crate) store: Arc<dyn IdentityStore>,
    pub(crate) settings: Reloadable<IdentitySettings>,
    pub(crate) hashing: Arc<HashSchemeRegistry>,
    pub(crate) clock: SharedClock,
}

/// Directory, credentials and shared secrets over one store
#[derive(Clone)]
pub struct IdentityService {
    ctx: Arc<IdentityContext>,
    directory: IdentityDirectory,
    credentials: CredentialAuthenticator,
    shared_secrets: SharedSecrets,
}

impl IdentityService {
    /// Build a service with the default hash schemes.
    ///
    /// Argon2 cost is read once here; later reconfiguration leaves existing
    /// hash schemes untouched so stored hashes keep verifying.
    pub fn new(config: IdentityConfig, store: Arc<dyn IdentityStore>, clock: SharedClock) -> Result<Self> {
        let hashing = Arc::new(HashSchemeRegistry::with_default_schemes(&config.password)?);
        Self::with_hashing(config, store, clock, hashing)
    }

    pub fn with_hashing(
        config: IdentityConfig,
        store: Arc<dyn IdentityStore>,
        clock: SharedClock,
        hashing: Arc<HashSchemeRegistry>,
    ) -> Result<Self> {
        let settings = IdentitySettings::compile(config)?;
        let ctx = Arc::new(IdentityContext {
            store,
            settings: Reloadable::new(settings),
            hashing,
            clock,
        });

        Ok(Self {
            directory: IdentityDirectory::new(ctx.clone()),
            credentials: CredentialAuthenticator::new(ctx.clone()),
            shared_secrets: SharedSecrets::new(ctx.clone()),
            ctx,
        })
    }

    pub fn directory(&self) -> &IdentityDirectory {
        &self.directory
    }

    pub fn credentials(&self) -> &CredentialAuthenticator {
        &self.credentials
    }

    pub fn shared_secrets(&self) -> &SharedSecrets {
        &self.shared_secrets
    }

    pub fn hashing(&self) -> &HashSchemeRegistry {
        &self.ctx.hashing
    }

    /// Current configuration snapshot
    pub fn config(&self) -> IdentityConfig {
        self.ctx.settings.current().config.clone()
    }

    /// Swap in a new policy, lockout and remember-me configuration.
    ///
    /// The new configuration is validated first; on error the running
    /// configuration is kept.
    pub fn reconfigure(&self, config: IdentityConfig) -> Result<()> {
        let settings = IdentitySettings::compile(config)?;
        self.ctx.settings.replace(settings);
        info!("Identity configuration reloaded");
        Ok(())
    }
}
