//! Versioned password hashing.
//!
//! Each stored credential records the version of the scheme that produced its
//! hash. New hashes always use the highest registered version, while older
//! credentials keep verifying against the scheme they were created with.

use std::collections::BTreeMap;
use std::sync::Arc;

use argon2::{Algorithm, Argon2, Params, Version};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::config::PasswordConfig;
use crate::error::{IdentityError, Result};

/// Width of generated salts in bytes
pub const SALT_LEN: usize = 16;

/// Version number of the SHA-256 scheme
pub const SHA256_VERSION: u32 = 1;

/// Version number of the Argon2id scheme
pub const ARGON2ID_VERSION: u32 = 2;

/// A password hashing algorithm
pub trait HashScheme: Send + Sync {
    fn name(&self) -> &'static str;

    /// Deterministic for a given password and salt
    fn compute(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>>;
}

/// SHA-256 over `salt || password`
#[derive(Debug, Default)]
pub struct Sha256Scheme;

impl HashScheme for Sha256Scheme {
    fn name(&self) -> &'static str {
        "sha256"
    }

    fn compute(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>> {
        let mut hasher = Sha256::new();
        hasher.update(salt);
        hasher.update(password.as_bytes());
        Ok(hasher.finalize().to_vec())
    }
}

/// Argon2id producing a raw 32 byte output
pub struct Argon2Scheme {
    params: Params,
}

impl Argon2Scheme {
    pub const OUTPUT_LEN: usize = 32;

    pub fn new(memory_cost: u32, time_cost: u32, parallelism: u32) -> Result<Self> {
        let params = Params::new(memory_cost, time_cost, parallelism, Some(Self::OUTPUT_LEN))
            .map_err(|e| IdentityError::Config(format!("invalid argon2 parameters: {e}")))?;
        Ok(Self { params })
    }

    pub fn from_config(config: &PasswordConfig) -> Result<Self> {
        Self::new(
            config.argon2_memory_cost,
            config.argon2_time_cost,
            config.argon2_parallelism,
        )
    }
}

impl HashScheme for Argon2Scheme {
    fn name(&self) -> &'static str {
        "argon2id"
    }

    fn compute(&self, password: &str, salt: &[u8]) -> Result<Vec<u8>> {
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let mut output = vec![0u8; Self::OUTPUT_LEN];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut output)
            .map_err(|e| IdentityError::Hashing(e.to_string()))?;
        Ok(output)
    }
}

/// Output of [`HashSchemeRegistry::compute`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordHash {
    pub version: u32,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

/// Maps hash versions to schemes
pub struct HashSchemeRegistry {
    schemes: RwLock<BTreeMap<u32, Arc<dyn HashScheme>>>,
}

impl HashSchemeRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            schemes: RwLock::new(BTreeMap::new()),
        }
    }

    /// SHA-256 as version 1 and Argon2id, with the configured cost, as version 2
    pub fn with_default_schemes(config: &PasswordConfig) -> Result<Self> {
        let registry = Self::new();
        registry.register(SHA256_VERSION, Arc::new(Sha256Scheme));
        registry.register(ARGON2ID_VERSION, Arc::new(Argon2Scheme::from_config(config)?));
        Ok(registry)
    }

    /// Add or replace the scheme for a version
    pub fn register(&self, version: u32, scheme: Arc<dyn HashScheme>) {
        tracing::debug!(version, scheme = scheme.name(), "Registered password hash scheme");
        self.schemes.write().insert(version, scheme);
    }

    pub fn get(&self, version: u32) -> Result<Arc<dyn HashScheme>> {
        self.schemes
            .read()
            .get(&version)
            .cloned()
            .ok_or(IdentityError::UnsupportedHashVersion(version))
    }

    /// Highest registered version, used for every new hash
    pub fn latest_version(&self) -> Option<u32> {
        self.schemes.read().keys().next_back().copied()
    }

    /// Hash with the latest scheme, generating a fresh salt when none is given
    pub fn compute(&self, password: &str, salt: Option<&[u8]>) -> Result<PasswordHash> {
        let version = self
            .latest_version()
            .ok_or_else(|| IdentityError::Config("no password hash schemes registered".into()))?;
        self.compute_with_version(version, password, salt)
    }

    pub fn compute_with_version(
        &self,
        version: u32,
        password: &str,
        salt: Option<&[u8]>,
    ) -> Result<PasswordHash> {
        let scheme = self.get(version)?;
        let salt = match salt {
            Some(salt) => salt.to_vec(),
            None => credgate_common::ids::random_bytes::<SALT_LEN>().to_vec(),
        };
        let hash = scheme.compute(password, &salt)?;
        Ok(PasswordHash {
            version,
            salt,
            hash,
        })
    }

    /// Constant time comparison against a stored hash
    pub fn verify(&self, password: &str, version: u32, salt: &[u8], expected: &[u8]) -> Result<bool> {
        let scheme = self.get(version)?;
        let actual = scheme.compute(password, salt)?;
        Ok(bool::from(actual.as_slice().ct_eq(expected)))
    }
}

impl Default for HashSchemeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for HashSchemeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let schemes = self.schemes.read();
        f.debug_map()
            .entries(schemes.iter().map(|(version, scheme)| (version, scheme.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cheap_config() -> PasswordConfig {
        PasswordConfig {
            argon2_memory_cost: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..PasswordConfig::default()
        }
    }

    #[test]
    fn latest_version_wins() {
        let registry = HashSchemeRegistry::with_default_schemes(&cheap_config()).unwrap();
        assert_eq!(registry.latest_version(), Some(ARGON2ID_VERSION));

        let hashed = registry.compute("correct horse", None).unwrap();
        assert_eq!(hashed.version, ARGON2ID_VERSION);
        assert_eq!(hashed.salt.len(), SALT_LEN);
        assert_eq!(hashed.hash.len(), Argon2Scheme::OUTPUT_LEN);
    }

    #[test]
    fn sha256_matches_reference() {
        let expected = Sha256::digest(b"saltpassword").to_vec();
        let actual = Sha256Scheme.compute("password", b"salt").unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn unknown_version_is_unsupported() {
        let registry = HashSchemeRegistry::new();
        assert!(matches!(
            registry.get(7),
            Err(IdentityError::UnsupportedHashVersion(7))
        ));
        assert!(matches!(registry.compute("pw", None), Err(IdentityError::Config(_))));
    }

    #[test]
    fn verify_old_version() {
        let registry = HashSchemeRegistry::with_default_schemes(&cheap_config()).unwrap();
        let old = registry
            .compute_with_version(SHA256_VERSION, "hunter22", None)
            .unwrap();

        assert!(registry.verify("hunter22", SHA256_VERSION, &old.salt, &old.hash).unwrap());
        assert!(!registry.verify("hunter23", SHA256_VERSION, &old.salt, &old.hash).unwrap());
    }

    #[test]
    fn fresh_salts_differ() {
        let registry = HashSchemeRegistry::with_default_schemes(&cheap_config()).unwrap();
        let a = registry.compute("same password", None).unwrap();
        let b = registry.compute("same password", None).unwrap();
        assert_ne!(a.salt, b.salt);
        assert_ne!(a.hash, b.hash);
    }

    #[test]
    fn invalid_argon2_params_rejected() {
        assert!(matches!(Argon2Scheme::new(0, 0, 0), Err(IdentityError::Config(_))));
    }
}
