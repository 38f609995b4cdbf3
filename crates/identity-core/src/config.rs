//! Configuration for credgate-identity

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::error::{IdentityError, Result};
use crate::policy::CredentialPolicy;

/// Main configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Namespace used when minting identity URNs (`urn:<namespace>:<id>`)
    pub identity_urn_namespace: String,
    pub mixed_case_identity: bool,
    pub mixed_case_tokens: bool,
    pub mixed_case_shared_secret: bool,
    pub username: UsernameConfig,
    pub password: PasswordConfig,
    pub lockout: LockoutConfig,
    /// Lifetime of a remember-me token issued on successful login
    pub remember_me_seconds: u64,
}

/// Username policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UsernameConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub regex: String,
}

/// Password policy and hashing cost
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub regex: String,
    pub argon2_memory_cost: u32,
    pub argon2_time_cost: u32,
    pub argon2_parallelism: u32,
}

/// Lockout after repeated failed logins
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LockoutConfig {
    /// Zero disables lockout
    pub failed_logins_to_lock: u32,
    pub lock_duration_seconds: u64,
}

/// Longest remember-me lifetime or lock duration accepted, one hundred years
pub const MAX_DURATION_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

impl IdentityConfig {
    pub fn remember_me_duration(&self) -> Duration {
        seconds(self.remember_me_seconds)
    }

    /// When a remember-me token issued at `now` stops working
    pub fn remember_me_expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        add_saturating(now, self.remember_me_duration())
    }
}

/// A validated configuration snapshot with its compiled policy
#[derive(Debug, Clone)]
pub struct IdentitySettings {
    pub config: IdentityConfig,
    pub policy: CredentialPolicy,
}

impl IdentitySettings {
    pub fn compile(config: IdentityConfig) -> Result<Self> {
        check_duration("remember_me_seconds", config.remember_me_seconds)?;
        check_duration("lockout.lock_duration_seconds", config.lockout.lock_duration_seconds)?;
        let policy = CredentialPolicy::new(&config.username, &config.password)?;
        Ok(Self { config, policy })
    }
}

impl LockoutConfig {
    pub fn lock_duration(&self) -> Duration {
        seconds(self.lock_duration_seconds)
    }

    /// End of a lock starting at `now`
    pub fn locked_until(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        add_saturating(now, self.lock_duration())
    }
}

fn check_duration(field: &str, value: u64) -> Result<()> {
    if value > MAX_DURATION_SECONDS {
        return Err(IdentityError::Config(format!(
            "{field} must not exceed {MAX_DURATION_SECONDS} seconds"
        )));
    }
    Ok(())
}

fn seconds(value: u64) -> Duration {
    // lossless: MAX_DURATION_SECONDS fits in i64
    Duration::seconds(value.min(MAX_DURATION_SECONDS) as i64)
}

fn add_saturating(start: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    start.checked_add_signed(duration).unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            identity_urn_namespace: "identity".to_string(),
            mixed_case_identity: false,
            mixed_case_tokens: false,
            mixed_case_shared_secret: false,
            username: UsernameConfig::default(),
            password: PasswordConfig::default(),
            lockout: LockoutConfig::default(),
            remember_me_seconds: 90 * 24 * 60 * 60,
        }
    }
}

impl Default for UsernameConfig {
    fn default() -> Self {
        Self {
            min_length: 3,
            max_length: 80,
            regex: r"^[a-zA-Z0-9_.\-]*$".to_string(),
        }
    }
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 8,
            max_length: 160,
            regex: r"(?s)^.*$".to_string(),
            argon2_memory_cost: 65536,
            argon2_time_cost: 3,
            argon2_parallelism: 4,
        }
    }
}

impl Default for LockoutConfig {
    fn default() -> Self {
        Self {
            failed_logins_to_lock: 5,
            lock_duration_seconds: 15 * 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = IdentityConfig::default();
        assert_eq!(config.identity_urn_namespace, "identity");
        assert_eq!(config.username.min_length, 3);
        assert_eq!(config.username.max_length, 80);
        assert_eq!(config.password.min_length, 8);
        assert_eq!(config.password.max_length, 160);
        assert_eq!(config.lockout.failed_logins_to_lock, 5);
        assert_eq!(config.lockout.lock_duration(), Duration::minutes(15));
        assert_eq!(config.remember_me_duration(), Duration::days(90));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: IdentityConfig = serde_json::from_str(
            r#"{"lockout": {"failed_logins_to_lock": 3}, "password": {"min_length": 12}}"#,
        )
        .unwrap();
        assert_eq!(config.lockout.failed_logins_to_lock, 3);
        assert_eq!(config.lockout.lock_duration_seconds, 900);
        assert_eq!(config.password.min_length, 12);
        assert_eq!(config.password.max_length, 160);
    }

    #[test]
    fn oversized_durations_rejected() {
        let mut config = IdentityConfig::default();
        config.remember_me_seconds = u64::MAX;
        assert!(matches!(IdentitySettings::compile(config), Err(IdentityError::Config(_))));

        let mut config = IdentityConfig::default();
        config.lockout.lock_duration_seconds = MAX_DURATION_SECONDS + 1;
        assert!(matches!(IdentitySettings::compile(config), Err(IdentityError::Config(_))));

        let mut config = IdentityConfig::default();
        config.remember_me_seconds = MAX_DURATION_SECONDS;
        config.lockout.lock_duration_seconds = MAX_DURATION_SECONDS;
        assert!(IdentitySettings::compile(config).is_ok());
    }

    #[test]
    fn expiry_saturates_near_the_end_of_time() {
        let mut config = IdentityConfig::default();
        config.remember_me_seconds = u64::MAX;
        config.lockout.lock_duration_seconds = MAX_DURATION_SECONDS;

        let late = DateTime::<Utc>::MAX_UTC - Duration::days(1);
        assert_eq!(config.remember_me_expiry(late), DateTime::<Utc>::MAX_UTC);
        assert_eq!(config.lockout.locked_until(late), DateTime::<Utc>::MAX_UTC);

        let now = Utc::now();
        assert_eq!(config.lockout.locked_until(now), now + Duration::seconds(MAX_DURATION_SECONDS as i64));
    }
}
