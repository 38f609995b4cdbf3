//! Username, password and purpose validation.
//!
//! Every check here is pure: nothing touches storage, so callers run them
//! before any gateway call and fail fast.

use regex::Regex;
use serde::Serialize;

use crate::config::{PasswordConfig, UsernameConfig};
use crate::error::{IdentityError, Result};

/// Longest purpose label accepted on credentials and shared secrets
pub const MAX_PURPOSE_LENGTH: usize = 32;

/// Why a username or password was refused
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
pub enum PolicyViolation {
    #[error("must be at least {0} characters")]
    TooShort(usize),

    #[error("must not exceed {0} characters")]
    TooLong(usize),

    #[error("does not match the required pattern {0}")]
    PatternMismatch(String),
}

/// Verdict of [`CredentialPolicy::check_password`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordCheck {
    pub allowed: bool,
    /// Human readable description of the password rules
    pub policy: String,
    pub error: Option<PolicyViolation>,
}

#[derive(Debug, Clone)]
struct TextRule {
    min_length: usize,
    max_length: usize,
    pattern: Regex,
}

impl TextRule {
    fn compile(what: &str, min_length: usize, max_length: usize, pattern: &str) -> Result<Self> {
        if min_length > max_length {
            return Err(IdentityError::Config(format!(
                "{what} min_length {min_length} exceeds max_length {max_length}"
            )));
        }
        let pattern = Regex::new(pattern)
            .map_err(|e| IdentityError::Config(format!("invalid {what} regex: {e}")))?;
        Ok(Self {
            min_length,
            max_length,
            pattern,
        })
    }

    fn check(&self, value: &str) -> std::result::Result<(), PolicyViolation> {
        let length = value.chars().count();
        if length < self.min_length {
            return Err(PolicyViolation::TooShort(self.min_length));
        }
        if length > self.max_length {
            return Err(PolicyViolation::TooLong(self.max_length));
        }
        if !self.pattern.is_match(value) {
            return Err(PolicyViolation::PatternMismatch(self.pattern.as_str().to_string()));
        }
        Ok(())
    }
}

/// Compiled username and password rules
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    username: TextRule,
    password: TextRule,
    password_description: String,
}

impl CredentialPolicy {
    pub fn new(username: &UsernameConfig, password: &PasswordConfig) -> Result<Self> {
        let username_rule = TextRule::compile(
            "username",
            username.min_length,
            username.max_length,
            &username.regex,
        )?;
        let password_rule = TextRule::compile(
            "password",
            password.min_length,
            password.max_length,
            &password.regex,
        )?;

        let password_description = format!(
            "Passwords must be between {} and {} characters long and match the regular expression {}",
            password.min_length, password.max_length, password.regex
        );

        Ok(Self {
            username: username_rule,
            password: password_rule,
            password_description,
        })
    }

    pub fn check_username(&self, username: &str) -> Result<()> {
        self.username
            .check(username)
            .map_err(IdentityError::InvalidUsername)
    }

    pub fn validate_password(&self, password: &str) -> Result<()> {
        self.password
            .check(password)
            .map_err(IdentityError::InvalidPassword)
    }

    pub fn check_password(&self, password: &str) -> PasswordCheck {
        let error = self.password.check(password).err();
        PasswordCheck {
            allowed: error.is_none(),
            policy: self.password_description.clone(),
            error,
        }
    }

    pub fn password_policy(&self) -> &str {
        &self.password_description
    }
}

/// Validate purpose labels
pub fn check_purposes(purposes: &[String]) -> Result<()> {
    for purpose in purposes {
        let valid = !purpose.is_empty()
            && purpose.chars().count() <= MAX_PURPOSE_LENGTH
            && !purpose.contains([',', ' ', '"']);
        if !valid {
            return Err(IdentityError::InvalidPurpose(purpose.clone()));
        }
    }
    Ok(())
}
