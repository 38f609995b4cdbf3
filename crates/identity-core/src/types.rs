//! Core types for credgate-identity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Well known claim names
pub mod claim_names {
    /// Recorded (verified) when credentials are added to an identity
    pub const USERNAME: &str = "username";
}

/// A username/password credential as seen by callers.
///
/// Hashes, salts and lockout state never leave the crate through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub identity: String,
    pub username: String,
    pub purposes: Vec<String>,
}

/// A credential row as held by the identity store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialRecord {
    pub id: i64,
    pub identity: String,
    pub username: String,
    pub purposes: Vec<String>,
    pub hash_version: u32,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
    pub fail_count: u32,
    pub locked_until: Option<DateTime<Utc>>,
}

impl CredentialRecord {
    pub fn to_credential(&self) -> Credential {
        Credential {
            identity: self.identity.clone(),
            username: self.username.clone(),
            purposes: self.purposes.clone(),
        }
    }
}

/// Input for [`IdentityStore::add_credential`](crate::store::IdentityStore::add_credential)
#[derive(Debug, Clone)]
pub struct NewCredential {
    pub identity: String,
    pub username: String,
    pub purposes: Vec<String>,
    pub hash_version: u32,
    pub salt: Vec<u8>,
    pub hash: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationStatus {
    Authenticated,
    NotFound,
    InvalidCredentials,
    Locked,
    Expired,
    Unsupported,
}

/// Result of one authentication attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticationResult {
    pub identity: Option<String>,
    pub purposes: Vec<String>,
    pub status: AuthenticationStatus,
    pub remember_me_token: Option<String>,
}

impl AuthenticationResult {
    pub fn with_status(status: AuthenticationStatus) -> Self {
        Self {
            identity: None,
            purposes: Vec::new(),
            status,
            remember_me_token: None,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthenticationStatus::Authenticated
    }
}

/// How an identity proved itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthenticationMethod {
    Credentials,
    SharedSecret,
}

impl AuthenticationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthenticationMethod::Credentials => "credentials",
            AuthenticationMethod::SharedSecret => "shared_secret",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "credentials" => Some(AuthenticationMethod::Credentials),
            "shared_secret" => Some(AuthenticationMethod::SharedSecret),
            _ => None,
        }
    }
}

/// A successful authentication, keyed by its remember-me token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRecord {
    pub remember_me_token: String,
    pub identity: String,
    pub purposes: Vec<String>,
    pub method: AuthenticationMethod,
    /// Credential or shared secret row that was used
    pub method_id: Option<i64>,
    pub when: DateTime<Utc>,
    pub expires: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    Unverified,
    Verified,
}

impl ClaimStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClaimStatus::Unverified => "unverified",
            ClaimStatus::Verified => "verified",
        }
    }

    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("verified") {
            ClaimStatus::Verified
        } else {
            ClaimStatus::Unverified
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claim {
    pub name: String,
    pub value: String,
    pub status: ClaimStatus,
}

impl Claim {
    pub fn new(name: impl Into<String>, value: impl Into<String>, status: ClaimStatus) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            status,
        }
    }
}

/// A shared secret as seen by callers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedSecret {
    pub name: String,
    pub secret: String,
    pub purposes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedSecretRecord {
    pub id: i64,
    pub identity: String,
    pub name: String,
    pub secret: String,
    pub purposes: Vec<String>,
}

impl SharedSecretRecord {
    pub fn to_shared_secret(&self) -> SharedSecret {
        SharedSecret {
            name: self.name.clone(),
            secret: self.secret.clone(),
            purposes: self.purposes.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchingIdentity {
    pub identity: String,
    pub claims: Vec<Claim>,
}

/// One page of [`IdentityDirectory::search`](crate::directory::IdentityDirectory::search)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentitySearchResult {
    /// Pass back to fetch the following page
    pub pager_token: String,
    pub identities: Vec<MatchingIdentity>,
}

/// Purposes are persisted as one comma separated column
pub(crate) fn join_purposes(purposes: &[String]) -> String {
    purposes.join(",")
}

pub(crate) fn split_purposes(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
