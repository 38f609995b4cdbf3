//! Identity directory, credential management and shared secrets

use std::sync::Arc;

use credgate_common::SystemClock;
use credgate_identity::types::claim_names;
use credgate_identity::{
    AuthenticationStatus, Claim, ClaimStatus, IdentityConfig, IdentityError, IdentityService,
    MemoryIdentityStore, PasswordConfig,
};
use pretty_assertions::assert_eq;

fn service_with(config: IdentityConfig) -> IdentityService {
    let config = IdentityConfig {
        password: PasswordConfig {
            argon2_memory_cost: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..config.password
        },
        ..config
    };
    IdentityService::new(config, Arc::new(MemoryIdentityStore::new()), SystemClock::shared())
        .unwrap()
}

fn service() -> IdentityService {
    service_with(IdentityConfig::default())
}

#[tokio::test]
async fn test_identity_urn_format() {
    let service = service();
    let identity = service.directory().create_identity().await.unwrap();

    let id = identity.strip_prefix("urn:identity:").unwrap();
    assert_eq!(id.len(), 32);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    let mixed = service_with(IdentityConfig {
        identity_urn_namespace: "people".to_string(),
        mixed_case_identity: true,
        ..IdentityConfig::default()
    });
    let identity = mixed.directory().create_identity().await.unwrap();
    assert!(identity.starts_with("urn:people:"));
    assert_eq!(identity.len(), "urn:people:".len() + 22);
}

#[tokio::test]
async fn test_claims_update_and_delete() {
    let service = service();
    let directory = service.directory();
    let identity = directory.create_identity().await.unwrap();

    directory
        .update_claim(&identity, Claim::new("email", "old@example.com", ClaimStatus::Unverified))
        .await
        .unwrap();
    directory
        .update_claim(&identity, Claim::new("Email", "new@example.com", ClaimStatus::Verified))
        .await
        .unwrap();

    let claims = directory.get_claims(&identity).await.unwrap();
    assert_eq!(claims, vec![Claim::new("Email", "new@example.com", ClaimStatus::Verified)]);

    assert!(directory.delete_claim(&identity, "email").await.unwrap());
    assert!(!directory.delete_claim(&identity, "email").await.unwrap());
    assert!(directory.get_claims(&identity).await.unwrap().is_empty());

    let err = directory
        .update_claim("urn:identity:nobody", Claim::new("email", "x", ClaimStatus::Unverified))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::UnknownIdentity(_)));
}

#[tokio::test]
async fn test_search_pages_through_matches() {
    let service = service();
    let directory = service.directory();

    let mut expected = Vec::new();
    for i in 0..5 {
        let identity = directory.create_identity().await.unwrap();
        directory
            .update_claim(&identity, Claim::new("name", format!("Smith {i}"), ClaimStatus::Unverified))
            .await
            .unwrap();
        expected.push(identity);
    }
    let other = directory.create_identity().await.unwrap();
    directory
        .update_claim(&other, Claim::new("name", "Jones", ClaimStatus::Unverified))
        .await
        .unwrap();

    let first = directory.search("smith", None, 2).await.unwrap();
    assert_eq!(first.pager_token, "2");
    let second = directory
        .search("SMITH", Some(first.pager_token.as_str()), 2)
        .await
        .unwrap();
    let third = directory
        .search("smith", Some(second.pager_token.as_str()), 2)
        .await
        .unwrap();

    let found: Vec<String> = first
        .identities
        .iter()
        .chain(&second.identities)
        .chain(&third.identities)
        .map(|m| m.identity.clone())
        .collect();
    assert_eq!(found, expected);
    assert_eq!(third.identities.len(), 1);
    assert_eq!(third.identities[0].claims[0].value, "Smith 4");
}

#[tokio::test]
async fn test_search_clamps_page_size() {
    let service = service();
    let directory = service.directory();
    let identity = directory.create_identity().await.unwrap();
    directory
        .update_claim(&identity, Claim::new("name", "Zed", ClaimStatus::Unverified))
        .await
        .unwrap();

    let page = directory.search("zed", Some("not a number"), 0).await.unwrap();
    assert_eq!(page.identities.len(), 1);
    assert_eq!(page.pager_token, "1");

    let page = directory.search("zed", None, 500).await.unwrap();
    assert_eq!(page.pager_token, "50");
}

#[tokio::test]
async fn test_add_credentials_records_username_claim() {
    let service = service();
    let identity = service.directory().create_identity().await.unwrap();

    let credential = service
        .credentials()
        .add_credentials(&identity, "dave", "dave's password", false, &["login".to_string()])
        .await
        .unwrap();
    assert_eq!(credential.identity, identity);
    assert_eq!(credential.purposes, vec!["login"]);

    let claims = service.directory().get_claims(&identity).await.unwrap();
    assert_eq!(
        claims,
        vec![Claim::new(claim_names::USERNAME, "dave", ClaimStatus::Verified)]
    );

    assert!(service.credentials().delete_credential(&credential).await.unwrap());
    assert!(service.directory().get_claims(&identity).await.unwrap().is_empty());
    assert!(service
        .credentials()
        .get_username_credential("dave")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_username_unavailable_for_other_identity() {
    let service = service();
    let first = service.directory().create_identity().await.unwrap();
    let second = service.directory().create_identity().await.unwrap();

    service
        .credentials()
        .add_credentials(&first, "erin", "erin's password", false, &[])
        .await
        .unwrap();

    let err = service
        .credentials()
        .add_credentials(&second, "ERIN", "another password", true, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::UsernameUnavailable(_)));
}

#[tokio::test]
async fn test_replace_existing_credentials() {
    let service = service();
    let identity = service.directory().create_identity().await.unwrap();
    let credentials = service.credentials();

    credentials
        .add_credentials(&identity, "frank", "first password", false, &[])
        .await
        .unwrap();
    credentials
        .add_credentials(&identity, "frank2", "second password", false, &[])
        .await
        .unwrap();
    assert_eq!(credentials.get_credentials(&identity).await.unwrap().len(), 2);

    credentials
        .add_credentials(&identity, "frank", "third password", true, &[])
        .await
        .unwrap();

    let remaining = credentials.get_credentials(&identity).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].username, "frank");

    let result = credentials
        .authenticate_with_credentials("frank", "third password")
        .await
        .unwrap();
    assert!(result.is_authenticated());
}

#[tokio::test]
async fn test_invalid_purpose_rejected() {
    let service = service();
    let identity = service.directory().create_identity().await.unwrap();

    let err = service
        .credentials()
        .add_credentials(&identity, "gina", "gina's password", false, &["a,b".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidPurpose(p) if p == "a,b"));
}

#[tokio::test]
async fn test_shared_secret_lifecycle() {
    let service = service();
    let identity = service.directory().create_identity().await.unwrap();
    let secrets = service.shared_secrets();

    let secret = secrets
        .add_shared_secret(&identity, "build server", &["deploy".to_string()])
        .await
        .unwrap();

    let result = secrets.authenticate_with_shared_secret(&secret).await.unwrap();
    assert_eq!(result.status, AuthenticationStatus::Authenticated);
    assert_eq!(result.identity.as_deref(), Some(identity.as_str()));
    assert_eq!(result.purposes, vec!["deploy"]);

    // Shared secret logins are not tied to a username credential
    let token = result.remember_me_token.unwrap();
    assert!(service
        .credentials()
        .get_remember_me_credential(&token)
        .await
        .unwrap()
        .is_none());
    assert!(service.credentials().remember_me(&token).await.unwrap().is_authenticated());

    let listed = secrets.get_all_shared_secrets(&identity).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "build server");

    assert!(secrets.delete_shared_secret(&secret).await.unwrap());
    let result = secrets.authenticate_with_shared_secret(&secret).await.unwrap();
    assert_eq!(result.status, AuthenticationStatus::NotFound);

    let err = secrets
        .add_shared_secret("urn:identity:nobody", "x", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::UnknownIdentity(_)));
}
