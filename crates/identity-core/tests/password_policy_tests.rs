//! Password policy bounds and hash determinism

use std::sync::Arc;

use credgate_common::SystemClock;
use credgate_identity::hashing::{Argon2Scheme, HashScheme, Sha256Scheme};
use credgate_identity::policy::PolicyViolation;
use credgate_identity::{
    IdentityConfig, IdentityError, IdentityService, MemoryIdentityStore, PasswordConfig,
};
use proptest::prelude::*;

fn test_config() -> IdentityConfig {
    IdentityConfig {
        password: PasswordConfig {
            argon2_memory_cost: 64,
            argon2_time_cost: 1,
            argon2_parallelism: 1,
            ..PasswordConfig::default()
        },
        ..IdentityConfig::default()
    }
}

fn service() -> IdentityService {
    IdentityService::new(
        test_config(),
        Arc::new(MemoryIdentityStore::new()),
        SystemClock::shared(),
    )
    .unwrap()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_policy_checked_before_storage() {
    let service = service();

    // The identity does not exist, but the password is rejected first
    let err = service
        .credentials()
        .add_credentials("urn:identity:missing", "alice", "short", false, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidPassword(PolicyViolation::TooShort(8))));

    let err = service
        .credentials()
        .add_credentials("urn:identity:missing", "a b", "long enough", false, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidUsername(_)));

    let err = service
        .credentials()
        .add_credentials("urn:identity:missing", "alice", "long enough", false, &[])
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::UnknownIdentity(_)));
}

#[tokio::test]
async fn test_change_password_enforces_policy() {
    let service = service();
    let identity = service.directory().create_identity().await.unwrap();
    let credential = service
        .credentials()
        .add_credentials(&identity, "bob", "initial password", false, &[])
        .await
        .unwrap();

    let err = service
        .credentials()
        .change_password(&credential, &"x".repeat(161))
        .await
        .unwrap_err();
    assert!(matches!(err, IdentityError::InvalidPassword(PolicyViolation::TooLong(160))));
}

#[test]
fn test_check_password_allowed() {
    let service = service();
    let check = service.credentials().check_password_allowed("1234567");
    assert!(!check.allowed);
    assert_eq!(check.error, Some(PolicyViolation::TooShort(8)));
    assert!(check.policy.contains("between 8 and 160"));

    assert!(service.credentials().check_password_allowed("12345678").allowed);
}

#[test]
fn test_custom_password_regex() {
    let mut config = test_config();
    config.password.regex = r"\d".to_string();
    let service = service();
    service.reconfigure(config).unwrap();

    assert!(!service.credentials().check_password_allowed("no digits here").allowed);
    assert!(service.credentials().check_password_allowed("has 1 digit").allowed);
}

#[test]
fn test_bad_reconfiguration_keeps_previous_policy() {
    let service = service();
    let mut config = test_config();
    config.password.regex = "(".to_string();

    assert!(matches!(service.reconfigure(config), Err(IdentityError::Config(_))));
    assert!(service.credentials().check_password_allowed("12345678").allowed);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_password_length_bounds(length in 0usize..200) {
        let service = service();
        let rt = runtime();
        let password = "p".repeat(length);

        let outcome = rt.block_on(async {
            let identity = service.directory().create_identity().await.unwrap();
            service
                .credentials()
                .add_credentials(&identity, "carol", &password, false, &[])
                .await
        });

        if (8..=160).contains(&length) {
            prop_assert!(outcome.is_ok());
        } else {
            prop_assert!(matches!(outcome, Err(IdentityError::InvalidPassword(_))));
        }
    }

    #[test]
    fn prop_sha256_is_deterministic(password in ".{0,40}", salt in proptest::collection::vec(any::<u8>(), 16)) {
        let a = Sha256Scheme.compute(&password, &salt).unwrap();
        let b = Sha256Scheme.compute(&password, &salt).unwrap();
        prop_assert_eq!(a, b);
    }

    #[test]
    fn prop_changing_a_byte_changes_the_hash(password in "[a-z]{8,20}", index in 0usize..8) {
        let scheme = Argon2Scheme::new(64, 1, 1).unwrap();
        let salt = [7u8; 16];

        let mut altered: Vec<char> = password.chars().collect();
        altered[index] = if altered[index] == 'z' { 'a' } else { 'z' };
        let altered: String = altered.into_iter().collect();

        let original = scheme.compute(&password, &salt).unwrap();
        prop_assert_eq!(&original, &scheme.compute(&password, &salt).unwrap());
        prop_assert_ne!(original, scheme.compute(&altered, &salt).unwrap());
    }
}
