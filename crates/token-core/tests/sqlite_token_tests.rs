//! The SQLite token database behind the full token store

use std::sync::Arc;

use chrono::Duration;
use credgate_common::ManualClock;
use credgate_tokens::store::TokenDatabase;
use credgate_tokens::{SqliteTokenDatabase, TokenStatus, TokenStore, TokenStoreConfig};
use serde_json::json;
use tempfile::TempDir;

/// Helper to create a test database
async fn create_test_db() -> (SqliteTokenDatabase, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("tokens.db");
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());

    let database = SqliteTokenDatabase::new(&db_url)
        .await
        .expect("Failed to create test database");

    (database, temp_dir)
}

#[tokio::test]
async fn test_record_versioning() {
    let (database, _temp_dir) = create_test_db().await;

    let record = database.add_token("abc", "session", "{}").await.unwrap();
    assert_eq!(record.version, 1);
    assert!(database.add_token("abc", "session", "{}").await.unwrap_err().is_constraint());

    assert!(database.update_token(record.id, 1, r#"{"type":"session"}"#).await.unwrap());
    assert!(!database.update_token(record.id, 1, "{}").await.unwrap());

    let stored = database.get_token("abc").await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.state, r#"{"type":"session"}"#);

    assert!(database.delete_token_by_id(record.id).await.unwrap());
    assert!(!database.delete_token("abc").await.unwrap());
    assert!(database.get_token("abc").await.unwrap().is_none());
}

#[tokio::test]
async fn test_listing_pages_in_id_order() {
    let (database, _temp_dir) = create_test_db().await;
    for token in ["a", "b", "c", "d", "e"] {
        database.add_token(token, "session", "{}").await.unwrap();
    }

    let first = database.list_tokens(0, 3).await.unwrap();
    assert_eq!(first.iter().map(|r| r.token.as_str()).collect::<Vec<_>>(), vec!["a", "b", "c"]);
    let rest = database.list_tokens(first[2].id, 3).await.unwrap();
    assert_eq!(rest.iter().map(|r| r.token.as_str()).collect::<Vec<_>>(), vec!["d", "e"]);
}

#[tokio::test]
async fn test_token_store_on_sqlite() {
    let (database, _temp_dir) = create_test_db().await;
    let database = Arc::new(database);
    let config: TokenStoreConfig = serde_json::from_value(json!({
        "token_types": [
            {"name": "reset", "rules": [
                {"type": "Expiry", "config": {"expiryTime": "00:15:00"}},
                {"type": "UseCount", "config": {"maxUseCount": 1}}
            ]}
        ]
    }))
    .unwrap();
    let clock = ManualClock::starting_now();
    let tokens = TokenStore::new(&config, database.clone(), clock.clone()).unwrap();

    let token = tokens
        .create_token("reset", &["password".to_string()], Some("urn:identity:a"))
        .await
        .unwrap()
        .unwrap();
    let stale = tokens.create_token("reset", &[], None).await.unwrap().unwrap();

    let used = tokens
        .get_token("reset", &token, Some("password"), Some("urn:identity:a"))
        .await
        .unwrap();
    assert_eq!(used.status, TokenStatus::Allowed);

    // used up beats the wrong purpose
    let again = tokens
        .get_token("reset", &token, Some("login"), Some("urn:identity:a"))
        .await
        .unwrap();
    assert_eq!(again.status, TokenStatus::Invalid);
    assert!(database.get_token(&token).await.unwrap().is_none());

    let wasted = tokens.create_token("reset", &["password".to_string()], None).await.unwrap().unwrap();
    let wrong_purpose = tokens.get_token("reset", &wasted, Some("login"), None).await.unwrap();
    assert_eq!(wrong_purpose.status, TokenStatus::NotAllowed);
    let after = tokens.get_token("reset", &wasted, Some("password"), None).await.unwrap();
    assert_eq!(after.status, TokenStatus::Invalid, "the refused check spent the only use");

    clock.advance(Duration::minutes(16));
    assert_eq!(tokens.clean().await.unwrap(), 1);
    assert!(database.get_token(&stale).await.unwrap().is_none());
}
