//! SQLite identity store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use credgate_common::{StoreError, StoreResult};
use sqlx::SqlitePool;
use tracing::debug;

use super::IdentityStore;
use crate::types::{
    join_purposes, split_purposes, AuthenticationMethod, AuthenticationRecord, Claim, ClaimStatus,
    CredentialRecord, NewCredential, SharedSecretRecord,
};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS identities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS claims (
        identity TEXT NOT NULL,
        name TEXT NOT NULL COLLATE NOCASE,
        value TEXT NOT NULL,
        status TEXT NOT NULL,
        PRIMARY KEY (identity, name)
    )",
    "CREATE TABLE IF NOT EXISTS credentials (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity TEXT NOT NULL,
        username TEXT NOT NULL COLLATE NOCASE UNIQUE,
        purposes TEXT NOT NULL,
        hash_version INTEGER NOT NULL,
        salt BLOB NOT NULL,
        hash BLOB NOT NULL,
        fail_count INTEGER NOT NULL DEFAULT 0,
        locked_until TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_credentials_identity ON credentials(identity)",
    "CREATE TABLE IF NOT EXISTS authentications (
        remember_me_token TEXT PRIMARY KEY,
        identity TEXT NOT NULL,
        purposes TEXT NOT NULL,
        method TEXT NOT NULL,
        method_id INTEGER,
        authenticated_at TEXT NOT NULL,
        expires TEXT
    )",
    "CREATE TABLE IF NOT EXISTS shared_secrets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        identity TEXT NOT NULL,
        name TEXT NOT NULL,
        secret TEXT NOT NULL UNIQUE,
        purposes TEXT NOT NULL
    )",
];

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: i64,
    identity: String,
    username: String,
    purposes: String,
    hash_version: i64,
    salt: Vec<u8>,
    hash: Vec<u8>,
    fail_count: i64,
    locked_until: Option<DateTime<Utc>>,
}

impl From<CredentialRow> for CredentialRecord {
    fn from(row: CredentialRow) -> Self {
        CredentialRecord {
            id: row.id,
            identity: row.identity,
            username: row.username,
            purposes: split_purposes(&row.purposes),
            hash_version: u32::try_from(row.hash_version).unwrap_or(u32::MAX),
            salt: row.salt,
            hash: row.hash,
            fail_count: u32::try_from(row.fail_count).unwrap_or(0),
            locked_until: row.locked_until,
        }
    }
}

#[derive(sqlx::FromRow)]
struct AuthenticationRow {
    remember_me_token: String,
    identity: String,
    purposes: String,
    method: String,
    method_id: Option<i64>,
    authenticated_at: DateTime<Utc>,
    expires: Option<DateTime<Utc>>,
}

impl TryFrom<AuthenticationRow> for AuthenticationRecord {
    type Error = StoreError;

    fn try_from(row: AuthenticationRow) -> StoreResult<Self> {
        let method = AuthenticationMethod::parse(&row.method).ok_or_else(|| {
            StoreError::Constraint(format!("unknown authentication method '{}'", row.method))
        })?;
        Ok(AuthenticationRecord {
            remember_me_token: row.remember_me_token,
            identity: row.identity,
            purposes: split_purposes(&row.purposes),
            method,
            method_id: row.method_id,
            when: row.authenticated_at,
            expires: row.expires,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SharedSecretRow {
    id: i64,
    identity: String,
    name: String,
    secret: String,
    purposes: String,
}

impl From<SharedSecretRow> for SharedSecretRecord {
    fn from(row: SharedSecretRow) -> Self {
        SharedSecretRecord {
            id: row.id,
            identity: row.identity,
            name: row.name,
            secret: row.secret,
            purposes: split_purposes(&row.purposes),
        }
    }
}

#[derive(sqlx::FromRow)]
struct ClaimRow {
    name: String,
    value: String,
    status: String,
}

const CREDENTIAL_COLUMNS: &str =
    "id, identity, username, purposes, hash_version, salt, hash, fail_count, locked_until";

/// Identity store on a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteIdentityStore {
    pool: SqlitePool,
}

impl SqliteIdentityStore {
    /// Connect and create the schema if needed
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("Identity schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

async fn insert_credential<'e, E>(executor: E, credential: &NewCredential) -> StoreResult<CredentialRecord>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let row: CredentialRow = sqlx::query_as(&format!(
        "INSERT INTO credentials (identity, username, purposes, hash_version, salt, hash)
         VALUES (?, ?, ?, ?, ?, ?)
         RETURNING {CREDENTIAL_COLUMNS}"
    ))
    .bind(&credential.identity)
    .bind(&credential.username)
    .bind(join_purposes(&credential.purposes))
    .bind(i64::from(credential.hash_version))
    .bind(&credential.salt)
    .bind(&credential.hash)
    .fetch_one(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::Constraint(format!("username {} already exists", credential.username))
        }
        other => StoreError::Database(other),
    })?;
    Ok(row.into())
}

#[async_trait]
impl IdentityStore for SqliteIdentityStore {
    async fn add_identity(&self, identity: &str) -> StoreResult<()> {
        sqlx::query("INSERT INTO identities (identity, created_at) VALUES (?, ?)")
            .bind(identity)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn identity_exists(&self, identity: &str) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM identities WHERE identity = ?")
            .bind(identity)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn get_claims(&self, identity: &str) -> StoreResult<Vec<Claim>> {
        let rows: Vec<ClaimRow> = sqlx::query_as(
            "SELECT name, value, status FROM claims WHERE identity = ? ORDER BY rowid",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| Claim::new(row.name, row.value, ClaimStatus::parse(&row.status)))
            .collect())
    }

    async fn put_claim(&self, identity: &str, claim: &Claim) -> StoreResult<()> {
        if !self.identity_exists(identity).await? {
            return Err(StoreError::NotFound(format!("identity {identity}")));
        }
        sqlx::query(
            "INSERT INTO claims (identity, name, value, status) VALUES (?, ?, ?, ?)
             ON CONFLICT(identity, name) DO UPDATE
             SET name = excluded.name, value = excluded.value, status = excluded.status",
        )
        .bind(identity)
        .bind(&claim.name)
        .bind(&claim.value)
        .bind(claim.status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_claim(&self, identity: &str, name: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM claims WHERE identity = ? AND name = ?")
            .bind(identity)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_claims(&self, text: &str) -> StoreResult<Vec<String>> {
        let identities = sqlx::query_scalar(
            "SELECT i.identity FROM identities i
             WHERE EXISTS (
                 SELECT 1 FROM claims c
                 WHERE c.identity = i.identity AND instr(lower(c.value), lower(?)) > 0
             )
             ORDER BY i.id",
        )
        .bind(text)
        .fetch_all(&self.pool)
        .await?;
        Ok(identities)
    }

    async fn add_credential(&self, credential: NewCredential) -> StoreResult<CredentialRecord> {
        insert_credential(&self.pool, &credential).await
    }

    async fn get_credential_by_username(&self, username: &str) -> StoreResult<Option<CredentialRecord>> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_credential(&self, id: i64) -> StoreResult<Option<CredentialRecord>> {
        let row: Option<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn get_identity_credentials(&self, identity: &str) -> StoreResult<Vec<CredentialRecord>> {
        let rows: Vec<CredentialRow> = sqlx::query_as(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE identity = ? ORDER BY id"
        ))
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn update_password(
        &self,
        username: &str,
        hash_version: u32,
        salt: &[u8],
        hash: &[u8],
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE credentials SET hash_version = ?, salt = ?, hash = ? WHERE username = ?",
        )
        .bind(i64::from(hash_version))
        .bind(salt)
        .bind(hash)
        .bind(username)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_credential(&self, username: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM credentials WHERE username = ?")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn replace_credentials(&self, credential: NewCredential) -> StoreResult<(CredentialRecord, u64)> {
        let mut tx = self.pool.begin().await?;

        let removed = sqlx::query("DELETE FROM credentials WHERE identity = ?")
            .bind(&credential.identity)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        // dropping the transaction on error rolls the delete back
        let record = insert_credential(&mut *tx, &credential).await?;

        tx.commit().await?;
        Ok((record, removed))
    }

    async fn increment_fail_count(&self, credential_id: i64) -> StoreResult<u32> {
        let count: Option<i64> = sqlx::query_scalar(
            "UPDATE credentials SET fail_count = fail_count + 1 WHERE id = ? RETURNING fail_count",
        )
        .bind(credential_id)
        .fetch_optional(&self.pool)
        .await?;

        let count = count.ok_or_else(|| StoreError::NotFound(format!("credential {credential_id}")))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn lock(&self, username: &str, until: DateTime<Utc>) -> StoreResult<()> {
        let result = sqlx::query("UPDATE credentials SET locked_until = ? WHERE username = ?")
            .bind(until)
            .bind(username)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("username {username}")));
        }
        Ok(())
    }

    async fn unlock(&self, username: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE credentials SET locked_until = NULL, fail_count = 0 WHERE username = ?",
        )
        .bind(username)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("username {username}")));
        }
        Ok(())
    }

    async fn record_success(&self, record: AuthenticationRecord) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO authentications
                (remember_me_token, identity, purposes, method, method_id, authenticated_at, expires)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.remember_me_token)
        .bind(&record.identity)
        .bind(join_purposes(&record.purposes))
        .bind(record.method.as_str())
        .bind(record.method_id)
        .bind(record.when)
        .bind(record.expires)
        .execute(&mut *tx)
        .await?;

        if let (AuthenticationMethod::Credentials, Some(id)) = (record.method, record.method_id) {
            sqlx::query("UPDATE credentials SET fail_count = 0 WHERE id = ?")
                .bind(id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_authentication(&self, remember_me_token: &str) -> StoreResult<Option<AuthenticationRecord>> {
        let row: Option<AuthenticationRow> = sqlx::query_as(
            "SELECT remember_me_token, identity, purposes, method, method_id, authenticated_at, expires
             FROM authentications WHERE remember_me_token = ?",
        )
        .bind(remember_me_token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    async fn add_shared_secret(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
        purposes: &[String],
    ) -> StoreResult<SharedSecretRecord> {
        let row: SharedSecretRow = sqlx::query_as(
            "INSERT INTO shared_secrets (identity, name, secret, purposes) VALUES (?, ?, ?, ?)
             RETURNING id, identity, name, secret, purposes",
        )
        .bind(identity)
        .bind(name)
        .bind(secret)
        .bind(join_purposes(purposes))
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_shared_secret(&self, secret: &str) -> StoreResult<Option<SharedSecretRecord>> {
        let row: Option<SharedSecretRow> = sqlx::query_as(
            "SELECT id, identity, name, secret, purposes FROM shared_secrets WHERE secret = ?",
        )
        .bind(secret)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    async fn delete_shared_secret(&self, secret: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM shared_secrets WHERE secret = ?")
            .bind(secret)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn get_identity_shared_secrets(&self, identity: &str) -> StoreResult<Vec<SharedSecretRecord>> {
        let rows: Vec<SharedSecretRow> = sqlx::query_as(
            "SELECT id, identity, name, secret, purposes FROM shared_secrets
             WHERE identity = ? ORDER BY id",
        )
        .bind(identity)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
