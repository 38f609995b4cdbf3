//! SQLite token database

use async_trait::async_trait;
use chrono::Utc;
use credgate_common::StoreResult;
use sqlx::SqlitePool;
use tracing::debug;

use super::{TokenDatabase, TokenRecord};

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        token TEXT NOT NULL UNIQUE,
        token_type TEXT NOT NULL,
        state TEXT NOT NULL,
        version INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )",
];

const TOKEN_COLUMNS: &str = "id, token, token_type, state, version";

#[derive(sqlx::FromRow)]
struct TokenRow {
    id: i64,
    token: String,
    token_type: String,
    state: String,
    version: i64,
}

impl From<TokenRow> for TokenRecord {
    fn from(row: TokenRow) -> Self {
        TokenRecord {
            id: row.id,
            token: row.token,
            token_type: row.token_type,
            state: row.state,
            version: row.version,
        }
    }
}

/// Token database on a SQLite database
#[derive(Debug, Clone)]
pub struct SqliteTokenDatabase {
    pool: SqlitePool,
}

impl SqliteTokenDatabase {
    /// Connect and create the schema if needed
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = SqlitePool::connect(database_url).await?;
        Self::with_pool(pool).await
    }

    pub async fn with_pool(pool: SqlitePool) -> StoreResult<Self> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&pool).await?;
        }
        debug!("Token schema ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl TokenDatabase for SqliteTokenDatabase {
    async fn add_token(&self, token: &str, token_type: &str, state: &str) -> StoreResult<TokenRecord> {
        let row: TokenRow = sqlx::query_as(&format!(
            "INSERT INTO tokens (token, token_type, state, version, created_at)
             VALUES (?, ?, ?, 1, ?)
             RETURNING {TOKEN_COLUMNS}"
        ))
        .bind(token)
        .bind(token_type)
        .bind(state)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into())
    }

    async fn get_token(&self, token: &str) -> StoreResult<Option<TokenRecord>> {
        let row: Option<TokenRow> =
            sqlx::query_as(&format!("SELECT {TOKEN_COLUMNS} FROM tokens WHERE token = ?"))
                .bind(token)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Into::into))
    }

    async fn update_token(&self, id: i64, expected_version: i64, state: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE tokens SET state = ?, version = version + 1 WHERE id = ? AND version = ?",
        )
        .bind(state)
        .bind(id)
        .bind(expected_version)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_token(&self, token: &str) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tokens WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_token_by_id(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tokens WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_tokens(&self, after_id: i64, limit: u32) -> StoreResult<Vec<TokenRecord>> {
        let rows: Vec<TokenRow> = sqlx::query_as(&format!(
            "SELECT {TOKEN_COLUMNS} FROM tokens WHERE id > ? ORDER BY id LIMIT ?"
        ))
        .bind(after_id)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }
}
