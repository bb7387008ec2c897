//! SQLite-backed contact directory
//!
//! Uses a `sqlx` connection pool with runtime-checked queries. The schema is
//! created on open, so a fresh database file works without a separate
//! migration step.

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tracing::{debug, info};

use async_trait::async_trait;

use crate::directory::{ContactDirectory, LookupOutcome};
use crate::error::DirectoryResult;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS contacts (
    phone_key TEXT PRIMARY KEY,
    name TEXT,
    tech_competence BOOLEAN NOT NULL,
    updated_at TEXT NOT NULL
)";

/// [`ContactDirectory`] backed by SQLite via sqlx
#[derive(Clone)]
pub struct SqliteDirectory {
    pool: SqlitePool,
}

impl SqliteDirectory {
    /// Open (creating if missing) the database at `database_url`
    /// (e.g. `sqlite:helpline.db`) and ensure the schema exists
    pub async fn connect(database_url: &str) -> DirectoryResult<Self> {
        let options: SqliteConnectOptions = database_url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    /// Open a private in-memory database, for tests and demos
    pub async fn in_memory() -> DirectoryResult<Self> {
        // A pool wider than one connection would hand out independent
        // in-memory databases.
        let options = SqliteConnectOptions::new().in_memory(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        Self::with_pool(pool).await
    }

    async fn with_pool(pool: SqlitePool) -> DirectoryResult<Self> {
        sqlx::query(SCHEMA).execute(&pool).await?;
        info!("contact directory ready");
        Ok(Self { pool })
    }

    /// Access the underlying pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl ContactDirectory for SqliteDirectory {
    async fn lookup(&self, phone_key: &str) -> DirectoryResult<LookupOutcome> {
        let row = sqlx::query("SELECT tech_competence FROM contacts WHERE phone_key = ?1")
            .bind(phone_key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(match row {
            Some(row) => {
                let technical: bool = row.try_get("tech_competence")?;
                debug!("directory hit for {}: technical = {}", phone_key, technical);
                LookupOutcome::known(technical)
            }
            None => LookupOutcome::unknown(),
        })
    }

    async fn upsert(&self, phone_key: &str, technical: bool) -> DirectoryResult<()> {
        sqlx::query(
            "INSERT INTO contacts (phone_key, name, tech_competence, updated_at)
             VALUES (?1, NULL, ?2, ?3)
             ON CONFLICT(phone_key) DO UPDATE SET
                 tech_competence = excluded.tech_competence,
                 updated_at = excluded.updated_at",
        )
        .bind(phone_key)
        .bind(technical)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;

        debug!("stored categorization for {}: technical = {}", phone_key, technical);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_is_created_on_open() {
        let dir = SqliteDirectory::in_memory().await.unwrap();
        let outcome = dir.lookup("+15551234567").await.unwrap();
        assert_eq!(outcome, LookupOutcome::unknown());
    }

    #[tokio::test]
    async fn upsert_is_last_write_wins() {
        let dir = SqliteDirectory::in_memory().await.unwrap();
        dir.upsert("+15551234567", false).await.unwrap();
        dir.upsert("+15551234567", true).await.unwrap();

        let outcome = dir.lookup("+15551234567").await.unwrap();
        assert_eq!(outcome, LookupOutcome::known(true));
    }

    #[tokio::test]
    async fn keys_are_passed_through_unvalidated() {
        // The directory stores whatever identifier the caller supplied
        let dir = SqliteDirectory::in_memory().await.unwrap();
        dir.upsert("(555) 123-4567", false).await.unwrap();

        assert_eq!(
            dir.lookup("(555) 123-4567").await.unwrap(),
            LookupOutcome::known(false)
        );
        assert_eq!(dir.lookup("5551234567").await.unwrap(), LookupOutcome::unknown());
    }
}
