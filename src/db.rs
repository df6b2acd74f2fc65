//! Database connection and schema management.
//!
//! The state database holds the processed set, the failure log and the
//! per-record extractor cache. It is a single SQLite file with:
//! - WAL mode
//! - a busy timeout instead of immediate lock errors
//! - automatic migration execution
//!
//! # Example
//!
//! ```no_run
//! use aparts_core::Database;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new(Path::new("aparts-state.db")).await?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use thiserror::Error;
use tracing::instrument;

/// Pool size. Kept low since SQLite uses file-level locking and runs are sequential.
const DEFAULT_MAX_CONNECTIONS: u32 = 2;

/// SQLite busy timeout in milliseconds.
const BUSY_TIMEOUT_MS: u32 = 5000;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connection(#[from] sqlx::Error),

    /// Failed to run migrations.
    #[error("failed to run migrations: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Database connection wrapper with connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) the state database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument(skip(db_path), fields(path = %db_path.display()))]
    pub async fn new(db_path: &Path) -> Result<Self, DbError> {
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(DEFAULT_MAX_CONNECTIONS)
            .connect(&db_url)
            .await?;

        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(&pool)
            .await?;

        sqlx::query(&format!("PRAGMA busy_timeout={BUSY_TIMEOUT_MS}"))
            .execute(&pool)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    /// Creates an in-memory database for tests.
    ///
    /// A single connection keeps every query on the same in-memory database.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the connection fails,
    /// or `DbError::Migration` if migrations fail.
    #[instrument]
    pub async fn new_in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(Self { pool })
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Checks if WAL mode is enabled.
    ///
    /// # Errors
    ///
    /// Returns `DbError::Connection` if the query fails.
    #[instrument(skip(self))]
    pub async fn is_wal_enabled(&self) -> Result<bool, DbError> {
        let result: (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(&self.pool)
            .await?;

        Ok(result.0.to_lowercase() == "wal")
    }

    /// Closes all connections in the pool.
    #[instrument(skip(self))]
    pub async fn close(self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_database_new_in_memory_succeeds() {
        let db = Database::new_in_memory().await;
        assert!(db.is_ok(), "Failed to create in-memory database");
    }

    #[tokio::test]
    async fn test_database_processed_documents_table_exists() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO processed_documents (document_id, result_json, fingerprint) VALUES ('doc', '{}', 'abc')",
        )
        .execute(db.pool())
        .await;

        assert!(result.is_ok(), "processed_documents should exist after migration");
    }

    #[tokio::test]
    async fn test_database_failure_kind_constraint() {
        let db = Database::new_in_memory().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO tagging_failures (document_id, path, kind, message) VALUES ('doc', 'doc.pdf', 'network', 'x')",
        )
        .execute(db.pool())
        .await;

        assert!(
            result.is_err(),
            "Unknown failure kind should be rejected by CHECK constraint"
        );
    }

    #[tokio::test]
    async fn test_database_with_tempfile_enables_wal() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("state.db");

        let db = Database::new(&db_path).await.unwrap();
        assert!(db.is_wal_enabled().await.unwrap());
        db.close().await;
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_database_reopen_keeps_schema() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("state.db");

        Database::new(&db_path).await.unwrap().close().await;
        let db = Database::new(&db_path).await.unwrap();
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM record_candidates")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(result.0, 0);
    }
}
