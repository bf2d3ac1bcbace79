//! Database connection and initialization

use crate::sqlite::db_err;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use watchrewards_core::Result;

/// Database wrapper for SQLite operations
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to database at the given path, creating if necessary
    pub async fn connect(path: &Path) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                watchrewards_core::Error::Database(e.to_string())
            })?;
        }

        let path_str = path.to_string_lossy();
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path_str))
            .map_err(db_err)?
            .create_if_missing(true)
            // Bounded wait on writer contention; callers see a transient
            // error instead of an indefinite hang
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await
            .map_err(db_err)?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Connect to in-memory database (for testing)
    pub async fn connect_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(db_err)?;

        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS accounts (
                account_id INTEGER PRIMARY KEY,
                display_name TEXT NOT NULL,
                points INTEGER NOT NULL DEFAULT 0,
                referral_code TEXT UNIQUE,
                referred_by INTEGER,
                channel_member INTEGER NOT NULL DEFAULT 0,
                watching_video_id INTEGER,
                watch_started_at INTEGER,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (referred_by) REFERENCES accounts(account_id)
            );

            CREATE TABLE IF NOT EXISTS videos (
                video_id INTEGER PRIMARY KEY AUTOINCREMENT,
                link TEXT NOT NULL UNIQUE,
                duration_secs INTEGER NOT NULL,
                points_reward INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS watch_history (
                account_id INTEGER NOT NULL,
                video_id INTEGER NOT NULL,
                last_watched_at INTEGER NOT NULL,
                PRIMARY KEY (account_id, video_id),
                FOREIGN KEY (account_id) REFERENCES accounts(account_id),
                FOREIGN KEY (video_id) REFERENCES videos(video_id)
            );

            CREATE TABLE IF NOT EXISTS claims (
                claim_id TEXT PRIMARY KEY,
                account_id INTEGER NOT NULL,
                video_id INTEGER NOT NULL,
                points INTEGER NOT NULL,
                status TEXT NOT NULL,
                proof_ref TEXT,
                note TEXT,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(account_id),
                FOREIGN KEY (video_id) REFERENCES videos(video_id)
            );

            CREATE TABLE IF NOT EXISTS withdrawal_requests (
                request_id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                payout_handle TEXT NOT NULL,
                points INTEGER NOT NULL,
                amount_currency REAL NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                created_at INTEGER NOT NULL,
                FOREIGN KEY (account_id) REFERENCES accounts(account_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        // Index for admin review listings (idempotent)
        let _ = sqlx::query("CREATE INDEX IF NOT EXISTS idx_claims_status ON claims (status)")
            .execute(&self.pool)
            .await;

        let _ = sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_withdrawals_status ON withdrawal_requests (status)",
        )
        .execute(&self.pool)
        .await;

        Ok(())
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check out a single connection
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        self.pool.acquire().await.map_err(db_err)
    }

    /// Begin a transaction
    pub async fn begin(&self) -> Result<Transaction<'_, Sqlite>> {
        self.pool.begin().await.map_err(db_err)
    }
}
