//! Database module providing PostgreSQL connection pooling and the storage
//! backends behind the points ledger.
//!
//! Two [`Store`] implementations exist:
//! - [`PgStore`]: PostgreSQL via sqlx, the production backend
//! - [`MemoryStore`]: an in-process backend used by tests and `--memory` runs

use sqlx::migrate::MigrateError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

pub mod config;
pub mod memory;
pub mod postgres;
pub mod store;
pub mod timeouts;

pub use config::{DatabaseConfig, RetryPolicy};
pub use memory::MemoryStore;
pub use postgres::PgStore;
pub use store::{Store, StoreError, StoreResult, StoreTransaction};

/// Database connection pool wrapper
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool
    ///
    /// # Arguments
    ///
    /// * `config` - Database configuration
    ///
    /// # Returns
    ///
    /// * `Result<Database, sqlx::Error>` - Database instance or error
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tourney::db::{Database, DatabaseConfig};
    ///
    /// #[tokio::main]
    /// async fn main() -> Result<(), sqlx::Error> {
    ///     let config = DatabaseConfig::from_env();
    ///     let db = Database::new(&config).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn new(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .max_lifetime(Duration::from_secs(config.max_lifetime_secs))
            .connect(&config.database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Connect, retrying while the database is still coming up.
    ///
    /// Makes up to `policy.attempts` attempts (at least one), sleeping
    /// `policy.interval` between them, and returns the last error if all fail.
    pub async fn connect_with_retry(
        config: &DatabaseConfig,
        policy: RetryPolicy,
    ) -> Result<Self, sqlx::Error> {
        let attempts = policy.attempts.max(1);
        let mut attempt = 1;
        loop {
            match Self::new(config).await {
                Ok(db) => {
                    log::info!("Connected to database on attempt {}", attempt);
                    return Ok(db);
                }
                Err(err) if attempt < attempts => {
                    log::warn!(
                        "Database connection attempt {}/{} failed: {}",
                        attempt,
                        attempts,
                        err
                    );
                    tokio::time::sleep(policy.interval).await;
                    attempt += 1;
                }
                Err(err) => {
                    log::error!("Giving up on database after {} attempts: {}", attempts, err);
                    return Err(err);
                }
            }
        }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Build a [`PgStore`] sharing this pool.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }

    /// Check if the database connection is healthy
    ///
    /// # Returns
    ///
    /// * `Result<(), sqlx::Error>` - Ok if healthy, error otherwise
    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the database connection pool
    pub async fn close(self) {
        self.pool.close().await;
    }
}
