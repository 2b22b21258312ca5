use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};

use keel_core::config::DatabaseConfig;
use keel_core::{KeelError, Result};

use super::transaction::PgTransaction;

/// Database connection wrapper providing connection pooling.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    config: DatabaseConfig,
}

impl Database {
    /// Create a new database connection from configuration.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        if config.url.is_empty() {
            return Err(KeelError::Config("database.url is not set".to_string()));
        }

        let pool = Self::create_pool(&config.url, config.pool_size, config.pool_timeout_secs)
            .await
            .map_err(|e| KeelError::Database(format!("Failed to connect: {}", e)))?;

        Ok(Self {
            pool,
            config: config.clone(),
        })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            config: DatabaseConfig::default(),
        }
    }

    async fn create_pool(url: &str, size: u32, timeout_secs: u64) -> sqlx::Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(size)
            .acquire_timeout(Duration::from_secs(timeout_secs))
            .connect(url)
            .await
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Open the transaction a migration run executes in.
    pub async fn begin(&self) -> Result<PgTransaction> {
        self.pool
            .begin()
            .await
            .map_err(|e| KeelError::Database(format!("Failed to begin transaction: {}", e)))
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| KeelError::Database(format!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Close all connections gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// Type alias for the pool type.
pub type DatabasePool = PgPool;
