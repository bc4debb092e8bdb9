//! PostgreSQL store for Quarry CI.

pub mod repositories;
pub mod store;

pub use repositories::*;
pub use store::PgStore;

use quarry_core::Result;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to the database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| quarry_core::Error::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| quarry_core::Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Cheap connectivity probe for readiness checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| quarry_core::Error::Database(e.to_string()))?;
        Ok(())
    }

    /// A [`PgStore`] over this pool.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.pool.clone())
    }
}
