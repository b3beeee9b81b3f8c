pub mod context_store;
pub mod memories;
pub mod primer_cache;
pub mod retrieval;
pub mod schema;
pub mod staging;
pub mod taxonomy;

use crate::config::Config;
use crate::error::{EngineError, Result};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use std::str::FromStr;
use std::time::Duration;

/// Process-wide handle to the relational + vector + label-tree store.
/// Treat direct use before `Store::connect` as a programmer error — there is
/// no lazily-initialized global, the handle must be threaded explicitly.
#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connects the pool (sized from config) and runs schema setup,
    /// including the fatal embedding-dimension check.
    pub async fn connect(config: &Config) -> Result<Self> {
        let connect_options = PgConnectOptions::from_str(&config.database_url)
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        let pool = PgPoolOptions::new()
            .min_connections(config.pg_pool_min)
            .max_connections(config.pg_pool_max)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_options)
            .await
            .map_err(|e| EngineError::StoreUnavailable(e.to_string()))?;

        let store = Store { pool };
        let mut conn = store.pool.acquire().await?;
        schema::init_schema(&mut conn, config.embed_dim).await?;

        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Acquires a single connection for a sequence of reads that don't need
    /// transactional atomicity.
    pub async fn acquire(&self) -> Result<sqlx::pool::PoolConnection<Postgres>> {
        Ok(self.pool.acquire().await?)
    }

    /// Opens a transaction — the externally supplied handle every write
    /// method in `store::*` expects as its `&mut PgConnection` parameter
    /// (a `Transaction` derefs to `PgConnection`).
    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>> {
        Ok(self.pool.begin().await?)
    }
}

/// Convenience alias used throughout the pipeline/retrieval modules: every
/// store accessor is generic over "a connection", satisfied by either a bare
/// `PoolConnection` or an open `Transaction`.
pub type Conn = PgConnection;
