//! Database connection pool management.
//!
//! The pool has an explicit lifecycle: the composition root constructs one
//! [`Database`] at startup, consumers receive clones (the pool itself is
//! shared), and shutdown closes it exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder, Transaction};
use thiserror::Error;

use shared::pagination::{PageError, ServerPage};

/// Error type for database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("Database has been closed")]
    Closed,

    #[error(transparent)]
    Page(#[from] PageError),
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    600
}

/// Shared handle over the process-wide connection pool.
///
/// Clones share the same pool and the same close flag. [`Database::close`]
/// is idempotent: the first caller tears the pool down, concurrent and
/// later callers observe [`Database::is_closed`].
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
    closing: Arc<AtomicBool>,
}

impl Database {
    /// Connects a new pool with the given configuration.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
            .connect(&config.url)
            .await?;

        tracing::info!(
            max_connections = config.max_connections,
            "Database pool connected"
        );

        Ok(Self::from_pool(pool))
    }

    /// Wraps an existing pool (tests, embedded setups).
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            closing: Arc::new(AtomicBool::new(false)),
        }
    }

    /// The underlying pool, for running queries.
    pub fn pool(&self) -> Result<&PgPool, DbError> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        Ok(&self.pool)
    }

    /// Begins a transaction.
    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, DbError> {
        Ok(self.pool()?.begin().await?)
    }

    /// Begins a transaction with `search_path` pinned to a schema for its
    /// duration.
    pub async fn begin_in_schema(
        &self,
        schema: &str,
    ) -> Result<Transaction<'_, Postgres>, DbError> {
        let mut tx = self.pool()?.begin().await?;
        sqlx::query("SELECT set_config('search_path', $1, true)")
            .bind(schema)
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Fetches one page of a listing.
    ///
    /// `query` is extended with LIMIT/OFFSET derived from the 1-based page
    /// coordinates; `count` must produce a single bigint for the unpaged
    /// listing.
    pub async fn fetch_page<T>(
        &self,
        mut query: QueryBuilder<'_, Postgres>,
        mut count: QueryBuilder<'_, Postgres>,
        current_page: i64,
        page_size: i64,
    ) -> Result<ServerPage<T>, DbError>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let (limit, offset) = page_params(current_page, page_size)?;

        query
            .push(" LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);
        let elements = query
            .build_query_as::<T>()
            .fetch_all(self.pool()?)
            .await?;

        let total: i64 = count.build_query_scalar().fetch_one(self.pool()?).await?;

        Ok(ServerPage::new(elements, total, current_page, page_size)?)
    }

    /// Runs a count query returning a single bigint.
    pub async fn count(&self, mut count: QueryBuilder<'_, Postgres>) -> Result<i64, DbError> {
        Ok(count.build_query_scalar().fetch_one(self.pool()?).await?)
    }

    /// Closes the pool exactly once; concurrent callers return immediately.
    pub async fn close(&self) {
        // The swap decides a single closer even when two shutdown paths race.
        if self.closing.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }

    /// Whether close has begun.
    pub fn is_closed(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }
}

/// Converts 1-based page coordinates into a `(limit, offset)` pair.
pub fn page_params(current_page: i64, page_size: i64) -> Result<(i64, i64), PageError> {
    if page_size <= 0 {
        return Err(PageError::InvalidPageSize);
    }
    if current_page <= 0 {
        return Err(PageError::InvalidCurrentPage);
    }
    Ok((page_size, (current_page - 1) * page_size))
}
