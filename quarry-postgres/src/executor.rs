//! [`Executor`] implementation backed by the connection pool.

use quarry_query::traits::{BoxFuture, Executor};
use quarry_query::{CompiledStatement, Record};
use tokio_postgres::types::ToSql;
use tracing::debug;

use crate::config::PgConfig;
use crate::error::{PgError, PgResult};
use crate::pool::PgPool;
use crate::types::{params, row_to_record};

/// Runs compiled statements on a pooled connection.
///
/// Each statement checks out a connection, prepares (or reuses) the statement
/// on it and converts the returned rows to records.
#[derive(Clone, Debug)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    /// Create an executor over an existing pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create an executor with a default pool for the given configuration.
    pub fn connect(config: PgConfig) -> PgResult<Self> {
        Ok(Self::new(PgPool::new(config)?))
    }

    /// Create an executor from `DATABASE_URL`.
    pub fn from_env() -> PgResult<Self> {
        Self::connect(PgConfig::from_env()?)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn run(&self, statement: &CompiledStatement) -> PgResult<Vec<Record>> {
        let client = self.pool.get().await?;
        let prepared = client.prepare_cached(statement.sql()).await?;

        let bound = params(statement.params());
        let refs: Vec<&(dyn ToSql + Sync)> = bound.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = client.query(&prepared, &refs).await?;
        debug!(rows = rows.len(), "Statement returned");
        rows.iter().map(row_to_record).collect()
    }
}

impl Executor for PgExecutor {
    type Error = PgError;

    fn query<'a>(&'a self, statement: &'a CompiledStatement) -> BoxFuture<'a, Result<Vec<Record>, PgError>> {
        Box::pin(self.run(statement))
    }
}
