//! The executor contract.
//!
//! The core never opens connections. Every executable operation is handed an
//! [`Executor`] that runs a compiled statement and returns rows as
//! [`Record`]s; database adapters such as `quarry-postgres` implement it.

use tracing::debug;

pub use futures::future::BoxFuture;

use crate::error::ExecuteError;
use crate::sql::CompiledStatement;
use crate::value::Record;

/// Runs compiled statements.
///
/// Implementations must be safe to share between tasks. Errors are surfaced to
/// callers unchanged as [`ExecuteError::Executor`].
pub trait Executor: Send + Sync {
    /// The executor's native error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Run a statement and return every row it produced.
    fn query<'a>(&'a self, statement: &'a CompiledStatement) -> BoxFuture<'a, Result<Vec<Record>, Self::Error>>;
}

impl<X: Executor + ?Sized> Executor for std::sync::Arc<X> {
    type Error = X::Error;

    fn query<'a>(&'a self, statement: &'a CompiledStatement) -> BoxFuture<'a, Result<Vec<Record>, Self::Error>> {
        (**self).query(statement)
    }
}

/// Run a statement, logging it first.
pub(crate) async fn run<X: Executor + ?Sized>(
    executor: &X,
    statement: &CompiledStatement,
) -> Result<Vec<Record>, ExecuteError<X::Error>> {
    debug!(sql = %statement.sql(), params = statement.params().len(), "Executing statement");
    executor
        .query(statement)
        .await
        .map_err(ExecuteError::Executor)
}
