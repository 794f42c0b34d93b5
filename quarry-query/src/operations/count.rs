//! Count operation for counting records.

use crate::error::{ExecuteError, QueryResult};
use crate::filter::Where;
use crate::sql::CompiledStatement;
use crate::statement::compile_count;
use crate::traits::{Executor, run};

use super::OperationContext;
use super::find_many::first_count;

/// A count operation for counting records.
///
/// # Example
///
/// ```rust,ignore
/// let count = repository
///     .count()
///     .r#where(Where::new().eq("store", 1))
///     .exec()
///     .await?;
/// ```
pub struct CountOperation<X: Executor> {
    context: OperationContext<X>,
    filter: Where,
}

impl<X: Executor> CountOperation<X> {
    /// Create a new Count operation.
    pub fn new(context: OperationContext<X>) -> Self {
        Self {
            context,
            filter: Where::new(),
        }
    }

    /// Add a filter; repeated calls are AND-ed.
    pub fn r#where(mut self, filter: Where) -> Self {
        self.filter = std::mem::take(&mut self.filter).merge(filter);
        self
    }

    /// Build the SQL query.
    pub fn build(&self) -> QueryResult<CompiledStatement> {
        compile_count(&self.context.registry, &self.context.model, &self.filter)
    }

    /// Execute the count query.
    pub async fn exec(self) -> Result<i64, ExecuteError<X::Error>> {
        let statement = self.build()?;
        let rows = run(self.context.executor.as_ref(), &statement).await?;
        Ok(first_count(&rows)?)
    }
}
