//! Delete operation for removing records.

use crate::error::{ExecuteError, QueryResult};
use crate::filter::Where;
use crate::sql::CompiledStatement;
use crate::statement::{Returning, compile_delete};
use crate::traits::{Executor, run};
use crate::value::Record;

use super::OperationContext;

/// A delete operation for removing matching records.
///
/// Deleted rows are not returned unless asked for.
///
/// # Example
///
/// ```rust,ignore
/// let removed = repository
///     .destroy(Where::new().eq("store", 1))
///     .return_records(true)
///     .exec()
///     .await?;
/// ```
pub struct DeleteOperation<X: Executor> {
    context: OperationContext<X>,
    filter: Where,
    returning: Returning,
}

impl<X: Executor> DeleteOperation<X> {
    /// Create a new Delete operation.
    pub fn new(context: OperationContext<X>, filter: Where) -> Self {
        Self {
            context,
            filter,
            returning: Returning::None,
        }
    }

    /// Return only these properties of deleted rows.
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = Returning::Columns(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Whether deleted rows are returned. Defaults to `false`.
    pub fn return_records(mut self, return_records: bool) -> Self {
        self.returning = Returning::records(return_records);
        self
    }

    /// Build the SQL query.
    pub fn build(&self) -> QueryResult<CompiledStatement> {
        compile_delete(&self.context.registry, &self.context.model, &self.filter, &self.returning)
    }

    /// Execute the delete.
    pub async fn exec(self) -> Result<Vec<Record>, ExecuteError<X::Error>> {
        let statement = self.build()?;
        let rows = run(self.context.executor.as_ref(), &statement).await?;
        Ok(if self.returning.is_some() { rows } else { Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::compiler::fixtures;
    use crate::testing::MockExecutor;
    use pretty_assertions::assert_eq;

    fn destroy(mock: MockExecutor) -> (DeleteOperation<MockExecutor>, Arc<MockExecutor>) {
        let registry = Arc::new(fixtures::registry());
        let model = registry.get("Store").unwrap();
        let mock = Arc::new(mock);
        (
            DeleteOperation::new(OperationContext::new(registry, model, Arc::clone(&mock)), Where::new().eq("id", 1)),
            mock,
        )
    }

    #[tokio::test]
    async fn test_delete_defaults_to_no_returning() {
        let (op, mock) = destroy(MockExecutor::new());
        assert!(op.exec().await.unwrap().is_empty());
        assert_eq!(mock.sql()[0], "DELETE FROM \"stores\" WHERE \"id\"=$1");
    }

    #[tokio::test]
    async fn test_delete_returning_records() {
        let (op, mock) = destroy(MockExecutor::new().with_rows(vec![Record::new().set("id", 1)]));
        let rows = op.return_records(true).exec().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            mock.sql()[0],
            "DELETE FROM \"stores\" WHERE \"id\"=$1 RETURNING \"id\",\"name\""
        );
    }
}
