//! Update operation for modifying records.

use crate::error::{ExecuteError, QueryResult};
use crate::filter::Where;
use crate::sql::CompiledStatement;
use crate::statement::{Returning, compile_update};
use crate::traits::{Executor, run};
use crate::value::Record;

use super::OperationContext;

/// An update operation for modifying matching records.
///
/// # Example
///
/// ```rust,ignore
/// let updated = repository
///     .update(Where::new().eq("id", 1), Record::new().set("name", "Gear"))
///     .exec()
///     .await?;
/// ```
pub struct UpdateOperation<X: Executor> {
    context: OperationContext<X>,
    filter: Where,
    values: Record,
    returning: Returning,
}

impl<X: Executor> UpdateOperation<X> {
    /// Create a new Update operation.
    pub fn new(context: OperationContext<X>, filter: Where, values: Record) -> Self {
        Self {
            context,
            filter,
            values,
            returning: Returning::All,
        }
    }

    /// Set a value.
    pub fn set(mut self, property: impl Into<String>, value: impl Into<crate::value::Value>) -> Self {
        self.values.insert(property, value);
        self
    }

    /// Return only these properties (primary key included).
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.returning = Returning::Columns(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Whether updated rows are returned. Defaults to `true`.
    pub fn return_records(mut self, return_records: bool) -> Self {
        self.returning = Returning::records(return_records);
        self
    }

    /// Build the SQL query.
    pub fn build(&self) -> QueryResult<CompiledStatement> {
        compile_update(
            &self.context.registry,
            &self.context.model,
            &self.filter,
            &self.values,
            &self.returning,
        )
    }

    /// Execute the update and return the updated rows.
    pub async fn exec(self) -> Result<Vec<Record>, ExecuteError<X::Error>> {
        let statement = self.build()?;
        let rows = run(self.context.executor.as_ref(), &statement).await?;
        Ok(if self.returning.is_some() { rows } else { Vec::new() })
    }
}
