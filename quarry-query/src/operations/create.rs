//! Create operation for inserting new records.

use tracing::debug;

use crate::error::{ExecuteError, QueryResult};
use crate::filter::Where;
use crate::sql::CompiledStatement;
use crate::statement::{InsertOptions, OnConflict, Returning, compile_insert};
use crate::traits::{Executor, run};
use crate::value::Record;

use super::OperationContext;

/// A create operation for inserting one or more records.
///
/// # Example
///
/// ```rust,ignore
/// let product = repository
///     .create(Record::new().set("name", "Widget").set("sku", "W-1"))
///     .on_conflict_merge(["sku"])
///     .exec_one()
///     .await?;
/// ```
pub struct CreateOperation<X: Executor> {
    context: OperationContext<X>,
    records: Vec<Record>,
    options: InsertOptions,
}

impl<X: Executor> CreateOperation<X> {
    /// Create a new Create operation.
    pub fn new(context: OperationContext<X>, records: Vec<Record>) -> Self {
        Self {
            context,
            records,
            options: InsertOptions::default(),
        }
    }

    /// Add another record to insert.
    pub fn record(mut self, record: Record) -> Self {
        self.records.push(record);
        self
    }

    /// Return only these properties (primary key included).
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.returning = Returning::Columns(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Whether inserted rows are returned. Defaults to `true`.
    pub fn return_records(mut self, return_records: bool) -> Self {
        self.options.returning = Returning::records(return_records);
        self
    }

    /// Set the conflict handling.
    pub fn on_conflict(mut self, on_conflict: OnConflict) -> Self {
        self.options.on_conflict = Some(on_conflict);
        self
    }

    /// `ON CONFLICT (...) DO NOTHING`.
    pub fn on_conflict_ignore<I, S>(self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_conflict(OnConflict::ignore(targets))
    }

    /// `ON CONFLICT (...) DO UPDATE SET ...` over every inserted column.
    pub fn on_conflict_merge<I, S>(self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_conflict(OnConflict::merge(targets))
    }

    /// `ON CONFLICT (...) DO UPDATE SET ... WHERE ...`.
    pub fn on_conflict_merge_where<I, S>(self, targets: I, filter: Where) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.on_conflict(OnConflict::merge(targets).merge_where(filter))
    }

    /// Build the SQL query.
    pub fn build(&self) -> QueryResult<CompiledStatement> {
        compile_insert(
            &self.context.registry,
            &self.context.model,
            &self.records,
            &self.options,
        )
    }

    /// Insert every record and return the returned rows.
    ///
    /// An empty batch issues no statement.
    pub async fn exec(self) -> Result<Vec<Record>, ExecuteError<X::Error>> {
        if self.records.is_empty() {
            debug!(model = %self.context.model.name, "Skipping empty insert");
            return Ok(Vec::new());
        }
        let statement = self.build()?;
        let rows = run(self.context.executor.as_ref(), &statement).await?;
        Ok(if self.options.returning.is_some() { rows } else { Vec::new() })
    }

    /// Insert and return the first returned row.
    pub async fn exec_one(self) -> Result<Option<Record>, ExecuteError<X::Error>> {
        Ok(self.exec().await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::compiler::fixtures;
    use crate::testing::MockExecutor;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn create(records: Vec<Record>, mock: MockExecutor) -> (CreateOperation<MockExecutor>, Arc<MockExecutor>) {
        let registry = Arc::new(fixtures::registry());
        let model = registry.get("Category").unwrap();
        let mock = Arc::new(mock);
        (
            CreateOperation::new(OperationContext::new(registry, model, Arc::clone(&mock)), records),
            mock,
        )
    }

    #[tokio::test]
    async fn test_empty_batch_issues_nothing() {
        let (op, mock) = create(Vec::new(), MockExecutor::new());
        assert!(op.exec().await.unwrap().is_empty());
        assert_eq!(mock.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_exec_one_returns_inserted_row() {
        let (op, mock) = create(
            vec![Record::new().set("name", "Tools")],
            MockExecutor::new().with_rows(vec![Record::new().set("id", 1).set("name", "Tools")]),
        );
        let category = op.on_conflict_ignore(["name"]).exec_one().await.unwrap().unwrap();
        assert_eq!(category.get("id"), Some(&Value::Int(1)));
        assert_eq!(
            mock.sql()[0],
            "INSERT INTO \"categories\" (\"name\") VALUES ($1) ON CONFLICT (\"name\") DO NOTHING RETURNING \"id\",\"name\""
        );
    }

    #[tokio::test]
    async fn test_without_returning() {
        let (op, mock) = create(
            vec![Record::new().set("name", "Tools")],
            MockExecutor::new().with_rows(vec![Record::new().set("id", 1)]),
        );
        let rows = op.record(Record::new().set("name", "Toys")).return_records(false).exec().await.unwrap();
        assert!(rows.is_empty());
        assert_eq!(
            mock.sql()[0],
            "INSERT INTO \"categories\" (\"name\") VALUES ($1),($2)"
        );
    }

    #[test]
    fn test_select_subset() {
        let (op, _) = create(vec![Record::new().set("name", "Tools")], MockExecutor::new());
        let statement = op.select(Vec::<String>::new()).build().unwrap();
        assert!(statement.sql().ends_with("RETURNING \"id\""));
    }
}
