//! FindOne operation for querying a single record.

use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::error::{ExecuteError, QueryResult};
use crate::filter::Where;
use crate::join::Join;
use crate::relations::Populate;
use crate::sql::CompiledStatement;
use crate::traits::Executor;
use crate::types::Sort;
use crate::value::Record;

use super::{FindManyOperation, OperationContext};

/// A query operation that finds the first matching record.
///
/// # Example
///
/// ```rust,ignore
/// let store = repository
///     .find_one()
///     .r#where(Where::new().eq("name", "Acme"))
///     .populate(Populate::new("products"))
///     .exec()
///     .await?;
/// ```
pub struct FindOneOperation<X: Executor> {
    inner: FindManyOperation<X>,
}

impl<X: Executor> FindOneOperation<X> {
    /// Create a new FindOne operation.
    pub fn new(context: OperationContext<X>) -> Self {
        Self {
            inner: FindManyOperation::new(context).limit(1),
        }
    }

    /// Add a filter; repeated calls are AND-ed.
    pub fn r#where(mut self, filter: Where) -> Self {
        self.inner = self.inner.r#where(filter);
        self
    }

    /// Select specific properties.
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inner = self.inner.select(properties);
        self
    }

    /// Add a sort.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.inner = self.inner.sort(sort);
        self
    }

    /// Add sorts from a string.
    pub fn sort_by(mut self, sort: &str) -> Self {
        self.inner = self.inner.sort_by(sort);
        self
    }

    /// Skip a number of records.
    pub fn skip(mut self, n: u64) -> Self {
        self.inner = self.inner.skip(n);
        self
    }

    /// Join a relation or subquery.
    pub fn join(mut self, join: impl Into<Join>) -> Self {
        self.inner = self.inner.join(join);
        self
    }

    /// Populate a relation on the result.
    pub fn populate(mut self, populate: Populate<X>) -> Self {
        self.inner = self.inner.populate(populate);
        self
    }

    /// Run on another executor.
    pub fn with_pool(mut self, executor: Arc<X>) -> Self {
        self.inner = self.inner.with_pool(executor);
        self
    }

    /// Build the SQL query.
    pub fn build(&self) -> QueryResult<CompiledStatement> {
        self.inner.build()
    }

    /// Execute the query.
    pub async fn exec(self) -> Result<Option<Record>, ExecuteError<X::Error>> {
        Ok(self.inner.exec().await?.into_iter().next())
    }

    /// Execute the query and deserialize the record.
    pub async fn exec_as<T: DeserializeOwned>(self) -> Result<Option<T>, ExecuteError<X::Error>> {
        Ok(self.inner.exec_as::<T>().await?.into_iter().next())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures;
    use crate::testing::MockExecutor;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn find_one(mock: MockExecutor) -> (FindOneOperation<MockExecutor>, Arc<MockExecutor>) {
        let registry = Arc::new(fixtures::registry());
        let model = registry.get("Store").unwrap();
        let mock = Arc::new(mock);
        (
            FindOneOperation::new(OperationContext::new(registry, model, Arc::clone(&mock))),
            mock,
        )
    }

    #[test]
    fn test_applies_limit_one() {
        let (op, _) = find_one(MockExecutor::new());
        let statement = op.r#where(Where::new().eq("name", "Acme")).build().unwrap();
        assert_eq!(
            statement.sql(),
            "SELECT \"id\",\"name\" FROM \"stores\" WHERE \"name\"=$1 LIMIT 1"
        );
    }

    #[tokio::test]
    async fn test_returns_first_or_none() {
        let (op, _) = find_one(MockExecutor::new().with_rows(vec![Record::new().set("id", 3)]));
        let store = op.exec().await.unwrap().unwrap();
        assert_eq!(store.get("id"), Some(&Value::Int(3)));

        let (op, _) = find_one(MockExecutor::new());
        assert!(op.exec().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_populates_has_many() {
        let (op, mock) = find_one(
            MockExecutor::new()
                .with_rows(vec![Record::new().set("id", 3).set("name", "Acme")])
                .with_rows(vec![Record::new().set("id", 8).set("name", "Widget").set("store", 3)]),
        );
        let store = op.populate(Populate::new("products")).exec().await.unwrap().unwrap();
        assert_eq!(mock.round_trips(), 2);
        assert_eq!(store.get("products").and_then(Value::as_list).map(<[Value]>::len), Some(1));
    }
}
