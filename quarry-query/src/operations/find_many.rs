//! FindMany operation for querying multiple records.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::compiler::selected_properties;
use crate::error::{ExecuteError, QueryError, QueryResult};
use crate::filter::Where;
use crate::join::Join;
use crate::options::QueryOptions;
use crate::relations::{Populate, populate_records};
use crate::sql::CompiledStatement;
use crate::statement::{TOTAL_COUNT_COLUMN, compile_count_joined, compile_select};
use crate::traits::{Executor, run};
use crate::types::{Pagination, Sort};
use crate::value::{Record, Value};

use super::OperationContext;

/// A query operation that finds multiple records.
///
/// # Example
///
/// ```rust,ignore
/// let products = repository
///     .find()
///     .r#where(Where::new().filter("name", Condition::contains("widget")))
///     .sort_by("createdAt desc")
///     .paginate(2, 25)
///     .populate(Populate::new("store"))
///     .exec()
///     .await?;
/// ```
pub struct FindManyOperation<X: Executor> {
    context: OperationContext<X>,
    options: QueryOptions,
    populates: Vec<Populate<X>>,
    error: Option<QueryError>,
}

impl<X: Executor> FindManyOperation<X> {
    /// Create a new FindMany operation.
    pub fn new(context: OperationContext<X>) -> Self {
        Self {
            context,
            options: QueryOptions::new(),
            populates: Vec::new(),
            error: None,
        }
    }

    /// Add a filter; repeated calls are AND-ed.
    pub fn r#where(mut self, filter: Where) -> Self {
        self.options.filter = std::mem::take(&mut self.options.filter).merge(filter);
        self
    }

    /// Select specific properties. The primary key is always included.
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.select = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Add a sort.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.options.sorts.push(sort);
        self
    }

    /// Add sorts from a string such as `"name asc, createdAt desc"`.
    ///
    /// Parse errors surface from `build()` and `exec()`.
    pub fn sort_by(mut self, sort: &str) -> Self {
        match Sort::parse(sort) {
            Ok(sorts) => self.options.sorts.extend(sorts),
            Err(err) => self.error = self.error.or(Some(err)),
        }
        self
    }

    /// Skip a number of records.
    pub fn skip(mut self, n: u64) -> Self {
        self.options.skip = Some(n);
        self
    }

    /// Limit the number of records.
    pub fn limit(mut self, n: u64) -> Self {
        self.options.limit = Some(n);
        self
    }

    /// Page through results; `page` is one-based.
    pub fn paginate(self, page: u64, limit: u64) -> Self {
        let pagination = Pagination::new(page, limit);
        self.skip(pagination.offset()).limit(pagination.limit)
    }

    /// Return one row per distinct value of these properties.
    ///
    /// The properties must be the leading sorts.
    pub fn distinct_on<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.distinct_on = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Join a relation or subquery.
    pub fn join(mut self, join: impl Into<Join>) -> Self {
        self.options.joins.push(join.into());
        self
    }

    /// Populate a relation on the results.
    pub fn populate(mut self, populate: Populate<X>) -> Self {
        self.populates.push(populate);
        self
    }

    /// Run on another executor. Populates without their own pool inherit it.
    pub fn with_pool(mut self, executor: Arc<X>) -> Self {
        self.context.executor = executor;
        self
    }

    /// Current options.
    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    /// Build the SQL query.
    pub fn build(&self) -> QueryResult<CompiledStatement> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        compile_select(&self.context.registry, &self.context.model, &self.options)
    }

    /// Execute the query and populate requested relations.
    pub async fn exec(self) -> Result<Vec<Record>, ExecuteError<X::Error>> {
        let statement = self.build()?;
        self.fetch(&statement).await
    }

    /// Execute the query and also return the total number of matching rows,
    /// ignoring skip and limit.
    pub async fn exec_with_count(mut self) -> Result<(Vec<Record>, i64), ExecuteError<X::Error>> {
        self.options.with_count = true;
        let statement = self.build()?;
        let mut records = self.fetch(&statement).await?;

        let mut total = None;
        for record in &mut records {
            if let Some(value) = record.remove(TOTAL_COUNT_COLUMN) {
                total = total.or(Some(count_value(&value)?));
            }
        }
        let total = match total {
            Some(total) => total,
            // Skipped past the last row: the window had nothing to count over.
            None if self.options.skip.is_some_and(|skip| skip > 0) => {
                let statement = compile_count_joined(
                    &self.context.registry,
                    &self.context.model,
                    &self.options.joins,
                    &self.options.filter,
                )?;
                let rows = run(self.context.executor.as_ref(), &statement).await?;
                first_count(&rows)?
            }
            None => 0,
        };
        debug!(model = %self.context.model.name, rows = records.len(), total, "Counted results");
        Ok((records, total))
    }

    /// Execute the query and deserialize every record.
    pub async fn exec_as<T: DeserializeOwned>(self) -> Result<Vec<T>, ExecuteError<X::Error>> {
        let records = self.exec().await?;
        records
            .iter()
            .map(|record| record.deserialize::<T>().map_err(ExecuteError::from))
            .collect()
    }

    async fn fetch(&self, statement: &CompiledStatement) -> Result<Vec<Record>, ExecuteError<X::Error>> {
        let context = &self.context;
        let mut records = run(context.executor.as_ref(), statement).await?;
        if !self.populates.is_empty() && !records.is_empty() {
            let selected = selected_properties(&context.model, self.options.select.as_deref())?;
            populate_records(
                &context.registry,
                &context.model,
                &mut records,
                &selected,
                &self.populates,
                &context.executor,
            )
            .await?;
        }
        Ok(records)
    }
}

/// Read a count column, which drivers may return as an integer or a string.
pub(crate) fn count_value(value: &Value) -> QueryResult<i64> {
    match value {
        Value::Int(n) => Ok(*n),
        Value::String(s) => s
            .parse()
            .map_err(|_| QueryError::deserialization(format!("Invalid count value `{}`", s))),
        other => Err(QueryError::deserialization(format!("Invalid count value {:?}", other))),
    }
}

/// Read the `count` column of the first row.
pub(crate) fn first_count(rows: &[Record]) -> QueryResult<i64> {
    rows.first()
        .and_then(|row| row.get("count"))
        .map(count_value)
        .unwrap_or_else(|| Err(QueryError::deserialization("Count query returned no rows")))
}
