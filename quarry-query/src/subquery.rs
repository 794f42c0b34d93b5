//! Subquery descriptors.
//!
//! A [`Subquery`] is a query that has not been compiled yet. It can be embedded
//! as an `IN`/`EXISTS` operand, as the right-hand side of a comparison, or as a
//! joined derived table. Its SQL is produced by the statement that embeds it,
//! so placeholders are numbered in that statement's sequence.
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_query::metadata::{ColumnMetadata, ColumnType, ModelMetadata};
//! use quarry_query::subquery::{Aggregate, Subquery};
//! use quarry_query::filter::Where;
//!
//! let product = Arc::new(
//!     ModelMetadata::builder("Product", "products")
//!         .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
//!         .belongs_to("store", "Store", ColumnType::Integer)
//!         .build()
//!         .unwrap(),
//! );
//!
//! let counts = Subquery::new(product)
//!     .select(["store"])
//!     .aggregate(Aggregate::count().alias("productCount"))
//!     .r#where(Where::new().eq("active", true))
//!     .group_by(["store"])
//!     .having("productCount", ">", 5);
//! assert_eq!(counts.aggregates().len(), 1);
//! ```

use std::sync::Arc;

use crate::filter::Where;
use crate::metadata::ModelMetadata;
use crate::types::Sort;
use crate::value::Value;

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFn {
    /// `COUNT`
    Count,
    /// `SUM`
    Sum,
    /// `AVG`
    Avg,
    /// `MIN`
    Min,
    /// `MAX`
    Max,
}

impl AggregateFn {
    /// SQL function name.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Count => "COUNT",
            Self::Sum => "SUM",
            Self::Avg => "AVG",
            Self::Min => "MIN",
            Self::Max => "MAX",
        }
    }

    /// Alias used when none is given.
    pub fn default_alias(&self) -> &'static str {
        match self {
            Self::Count => "count",
            Self::Sum => "sum",
            Self::Avg => "avg",
            Self::Min => "min",
            Self::Max => "max",
        }
    }
}

/// An aggregate expression in a subquery projection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    /// Function.
    pub function: AggregateFn,
    /// Property to aggregate; `None` means `*` (only meaningful for COUNT).
    pub property: Option<String>,
    /// Aggregate distinct values only.
    pub distinct: bool,
    /// Output alias.
    pub alias: Option<String>,
}

impl Aggregate {
    fn new(function: AggregateFn, property: Option<String>) -> Self {
        Self {
            function,
            property,
            distinct: false,
            alias: None,
        }
    }

    /// `COUNT(*)`.
    pub fn count() -> Self {
        Self::new(AggregateFn::Count, None)
    }

    /// `COUNT("column")`.
    pub fn count_of(property: impl Into<String>) -> Self {
        Self::new(AggregateFn::Count, Some(property.into()))
    }

    /// `SUM("column")`.
    pub fn sum(property: impl Into<String>) -> Self {
        Self::new(AggregateFn::Sum, Some(property.into()))
    }

    /// `AVG("column")`.
    pub fn avg(property: impl Into<String>) -> Self {
        Self::new(AggregateFn::Avg, Some(property.into()))
    }

    /// `MIN("column")`.
    pub fn min(property: impl Into<String>) -> Self {
        Self::new(AggregateFn::Min, Some(property.into()))
    }

    /// `MAX("column")`.
    pub fn max(property: impl Into<String>) -> Self {
        Self::new(AggregateFn::Max, Some(property.into()))
    }

    /// Aggregate distinct values only.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Set the output alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Output alias, falling back to the function name.
    pub fn output_name(&self) -> &str {
        self.alias
            .as_deref()
            .unwrap_or_else(|| self.function.default_alias())
    }
}

/// A HAVING condition on an aggregate alias.
///
/// The operator is kept as given and validated when the subquery is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct Having {
    /// Aggregate alias.
    pub alias: String,
    /// Operator string.
    pub operator: String,
    /// Operand; must be a finite number.
    pub value: Value,
}

/// A deferred query usable as an operand inside another statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Subquery {
    model: Arc<ModelMetadata>,
    select: Option<Vec<String>>,
    aggregates: Vec<Aggregate>,
    filter: Where,
    group_by: Vec<String>,
    having: Vec<Having>,
    sorts: Vec<Sort>,
    limit: Option<u64>,
    distinct_on: Vec<String>,
}

impl Subquery {
    /// Start a subquery over a model.
    pub fn new(model: Arc<ModelMetadata>) -> Self {
        Self {
            model,
            select: None,
            aggregates: Vec::new(),
            filter: Where::new(),
            group_by: Vec::new(),
            having: Vec::new(),
            sorts: Vec::new(),
            limit: None,
            distinct_on: Vec::new(),
        }
    }

    /// Select properties.
    pub fn select(mut self, properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.select = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Add an aggregate to the projection.
    pub fn aggregate(mut self, aggregate: Aggregate) -> Self {
        self.aggregates.push(aggregate);
        self
    }

    /// Add a `COUNT(*)` aggregate.
    pub fn count(self) -> Self {
        self.aggregate(Aggregate::count())
    }

    /// Add a `SUM` aggregate.
    pub fn sum(self, property: impl Into<String>) -> Self {
        self.aggregate(Aggregate::sum(property))
    }

    /// Add an `AVG` aggregate.
    pub fn avg(self, property: impl Into<String>) -> Self {
        self.aggregate(Aggregate::avg(property))
    }

    /// Add a `MIN` aggregate.
    pub fn min(self, property: impl Into<String>) -> Self {
        self.aggregate(Aggregate::min(property))
    }

    /// Add a `MAX` aggregate.
    pub fn max(self, property: impl Into<String>) -> Self {
        self.aggregate(Aggregate::max(property))
    }

    /// Add a filter; repeated calls are AND-combined.
    pub fn r#where(mut self, filter: Where) -> Self {
        self.filter = std::mem::take(&mut self.filter).merge(filter);
        self
    }

    /// Group by properties.
    pub fn group_by(mut self, properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.group_by = properties.into_iter().map(Into::into).collect();
        self
    }

    /// Add a HAVING condition on an aggregate alias.
    pub fn having(
        mut self,
        alias: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.having.push(Having {
            alias: alias.into(),
            operator: operator.into(),
            value: value.into(),
        });
        self
    }

    /// Add a sort.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Limit the number of rows.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Keep one row per distinct value of the given properties.
    pub fn distinct_on(mut self, properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.distinct_on = properties.into_iter().map(Into::into).collect();
        self
    }

    /// The model queried.
    pub fn model(&self) -> &Arc<ModelMetadata> {
        &self.model
    }

    /// Selected properties, if set.
    pub fn selected(&self) -> Option<&[String]> {
        self.select.as_deref()
    }

    /// Aggregates.
    pub fn aggregates(&self) -> &[Aggregate] {
        &self.aggregates
    }

    /// The filter.
    pub fn filter(&self) -> &Where {
        &self.filter
    }

    /// GROUP BY properties.
    pub fn grouping(&self) -> &[String] {
        &self.group_by
    }

    /// HAVING conditions.
    pub fn having_conditions(&self) -> &[Having] {
        &self.having
    }

    /// Sorts.
    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    /// Row limit.
    pub fn row_limit(&self) -> Option<u64> {
        self.limit
    }

    /// DISTINCT ON properties.
    pub fn distinct_columns(&self) -> &[String] {
        &self.distinct_on
    }
}
