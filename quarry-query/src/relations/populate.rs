//! Populate requests for batched relation loading.

use std::fmt;
use std::sync::Arc;

use crate::error::QueryError;
use crate::filter::Where;
use crate::types::Sort;

/// Filter and sort applied to junction rows of a many-to-many relation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThroughOptions {
    /// Filter on junction columns.
    pub filter: Where,
    /// Sort on junction columns; defines per-parent ordering.
    pub sorts: Vec<Sort>,
}

/// Request to populate one relation.
///
/// `X` is the executor type; a populate may carry its own executor which is
/// then inherited by its nested populates.
pub struct Populate<X> {
    /// Relation property to populate.
    pub property: String,
    /// Properties to select on the related model.
    pub select: Option<Vec<String>>,
    /// Filter on the related model.
    pub filter: Where,
    /// Sort on the related model.
    pub sorts: Vec<Sort>,
    /// Rows to skip.
    pub skip: Option<u64>,
    /// Maximum rows.
    pub limit: Option<u64>,
    /// Junction options for many-to-many relations.
    pub through: ThroughOptions,
    /// Nested populates on the related rows.
    pub populates: Vec<Populate<X>>,
    /// Executor override.
    pub pool: Option<Arc<X>>,
    pub(crate) error: Option<QueryError>,
}

impl<X> Populate<X> {
    /// Populate a relation with default options.
    pub fn new(property: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            select: None,
            filter: Where::new(),
            sorts: Vec::new(),
            skip: None,
            limit: None,
            through: ThroughOptions::default(),
            populates: Vec::new(),
            pool: None,
            error: None,
        }
    }

    /// Select specific properties of the related model.
    pub fn select<I, S>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Filter the related rows.
    pub fn r#where(mut self, filter: Where) -> Self {
        self.filter = std::mem::take(&mut self.filter).merge(filter);
        self
    }

    /// Sort the related rows.
    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    /// Sort from a string such as `"name asc, id desc"`.
    ///
    /// Parse errors surface when the query executes.
    pub fn sort_by(mut self, sort: &str) -> Self {
        match Sort::parse(sort) {
            Ok(sorts) => self.sorts.extend(sorts),
            Err(err) => self.error = self.error.or(Some(err)),
        }
        self
    }

    /// Skip related rows.
    pub fn skip(mut self, n: u64) -> Self {
        self.skip = Some(n);
        self
    }

    /// Limit related rows.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Filter junction rows of a many-to-many relation.
    pub fn through_where(mut self, filter: Where) -> Self {
        self.through.filter = std::mem::take(&mut self.through.filter).merge(filter);
        self
    }

    /// Sort junction rows of a many-to-many relation.
    pub fn through_sort(mut self, sort: Sort) -> Self {
        self.through.sorts.push(sort);
        self
    }

    /// Populate a relation of the related model.
    pub fn populate(mut self, nested: Populate<X>) -> Self {
        self.populates.push(nested);
        self
    }

    /// Run this populate (and its nested populates) on another executor.
    pub fn pool(mut self, pool: Arc<X>) -> Self {
        self.pool = Some(pool);
        self
    }
}

impl<X> Clone for Populate<X> {
    fn clone(&self) -> Self {
        Self {
            property: self.property.clone(),
            select: self.select.clone(),
            filter: self.filter.clone(),
            sorts: self.sorts.clone(),
            skip: self.skip,
            limit: self.limit,
            through: self.through.clone(),
            populates: self.populates.clone(),
            pool: self.pool.clone(),
            error: self.error.clone(),
        }
    }
}

impl<X> fmt::Debug for Populate<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Populate")
            .field("property", &self.property)
            .field("select", &self.select)
            .field("filter", &self.filter)
            .field("sorts", &self.sorts)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("through", &self.through)
            .field("populates", &self.populates)
            .field("pool", &self.pool.is_some())
            .finish()
    }
}
