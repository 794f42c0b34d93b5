//! Common types used in query building.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{QueryError, QueryResult};

/// Sort order for query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order (A-Z, 0-9, oldest first).
    #[default]
    Asc,
    /// Descending order (Z-A, 9-0, newest first).
    Desc,
}

impl SortOrder {
    /// Get the SQL keyword for this sort order.
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }

    /// Check if this is descending.
    pub fn is_desc(&self) -> bool {
        matches!(self, Self::Desc)
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// A single sort term.
///
/// The property may use dot notation (`alias.property`) to sort on a joined
/// relation or subquery column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sort {
    /// Property (or `alias.property`) to sort on.
    pub property: String,
    /// Direction.
    pub order: SortOrder,
}

impl Sort {
    /// Create a sort term.
    pub fn new(property: impl Into<String>, order: SortOrder) -> Self {
        Self {
            property: property.into(),
            order,
        }
    }

    /// Ascending sort on a property.
    pub fn asc(property: impl Into<String>) -> Self {
        Self::new(property, SortOrder::Asc)
    }

    /// Descending sort on a property.
    pub fn desc(property: impl Into<String>) -> Self {
        Self::new(property, SortOrder::Desc)
    }

    /// Parse a comma separated sort expression such as `"name asc, createdAt desc"`.
    ///
    /// Direction keywords are case-insensitive and default to ascending.
    ///
    /// ```rust
    /// use quarry_query::types::{Sort, SortOrder};
    ///
    /// let sorts = Sort::parse("name, createdAt DESC").unwrap();
    /// assert_eq!(sorts[1], Sort::new("createdAt", SortOrder::Desc));
    /// ```
    pub fn parse(expression: &str) -> QueryResult<Vec<Sort>> {
        let mut sorts = Vec::new();
        for term in expression.split(',') {
            let mut words = term.split_whitespace();
            let Some(property) = words.next() else {
                if term.trim().is_empty() && expression.trim().is_empty() {
                    return Ok(sorts);
                }
                return Err(QueryError::invalid_sort(expression));
            };
            let order = match words.next().map(str::to_ascii_lowercase).as_deref() {
                None | Some("asc") => SortOrder::Asc,
                Some("desc") => SortOrder::Desc,
                Some(_) => return Err(QueryError::invalid_sort(expression)),
            };
            if words.next().is_some() {
                return Err(QueryError::invalid_sort(expression));
            }
            sorts.push(Sort::new(property, order));
        }
        Ok(sorts)
    }

    /// Split the property into an optional alias and the property name.
    pub fn path(&self) -> (Option<&str>, &str) {
        split_path(&self.property)
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.property, self.order.as_sql().to_lowercase())
    }
}

/// Split `alias.property` into its parts; plain names have no alias.
pub fn split_path(path: &str) -> (Option<&str>, &str) {
    match path.split_once('.') {
        Some((alias, property)) => (Some(alias), property),
        None => (None, path),
    }
}

/// Page-based pagination, converted to `LIMIT`/`OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    /// One-based page number.
    pub page: u64,
    /// Rows per page.
    pub limit: u64,
}

impl Pagination {
    /// Create a pagination request. Page numbers below one are treated as one.
    pub fn new(page: u64, limit: u64) -> Self {
        Self {
            page: page.max(1),
            limit,
        }
    }

    /// Rows to skip.
    pub fn offset(&self) -> u64 {
        (self.page.max(1) - 1) * self.limit
    }
}
