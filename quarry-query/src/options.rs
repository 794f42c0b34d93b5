//! Per-call query options consumed by the SELECT compiler.

use crate::filter::Where;
use crate::join::Join;
use crate::types::Sort;

/// Options for a SELECT statement.
///
/// Built incrementally by [`FindManyOperation`](crate::operations::FindManyOperation)
/// and by the population engine for its secondary fetches.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryOptions {
    /// Properties to select; `None` selects every column.
    pub select: Option<Vec<String>>,
    /// Filter.
    pub filter: Where,
    /// Sorts, in order.
    pub sorts: Vec<Sort>,
    /// Rows to skip.
    pub skip: Option<u64>,
    /// Maximum rows.
    pub limit: Option<u64>,
    /// DISTINCT ON properties; must prefix the sorts.
    pub distinct_on: Vec<String>,
    /// Joins, compiled in order.
    pub joins: Vec<Join>,
    /// Append `count(*) OVER()` as `__total_count__`.
    pub with_count: bool,
}

impl QueryOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }
}
