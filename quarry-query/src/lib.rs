//! # quarry-query
//!
//! Metadata-driven query compiler and relation population engine for the
//! Quarry data mapper.
//!
//! This crate provides the core query building functionality, including:
//! - Model metadata and a shared registry (`ModelMetadata`, `ModelRegistry`)
//! - Predicate documents compiled to parameterized PostgreSQL
//! - Projections, sorting, `DISTINCT ON`, joins and aggregate subqueries
//! - Statement builders for SELECT, INSERT (with `ON CONFLICT`), UPDATE, DELETE and COUNT
//! - Relation population (`belongsTo`, `hasMany`, `manyToMany`) with one query per relation
//! - A fluent per-model [`Repository`] over any [`Executor`]
//!
//! ## Models
//!
//! ```rust
//! use quarry_query::{ColumnMetadata, ColumnType, ModelMetadata, ModelRegistry};
//!
//! let registry = ModelRegistry::new()
//!     .with(
//!         ModelMetadata::builder("Store", "stores")
//!             .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
//!             .column(ColumnMetadata::new("name", ColumnType::String))
//!             .build()
//!             .unwrap(),
//!     )
//!     .with(
//!         ModelMetadata::builder("Product", "products")
//!             .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
//!             .column(ColumnMetadata::new("name", ColumnType::String).required())
//!             .belongs_to("store", "Store", ColumnType::Integer)
//!             .build()
//!             .unwrap(),
//!     );
//! assert!(registry.contains("product"));
//! ```
//!
//! ## Filters
//!
//! ```rust
//! use quarry_query::{Condition, Where};
//!
//! let filter = Where::new()
//!     .eq("store", 12)
//!     .filter("name", Condition::contains("widget"))
//!     .or([
//!         Where::new().eq("sku", vec!["A-1", "A-2"]),
//!         Where::new().filter("price", Condition::lt(10)),
//!     ]);
//! assert_eq!(filter.len(), 3);
//! ```
//!
//! ## Sorting
//!
//! ```rust
//! use quarry_query::Sort;
//!
//! let sorts = Sort::parse("name asc, createdAt desc").unwrap();
//! assert_eq!(sorts.len(), 2);
//! assert!(sorts[1].order.is_desc());
//! ```
//!
//! ## Error Handling
//!
//! ```rust
//! use quarry_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::unknown_property("Product", "colour");
//! assert_eq!(err.code, ErrorCode::UnknownProperty);
//! ```

#[macro_use]
pub mod logging;

pub mod compiler;
pub mod error;
pub mod filter;
pub mod join;
#[macro_use]
pub mod macros;
pub mod metadata;
pub mod operations;
pub mod options;
pub mod relations;
pub mod repository;
pub mod sql;
pub mod statement;
pub mod subquery;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod traits;
pub mod types;
pub mod value;

pub use error::{ErrorCode, ErrorContext, ExecuteError, QueryError, QueryResult};
pub use filter::{Comparison, Condition, Operand, PatternKind, Where, WhereEntry};
pub use join::{Join, JoinKind, RelationJoin, SubqueryJoin};
pub use metadata::{
    ColumnMetadata, ColumnType, DefaultValue, ModelMetadata, ModelMetadataBuilder, ModelRegistry,
    RelationKind, RelationMetadata, ThroughMetadata,
};
pub use operations::{
    CountOperation, CreateOperation, DeleteOperation, FindManyOperation, FindOneOperation,
    UpdateOperation,
};
pub use options::QueryOptions;
pub use relations::{Populate, ThroughOptions};
pub use repository::Repository;
pub use sql::CompiledStatement;
pub use statement::{
    ConflictAction, InsertOptions, OnConflict, Returning, compile_count, compile_count_joined, compile_delete,
    compile_insert, compile_select, compile_update,
};
pub use subquery::{Aggregate, AggregateFn, Subquery};
pub use traits::{BoxFuture, Executor};
pub use types::{Pagination, Sort, SortOrder};
pub use value::{Record, Value};

// Re-export logging utilities
pub use logging::{get_log_format, get_log_level, init as init_logging, init_with_level, is_debug_enabled};

#[doc(hidden)]
pub use tracing as __tracing;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::error::{ExecuteError, QueryError, QueryResult};
    pub use crate::filter::{Condition, Where};
    pub use crate::join::Join;
    pub use crate::metadata::{ColumnMetadata, ColumnType, ModelMetadata, ModelRegistry};
    pub use crate::operations::*;
    pub use crate::relations::Populate;
    pub use crate::repository::Repository;
    pub use crate::subquery::{Aggregate, Subquery};
    pub use crate::traits::Executor;
    pub use crate::types::{Sort, SortOrder};
    pub use crate::value::{Record, Value};
    pub use crate::{and_filter, filter, or_filter, record};
}
