//! # Quarry
//!
//! A metadata-driven data mapper for PostgreSQL.
//!
//! Quarry provides:
//! - Model metadata declared once and shared by every query
//! - Predicate documents, joins and aggregate subqueries compiled to parameterized SQL
//! - Batched INSERT with `ON CONFLICT`, UPDATE with optimistic version bumps, DELETE and COUNT
//! - Relation population with exactly one extra query per populated relation
//! - A pooled PostgreSQL executor (feature `postgres`, on by default)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use quarry::prelude::*;
//! use quarry::postgres::{PgExecutor, PgPool};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(
//!         ModelRegistry::new()
//!             .with(
//!                 ModelMetadata::builder("Store", "stores")
//!                     .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
//!                     .column(ColumnMetadata::new("name", ColumnType::String))
//!                     .build()?,
//!             )
//!             .with(
//!                 ModelMetadata::builder("Product", "products")
//!                     .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
//!                     .column(ColumnMetadata::new("name", ColumnType::String).required())
//!                     .belongs_to("store", "Store", ColumnType::Integer)
//!                     .build()?,
//!             ),
//!     );
//!     let executor = Arc::new(PgExecutor::new(PgPool::builder().build()?));
//!
//!     let products = Repository::new(registry, "Product", executor)?;
//!     let rows = products
//!         .find()
//!         .r#where(filter!(name starts_with "Wid"))
//!         .populate(Populate::new("store"))
//!         .exec()
//!         .await?;
//!     println!("{} products", rows.len());
//!     Ok(())
//! }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

/// Query compiler, population engine and repository API.
pub mod query {
    pub use quarry_query::*;
}

/// PostgreSQL executor.
#[cfg(feature = "postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "postgres")))]
pub mod postgres {
    pub use quarry_postgres::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    pub use quarry_query::prelude::*;
}

// Re-export key types at the crate root
pub use quarry_query::{
    ExecuteError, Executor, ModelMetadata, ModelRegistry, QueryError, Record, Repository, Value,
    Where, and_filter, filter, or_filter, record,
};
