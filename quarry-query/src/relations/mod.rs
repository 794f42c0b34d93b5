//! Relation population.
//!
//! Related rows are loaded with one batched statement per relation rather
//! than one statement per parent:
//!
//! - belongs-to: fetch targets by the distinct foreign keys of the parents
//! - has-many and self-reference: fetch children by the parents' primary keys
//! - many-to-many: fetch junction rows, then the targets they reference
//!
//! ## Example
//!
//! ```rust,ignore
//! let products = repository
//!     .find()
//!     .populate(Populate::new("store").select(["name"]))
//!     .populate(
//!         Populate::new("categories")
//!             .through_where(Where::new().eq("active", true))
//!             .through_sort(Sort::asc("ordering")),
//!     )
//!     .exec()
//!     .await?;
//! ```

mod engine;
mod populate;

pub(crate) use engine::populate_records;
pub use populate::{Populate, ThroughOptions};
