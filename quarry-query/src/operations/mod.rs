//! Executable operations for the fluent API.
//!
//! This module provides the operation types returned by
//! [`Repository`](crate::repository::Repository):
//! - `FindManyOperation` - Find records, optionally with relations populated
//! - `FindOneOperation` - Find the first matching record
//! - `CountOperation` - Count matching records
//! - `CreateOperation` - Insert one or more records
//! - `UpdateOperation` - Update matching records
//! - `DeleteOperation` - Delete matching records
//!
//! Every operation accumulates options, compiles them with `build()` and runs
//! the statement with `exec()`.

mod count;
mod create;
mod delete;
mod find_many;
mod find_one;
mod update;

use std::sync::Arc;

use crate::metadata::{ModelMetadata, ModelRegistry};

pub use count::CountOperation;
pub use create::CreateOperation;
pub use delete::DeleteOperation;
pub use find_many::FindManyOperation;
pub use find_one::FindOneOperation;
pub use update::UpdateOperation;

/// Registry, model and executor an operation runs against.
pub struct OperationContext<X> {
    pub(crate) registry: Arc<ModelRegistry>,
    pub(crate) model: Arc<ModelMetadata>,
    pub(crate) executor: Arc<X>,
}

impl<X> OperationContext<X> {
    /// Bundle the pieces an operation needs.
    pub fn new(registry: Arc<ModelRegistry>, model: Arc<ModelMetadata>, executor: Arc<X>) -> Self {
        Self {
            registry,
            model,
            executor,
        }
    }

    /// The model being operated on.
    pub fn model(&self) -> &ModelMetadata {
        &self.model
    }
}

impl<X> Clone for OperationContext<X> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
            model: Arc::clone(&self.model),
            executor: Arc::clone(&self.executor),
        }
    }
}
