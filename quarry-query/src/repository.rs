//! Per-model entry point for the fluent API.
//!
//! A [`Repository`] binds one model to a registry and an executor and hands
//! out operation builders. It holds no per-query state, so one instance can
//! be cloned and shared freely across tasks.
//!
//! ```rust,ignore
//! let products = Repository::new(registry, "Product", executor)?;
//!
//! let (page, total) = products
//!     .find()
//!     .r#where(Where::new().eq("store", 1))
//!     .sort_by("name asc")
//!     .paginate(2, 20)
//!     .populate(Populate::new("categories").through_sort(Sort::asc("ordering")))
//!     .exec_with_count()
//!     .await?;
//! ```

use std::sync::Arc;

use crate::error::QueryResult;
use crate::filter::Where;
use crate::metadata::{ModelMetadata, ModelRegistry};
use crate::operations::{
    CountOperation, CreateOperation, DeleteOperation, FindManyOperation, FindOneOperation,
    OperationContext, UpdateOperation,
};
use crate::subquery::Subquery;
use crate::traits::Executor;
use crate::value::Record;

/// Operation factory for a single model.
pub struct Repository<X: Executor> {
    context: OperationContext<X>,
}

impl<X: Executor> Repository<X> {
    /// Create a repository for the named model.
    ///
    /// Fails with `UnknownModel` when the registry has no such model.
    pub fn new(registry: Arc<ModelRegistry>, model: &str, executor: Arc<X>) -> QueryResult<Self> {
        let model = registry.get(model)?;
        Ok(Self {
            context: OperationContext::new(registry, model, executor),
        })
    }

    /// The model this repository operates on.
    pub fn model(&self) -> &ModelMetadata {
        self.context.model()
    }

    /// The shared model registry.
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.context.registry
    }

    /// Find matching records.
    pub fn find(&self) -> FindManyOperation<X> {
        FindManyOperation::new(self.context.clone())
    }

    /// Find the first matching record.
    pub fn find_one(&self) -> FindOneOperation<X> {
        FindOneOperation::new(self.context.clone())
    }

    /// Count matching records.
    pub fn count(&self) -> CountOperation<X> {
        CountOperation::new(self.context.clone())
    }

    /// Insert a single record.
    pub fn create(&self, record: Record) -> CreateOperation<X> {
        CreateOperation::new(self.context.clone(), vec![record])
    }

    /// Insert several records with one statement.
    pub fn create_many(&self, records: Vec<Record>) -> CreateOperation<X> {
        CreateOperation::new(self.context.clone(), records)
    }

    /// Update records matching the filter.
    pub fn update(&self, filter: Where, values: Record) -> UpdateOperation<X> {
        UpdateOperation::new(self.context.clone(), filter, values)
    }

    /// Delete records matching the filter.
    pub fn destroy(&self, filter: Where) -> DeleteOperation<X> {
        DeleteOperation::new(self.context.clone(), filter)
    }

    /// Start a subquery over this model.
    pub fn subquery(&self) -> Subquery {
        Subquery::new(Arc::clone(&self.context.model))
    }
}

impl<X: Executor> Clone for Repository<X> {
    fn clone(&self) -> Self {
        Self {
            context: self.context.clone(),
        }
    }
}

impl<X: Executor> std::fmt::Debug for Repository<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("model", &self.context.model.name)
            .finish()
    }
}
