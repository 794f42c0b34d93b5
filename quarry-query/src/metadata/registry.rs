//! Registry of model metadata.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{QueryError, QueryResult};

use super::{ModelMetadata, RelationKind, RelationMetadata};

/// Lookup table from model name to metadata.
///
/// Names are matched case-insensitively. The registry is built once and then
/// shared (typically behind an `Arc`) by every repository.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: HashMap<String, Arc<ModelMetadata>>,
}

impl ModelRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a model, replacing any model with the same name.
    pub fn register(&mut self, model: ModelMetadata) -> &mut Self {
        self.models
            .insert(model.name.to_lowercase(), Arc::new(model));
        self
    }

    /// Register a model, returning the registry for chaining.
    pub fn with(mut self, model: ModelMetadata) -> Self {
        self.register(model);
        self
    }

    /// Look up a model by name.
    pub fn get(&self, name: &str) -> QueryResult<Arc<ModelMetadata>> {
        self.models
            .get(&name.to_lowercase())
            .cloned()
            .ok_or_else(|| QueryError::unknown_model(name))
    }

    /// Check whether a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(&name.to_lowercase())
    }

    /// Number of registered models.
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Look up a relation on a model along with the model it targets.
    pub fn relation<'m>(
        &self,
        model: &'m ModelMetadata,
        property: &str,
    ) -> QueryResult<(&'m RelationMetadata, Arc<ModelMetadata>)> {
        let relation = model
            .relation(property)
            .ok_or_else(|| QueryError::unknown_relation(&model.name, property))?;
        let target = self.get(&relation.model)?;
        Ok((relation, target))
    }

    /// Check that every relation refers to registered models and properties.
    pub fn validate(&self) -> QueryResult<()> {
        for model in self.models.values() {
            for relation in model.relations() {
                let target = self.get(&relation.model)?;
                match relation.kind {
                    RelationKind::BelongsTo => {}
                    RelationKind::HasMany | RelationKind::SelfReference => {
                        let via = relation.via.as_deref().unwrap_or_default();
                        if target.column(via).is_none() {
                            return Err(QueryError::invalid_model(
                                &model.name,
                                format!(
                                    "relation `{}` uses via `{}`, which is not a column of {}",
                                    relation.property_name, via, target.name
                                ),
                            ));
                        }
                    }
                    RelationKind::ManyToMany => {
                        let Some(through) = &relation.through else {
                            return Err(QueryError::invalid_model(
                                &model.name,
                                format!("relation `{}` has no junction model", relation.property_name),
                            ));
                        };
                        let junction = self.get(&through.model)?;
                        for property in [&through.source, &through.target] {
                            if junction.column(property).is_none() {
                                return Err(QueryError::invalid_model(
                                    &model.name,
                                    format!(
                                        "junction {} has no column `{}`",
                                        junction.name, property
                                    ),
                                ));
                            }
                        }
                    }
                }
            }
        }
        Ok(())
    }
}
