//! Compilation of predicates, projections, joins and subqueries into SQL.
//!
//! Every compiler function is a pure function of its inputs plus a
//! [`Params`](crate::sql::Params) accumulator; fragments must be compiled in
//! the order they appear in the final statement so placeholders line up.

mod join;
mod predicate;
mod projection;
mod subquery;

use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};
use crate::metadata::{ColumnMetadata, ColumnType, ModelMetadata, ModelRegistry};
use crate::sql::quote;
use crate::types::split_path;
use crate::value::Value;

pub use join::{CompiledJoins, compile_joins};
pub use predicate::compile_where;
pub use projection::{
    compile_distinct_on, compile_order_by, compile_select_list, selected_properties,
};
pub use subquery::{CompiledSubquery, SubqueryUsage, compile_subquery};

/// A column exposed by a derived table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputColumn {
    /// Column name as selected (the property name or aggregate alias).
    pub name: String,
    /// Storage type, used for array parameter casts.
    pub column_type: ColumnType,
}

/// What a join alias refers to.
#[derive(Debug, Clone)]
pub enum JoinTarget {
    /// A joined model.
    Model(Arc<ModelMetadata>),
    /// A joined subquery and its output columns.
    Subquery(Vec<OutputColumn>),
}

/// Alias table used to resolve `alias.property` paths.
pub type AliasTable = IndexMap<String, JoinTarget>;

/// A resolved column reference.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    /// SQL text, e.g. `"name"`, `"products"."name"` or `"store"."name"`.
    pub sql: String,
    /// Path as written by the caller.
    pub path: String,
    /// Model (or alias) the column belongs to, for error messages.
    pub owner: String,
    /// Storage type.
    pub column_type: ColumnType,
    /// For belongs-to columns, the model the value refers to.
    pub related_model: Option<String>,
}

/// Compilation scope: the model being queried and the aliases visible to it.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    /// Registry used to resolve related models.
    pub registry: &'a ModelRegistry,
    /// Model whose properties unqualified paths refer to.
    pub model: &'a ModelMetadata,
    aliases: AliasTable,
    qualifier: Option<String>,
}

impl<'a> Scope<'a> {
    /// Scope over a model with no joins; columns are rendered unqualified.
    pub fn new(registry: &'a ModelRegistry, model: &'a ModelMetadata) -> Self {
        Self {
            registry,
            model,
            aliases: AliasTable::new(),
            qualifier: None,
        }
    }

    /// Qualify base columns with the table name.
    pub fn qualified(mut self) -> Self {
        self.qualifier = Some(self.model.quoted_table());
        self
    }

    /// Qualify base columns with an alias.
    pub fn with_qualifier(mut self, alias: &str) -> Self {
        self.qualifier = Some(quote(alias));
        self
    }

    /// Make join aliases resolvable.
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Visible aliases.
    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Render a base column, qualified if the scope requires it.
    pub fn column_sql(&self, column: &ColumnMetadata) -> String {
        match &self.qualifier {
            Some(qualifier) => format!("{}.{}", qualifier, column.quoted()),
            None => column.quoted(),
        }
    }

    /// Look up a column of the base model by property name.
    pub fn column(&self, property: &str) -> QueryResult<&'a ColumnMetadata> {
        self.model
            .column(property)
            .ok_or_else(|| QueryError::unknown_property(&self.model.name, property))
    }

    /// Resolve a property or `alias.property` path.
    pub fn resolve(&self, path: &str) -> QueryResult<ColumnRef> {
        match split_path(path) {
            (None, property) => {
                let column = self.column(property)?;
                Ok(ColumnRef {
                    sql: self.column_sql(column),
                    path: path.to_string(),
                    owner: self.model.name.clone(),
                    column_type: column.column_type,
                    related_model: column.model.clone(),
                })
            }
            (Some(alias), property) => match self.aliases.get(alias) {
                Some(JoinTarget::Model(target)) => {
                    let column = target
                        .column(property)
                        .ok_or_else(|| QueryError::unknown_property(&target.name, property))?;
                    Ok(ColumnRef {
                        sql: format!("{}.{}", quote(alias), column.quoted()),
                        path: path.to_string(),
                        owner: target.name.clone(),
                        column_type: column.column_type,
                        related_model: column.model.clone(),
                    })
                }
                Some(JoinTarget::Subquery(columns)) => {
                    let column = columns
                        .iter()
                        .find(|c| c.name == property)
                        .ok_or_else(|| QueryError::unknown_property(alias, property))?;
                    Ok(ColumnRef {
                        sql: format!("{}.{}", quote(alias), quote(&column.name)),
                        path: path.to_string(),
                        owner: alias.to_string(),
                        column_type: column.column_type,
                        related_model: None,
                    })
                }
                None => Err(QueryError::unknown_alias(&self.model.name, path)),
            },
        }
    }
}

/// Reduce a value for storage or comparison against a column.
///
/// Records become the value of the related model's primary key (`id` when the
/// column is not a belongs-to key); on JSON columns they become JSON documents.
pub(crate) fn reduce_value(
    registry: &ModelRegistry,
    column: &ColumnRef,
    value: &Value,
) -> QueryResult<Value> {
    match value {
        Value::Record(record) if column.column_type.is_json() => Ok(Value::Json(record.to_json())),
        Value::Record(record) => {
            let key = match &column.related_model {
                Some(model) => registry.get(model)?.primary_key().property_name.clone(),
                None => "id".to_string(),
            };
            record
                .get(&key)
                .cloned()
                .ok_or_else(|| QueryError::undefined_value(&column.owner, &column.path))
        }
        Value::List(items) => items
            .iter()
            .map(|item| reduce_value(registry, column, item))
            .collect::<QueryResult<Vec<_>>>()
            .map(Value::List),
        other => Ok(other.clone()),
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    //! Models shared by compiler and statement tests.

    use crate::metadata::{ColumnMetadata, ColumnType, ModelMetadata, ModelRegistry};

    pub fn registry() -> ModelRegistry {
        ModelRegistry::new()
            .with(
                ModelMetadata::builder("Store", "stores")
                    .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnMetadata::new("name", ColumnType::String).max_length(64))
                    .has_many("products", "Product", "store")
                    .build()
                    .unwrap(),
            )
            .with(
                ModelMetadata::builder("Product", "products")
                    .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnMetadata::new("name", ColumnType::String).required().max_length(20))
                    .column(ColumnMetadata::new("sku", ColumnType::String))
                    .column(ColumnMetadata::new("price", ColumnType::Float))
                    .column(ColumnMetadata::new("aliases", ColumnType::StringArray).column_name("alias_names"))
                    .column(ColumnMetadata::new("serialNumbers", ColumnType::Array))
                    .column(ColumnMetadata::new("metadata", ColumnType::Json))
                    .column(ColumnMetadata::new("uid", ColumnType::Uuid))
                    .column(ColumnMetadata::new("createdAt", ColumnType::Date).created_at())
                    .column(ColumnMetadata::new("updatedAt", ColumnType::Date).updated_at())
                    .belongs_to("store", "Store", ColumnType::Integer)
                    .many_to_many("categories", "Category", "ProductCategory", "product", "category")
                    .build()
                    .unwrap(),
            )
            .with(
                ModelMetadata::builder("Category", "categories")
                    .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnMetadata::new("name", ColumnType::String))
                    .build()
                    .unwrap(),
            )
            .with(
                ModelMetadata::builder("ProductCategory", "product__category")
                    .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnMetadata::new("ordering", ColumnType::Integer))
                    .belongs_to("product", "Product", ColumnType::Integer)
                    .belongs_to("category", "Category", ColumnType::Integer)
                    .build()
                    .unwrap(),
            )
            .with(
                ModelMetadata::builder("Inventory", "inventory")
                    .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
                    .column(ColumnMetadata::new("quantity", ColumnType::Integer))
                    .column(ColumnMetadata::new("version", ColumnType::Integer).version())
                    .belongs_to("product", "Product", ColumnType::Integer)
                    .build()
                    .unwrap(),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn test_resolve_base_and_qualified() {
        let registry = fixtures::registry();
        let product = registry.get("Product").unwrap();
        let scope = Scope::new(&registry, &product);
        assert_eq!(scope.resolve("aliases").unwrap().sql, "\"alias_names\"");
        let scope = scope.qualified();
        assert_eq!(scope.resolve("store").unwrap().sql, "\"products\".\"store_id\"");
    }

    #[test]
    fn test_resolve_alias_paths() {
        let registry = fixtures::registry();
        let product = registry.get("Product").unwrap();
        let mut aliases = AliasTable::new();
        aliases.insert("store".into(), JoinTarget::Model(registry.get("Store").unwrap()));
        aliases.insert(
            "stats".into(),
            JoinTarget::Subquery(vec![OutputColumn {
                name: "count".into(),
                column_type: ColumnType::Integer,
            }]),
        );
        let scope = Scope::new(&registry, &product).with_aliases(aliases);

        assert_eq!(scope.resolve("store.name").unwrap().sql, "\"store\".\"name\"");
        assert_eq!(scope.resolve("stats.count").unwrap().sql, "\"stats\".\"count\"");
        assert_eq!(
            scope.resolve("missing.name").unwrap_err().code,
            ErrorCode::UnknownAlias
        );
        assert_eq!(
            scope.resolve("store.nope").unwrap_err().code,
            ErrorCode::UnknownProperty
        );
    }

    #[test]
    fn test_reduce_record_to_related_primary_key() {
        let registry = fixtures::registry();
        let product = registry.get("Product").unwrap();
        let scope = Scope::new(&registry, &product);
        let column = scope.resolve("store").unwrap();
        let store = crate::value::Record::new().set("id", 7).set("name", "Acme");
        assert_eq!(
            reduce_value(&registry, &column, &Value::from(store)).unwrap(),
            Value::Int(7)
        );

        let err = reduce_value(
            &registry,
            &column,
            &Value::from(crate::value::Record::new().set("name", "Acme")),
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::UndefinedValue);
    }
}
