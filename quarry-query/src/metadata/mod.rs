//! Model metadata: tables, columns and relations.
//!
//! Metadata is declared once at startup, registered in a
//! [`ModelRegistry`](registry::ModelRegistry) and only read afterwards.
//!
//! ```rust
//! use quarry_query::metadata::{ColumnMetadata, ColumnType, ModelMetadata};
//!
//! let product = ModelMetadata::builder("Product", "products")
//!     .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
//!     .column(ColumnMetadata::new("name", ColumnType::String).required())
//!     .belongs_to("store", "Store", ColumnType::Integer)
//!     .many_to_many("categories", "Category", "ProductCategory", "product", "category")
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(product.column("store").unwrap().column_name, "store_id");
//! assert_eq!(product.primary_key().property_name, "id");
//! ```

mod registry;

use std::fmt;
use std::sync::Arc;

use convert_case::{Case, Casing};
use indexmap::IndexMap;

use crate::error::{QueryError, QueryResult};
use crate::sql::{is_valid_identifier, quote};
use crate::value::Value;

pub use registry::ModelRegistry;

/// Storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    /// Text.
    String,
    /// Integer.
    Integer,
    /// Floating point / numeric.
    Float,
    /// Boolean.
    Boolean,
    /// Timestamp.
    Date,
    /// UUID.
    Uuid,
    /// JSON document (stored as jsonb).
    Json,
    /// Array of untyped values.
    Array,
    /// Array of text.
    StringArray,
}

impl ColumnType {
    /// The Postgres type used when casting array parameters (`$1::TYPE[]`).
    pub fn cast(&self) -> &'static str {
        match self {
            Self::Integer => "INTEGER",
            Self::Float => "NUMERIC",
            Self::Boolean => "BOOLEAN",
            Self::Date => "TIMESTAMPTZ",
            Self::Uuid => "UUID",
            Self::Json => "JSONB",
            Self::String | Self::Array | Self::StringArray => "TEXT",
        }
    }

    /// Check if values of this column are arrays.
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array | Self::StringArray)
    }

    /// Check if this column holds JSON.
    pub fn is_json(&self) -> bool {
        matches!(self, Self::Json)
    }

    /// Check if this column holds text (or text elements).
    pub fn is_text(&self) -> bool {
        matches!(self, Self::String | Self::StringArray)
    }
}

/// A column default, either a literal or computed per insert.
#[derive(Clone)]
pub enum DefaultValue {
    /// A literal value.
    Value(Value),
    /// A function producing a value for each inserted row.
    Fn(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    /// Produce the default value.
    pub fn resolve(&self) -> Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Fn(f) => f(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Fn(_) => f.write_str("Fn(..)"),
        }
    }
}

/// Metadata for a single column.
#[derive(Debug, Clone)]
pub struct ColumnMetadata {
    /// Property name exposed to callers.
    pub property_name: String,
    /// Storage column name.
    pub column_name: String,
    /// Storage type.
    pub column_type: ColumnType,
    /// Whether inserts must supply a value (or have a default).
    pub required: bool,
    /// Maximum length of string values (or of each string array element).
    pub max_length: Option<usize>,
    /// Default used when inserts omit the column.
    pub default: Option<DefaultValue>,
    /// Primary key flag.
    pub primary_key: bool,
    /// Stamped with the current time on insert.
    pub created_at: bool,
    /// Stamped with the current time on insert and update.
    pub updated_at: bool,
    /// Optimistic version counter.
    pub version: bool,
    /// Target model when this column is a belongs-to foreign key.
    pub model: Option<String>,
}

impl ColumnMetadata {
    /// Create a column; the storage name defaults to the snake_case property name.
    pub fn new(property_name: impl Into<String>, column_type: ColumnType) -> Self {
        let property_name = property_name.into();
        Self {
            column_name: property_name.to_case(Case::Snake),
            property_name,
            column_type,
            required: false,
            max_length: None,
            default: None,
            primary_key: false,
            created_at: false,
            updated_at: false,
            version: false,
            model: None,
        }
    }

    /// Override the storage column name.
    pub fn column_name(mut self, name: impl Into<String>) -> Self {
        self.column_name = name.into();
        self
    }

    /// Mark as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the maximum string length.
    pub fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Set a literal default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    /// Set a computed default.
    pub fn default_fn(mut self, f: impl Fn() -> Value + Send + Sync + 'static) -> Self {
        self.default = Some(DefaultValue::Fn(Arc::new(f)));
        self
    }

    /// Mark as the primary key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as the created-at timestamp.
    pub fn created_at(mut self) -> Self {
        self.created_at = true;
        self
    }

    /// Mark as the updated-at timestamp.
    pub fn updated_at(mut self) -> Self {
        self.updated_at = true;
        self
    }

    /// Mark as the optimistic version counter.
    pub fn version(mut self) -> Self {
        self.version = true;
        self
    }

    /// Quoted storage column name.
    pub fn quoted(&self) -> String {
        quote(&self.column_name)
    }
}

/// Kind of relation between two models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationKind {
    /// This model holds a foreign key to the target.
    BelongsTo,
    /// The target holds a foreign key to this model.
    HasMany,
    /// Linked through a junction model.
    ManyToMany,
    /// A has-many relation whose target is this same model.
    SelfReference,
}

impl RelationKind {
    /// Check if the relation resolves to a collection.
    pub fn is_collection(&self) -> bool {
        !matches!(self, Self::BelongsTo)
    }
}

/// The junction side of a many-to-many relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThroughMetadata {
    /// Junction model name.
    pub model: String,
    /// Property on the junction model pointing at the owning model.
    pub source: String,
    /// Property on the junction model pointing at the target model.
    pub target: String,
}

/// Metadata for a relation property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationMetadata {
    /// Relation property name.
    pub property_name: String,
    /// Relation kind.
    pub kind: RelationKind,
    /// Target model name.
    pub model: String,
    /// For collections: the property on the target referencing this model.
    pub via: Option<String>,
    /// For many-to-many: the junction model.
    pub through: Option<ThroughMetadata>,
}

/// Immutable metadata for one model.
#[derive(Debug, Clone)]
pub struct ModelMetadata {
    /// Model name.
    pub name: String,
    /// Table name.
    pub table_name: String,
    /// Optional schema.
    pub schema: Option<String>,
    columns: IndexMap<String, ColumnMetadata>,
    relations: IndexMap<String, RelationMetadata>,
    primary_key: String,
}

impl ModelMetadata {
    /// Start declaring a model.
    pub fn builder(name: impl Into<String>, table_name: impl Into<String>) -> ModelMetadataBuilder {
        ModelMetadataBuilder::new(name, table_name)
    }

    /// Look up a column by property name.
    pub fn column(&self, property: &str) -> Option<&ColumnMetadata> {
        self.columns.get(property)
    }

    /// All columns in declaration order.
    pub fn columns(&self) -> impl Iterator<Item = &ColumnMetadata> {
        self.columns.values()
    }

    /// Look up a relation by property name.
    pub fn relation(&self, property: &str) -> Option<&RelationMetadata> {
        self.relations.get(property)
    }

    /// All relations in declaration order.
    pub fn relations(&self) -> impl Iterator<Item = &RelationMetadata> {
        self.relations.values()
    }

    /// The primary key column.
    pub fn primary_key(&self) -> &ColumnMetadata {
        // The builder guarantees the key exists.
        &self.columns[&self.primary_key]
    }

    /// The created-at column, if declared.
    pub fn created_at_column(&self) -> Option<&ColumnMetadata> {
        self.columns.values().find(|c| c.created_at)
    }

    /// The updated-at column, if declared.
    pub fn updated_at_column(&self) -> Option<&ColumnMetadata> {
        self.columns.values().find(|c| c.updated_at)
    }

    /// The version column, if declared.
    pub fn version_column(&self) -> Option<&ColumnMetadata> {
        self.columns.values().find(|c| c.version)
    }

    /// Quoted, schema-qualified table reference for FROM/INTO clauses.
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", quote(schema), quote(&self.table_name)),
            None => quote(&self.table_name),
        }
    }

    /// Quoted table name used to qualify columns.
    pub fn quoted_table(&self) -> String {
        quote(&self.table_name)
    }
}

/// Models are identified by name and table.
impl PartialEq for ModelMetadata {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.table_name == other.table_name && self.schema == other.schema
    }
}

/// Builder for [`ModelMetadata`].
#[derive(Debug)]
pub struct ModelMetadataBuilder {
    name: String,
    table_name: String,
    schema: Option<String>,
    columns: Vec<ColumnMetadata>,
    relations: Vec<RelationMetadata>,
}

impl ModelMetadataBuilder {
    /// Create a new builder.
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            schema: None,
            columns: Vec::new(),
            relations: Vec::new(),
        }
    }

    /// Set the schema.
    pub fn schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    /// Add a column.
    pub fn column(mut self, column: ColumnMetadata) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a belongs-to relation backed by a `<property>_id` column.
    pub fn belongs_to(
        self,
        property: impl Into<String>,
        model: impl Into<String>,
        key_type: ColumnType,
    ) -> Self {
        let property = property.into();
        let column_name = format!("{}_id", property.to_case(Case::Snake));
        self.belongs_to_column(ColumnMetadata::new(property, key_type).column_name(column_name), model)
    }

    /// Add a belongs-to relation backed by an explicit column declaration.
    pub fn belongs_to_column(mut self, mut column: ColumnMetadata, model: impl Into<String>) -> Self {
        let model = model.into();
        column.model = Some(model.clone());
        self.relations.push(RelationMetadata {
            property_name: column.property_name.clone(),
            kind: RelationKind::BelongsTo,
            model,
            via: None,
            through: None,
        });
        self.columns.push(column);
        self
    }

    /// Add a has-many relation; `via` is the belongs-to property on the target.
    pub fn has_many(
        mut self,
        property: impl Into<String>,
        model: impl Into<String>,
        via: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationMetadata {
            property_name: property.into(),
            kind: RelationKind::HasMany,
            model: model.into(),
            via: Some(via.into()),
            through: None,
        });
        self
    }

    /// Add a collection of rows of this same model; `via` is the parent property.
    pub fn self_reference(mut self, property: impl Into<String>, via: impl Into<String>) -> Self {
        self.relations.push(RelationMetadata {
            property_name: property.into(),
            kind: RelationKind::SelfReference,
            model: self.name.clone(),
            via: Some(via.into()),
            through: None,
        });
        self
    }

    /// Add a many-to-many relation through a junction model.
    pub fn many_to_many(
        mut self,
        property: impl Into<String>,
        model: impl Into<String>,
        through: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationMetadata {
            property_name: property.into(),
            kind: RelationKind::ManyToMany,
            model: model.into(),
            via: None,
            through: Some(ThroughMetadata {
                model: through.into(),
                source: source.into(),
                target: target.into(),
            }),
        });
        self
    }

    /// Validate and build the metadata.
    pub fn build(self) -> QueryResult<ModelMetadata> {
        for name in std::iter::once(&self.table_name).chain(self.schema.iter()) {
            if !is_valid_identifier(name) {
                return Err(QueryError::invalid_identifier(name.as_str()).with_model(&self.name));
            }
        }

        let mut columns = IndexMap::with_capacity(self.columns.len());
        for column in self.columns {
            for name in [&column.property_name, &column.column_name] {
                if !is_valid_identifier(name) {
                    return Err(QueryError::invalid_identifier(name.as_str()).with_model(&self.name));
                }
            }
            if columns.contains_key(&column.property_name) {
                return Err(QueryError::invalid_model(
                    &self.name,
                    format!("duplicate property `{}`", column.property_name),
                ));
            }
            columns.insert(column.property_name.clone(), column);
        }

        let mut keys = columns.values().filter(|c| c.primary_key);
        let primary_key = match (keys.next(), keys.next()) {
            (Some(pk), None) => pk.property_name.clone(),
            (None, _) => {
                return Err(QueryError::invalid_model(&self.name, "no primary key declared"));
            }
            (Some(_), Some(_)) => {
                return Err(QueryError::invalid_model(
                    &self.name,
                    "more than one primary key declared",
                ));
            }
        };

        let mut relations = IndexMap::with_capacity(self.relations.len());
        for relation in self.relations {
            if !is_valid_identifier(&relation.property_name) {
                return Err(QueryError::invalid_identifier(relation.property_name.as_str())
                    .with_model(&self.name));
            }
            if relation.kind.is_collection() && columns.contains_key(&relation.property_name) {
                return Err(QueryError::invalid_model(
                    &self.name,
                    format!("`{}` is declared as both a column and a collection", relation.property_name),
                ));
            }
            relations.insert(relation.property_name.clone(), relation);
        }

        Ok(ModelMetadata {
            name: self.name,
            table_name: self.table_name,
            schema: self.schema,
            columns,
            relations,
            primary_key,
        })
    }
}
