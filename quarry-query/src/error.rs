//! Error types for statement compilation, population and execution.
//!
//! Every problem the compiler or the population engine can detect is reported
//! as a [`QueryError`] carrying an [`ErrorCode`]. Failures raised by an
//! [`Executor`](crate::traits::Executor) are never converted: they travel
//! untouched inside [`ExecuteError::Executor`], so callers can tell "my query
//! was invalid" apart from "the data store failed".
//!
//! # Error Codes
//!
//! Error codes follow a pattern: Q{category}{number}
//! - 1xxx: Compile errors (invalid where, unknown property, identifiers, ...)
//! - 2xxx: Population errors (relation column missing from the projection)
//! - 3xxx: Execution errors (raised by callers wrapping executor failures)
//! - 6xxx: Data errors (serialization, type conversion)
//! - 9xxx: Internal errors
//!
//! ```rust
//! use quarry_query::{ErrorCode, QueryError};
//!
//! let err = QueryError::empty_where("Product");
//! assert_eq!(err.code, ErrorCode::EmptyWhere);
//! assert!(err.to_string().contains("WHERE statement is unexpectedly empty"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for compile and population operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Compile errors (1xxx)
    /// An `and`/`or` group had no members (Q1001).
    EmptyWhere = 1001,
    /// A value in a predicate or statement was undefined (Q1002).
    UndefinedValue = 1002,
    /// A property does not exist on the model (Q1003).
    UnknownProperty = 1003,
    /// A dot-notation path names an alias that was never joined (Q1004).
    UnknownAlias = 1004,
    /// A join or populate names a relation that does not exist (Q1005).
    UnknownRelation = 1005,
    /// An identifier failed validation (Q1006).
    InvalidIdentifier = 1006,
    /// A HAVING clause is malformed (Q1007).
    InvalidHaving = 1007,
    /// An operator is not supported for the column type (Q1008).
    UnsupportedOperator = 1008,
    /// A string value exceeds the column's max length (Q1009).
    MaxLengthExceeded = 1009,
    /// A required field has no value and no default (Q1010).
    RequiredFieldMissing = 1010,
    /// DISTINCT ON does not match the ORDER BY prefix (Q1011).
    InvalidDistinctOn = 1011,
    /// A subquery was used in a position it cannot occupy (Q1012).
    InvalidSubquery = 1012,
    /// A model name is not present in the registry (Q1013).
    UnknownModel = 1013,
    /// A model declaration is inconsistent (Q1014).
    InvalidModel = 1014,
    /// A sort expression could not be parsed (Q1015).
    InvalidSort = 1015,
    /// A statement has nothing to write (Q1016).
    EmptyStatement = 1016,

    // Population errors (2xxx)
    /// The relation column was not part of the parent projection (Q2001).
    MissingRelationColumn = 2001,
    /// A parent record did not carry its primary key (Q2002).
    MissingPrimaryKey = 2002,

    // Execution errors (3xxx)
    /// General database error (Q3001).
    DatabaseError = 3001,

    // Data errors (6xxx)
    /// Serialization error (Q6001).
    SerializationError = 6001,
    /// Deserialization error (Q6002).
    DeserializationError = 6002,

    // Internal errors (9xxx)
    /// Internal error (Q9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "Q1001").
    pub fn code(&self) -> String {
        format!("Q{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::EmptyWhere => "Empty where group",
            Self::UndefinedValue => "Undefined value",
            Self::UnknownProperty => "Unknown property",
            Self::UnknownAlias => "Unknown join alias",
            Self::UnknownRelation => "Unknown relation",
            Self::InvalidIdentifier => "Invalid SQL identifier",
            Self::InvalidHaving => "Invalid HAVING clause",
            Self::UnsupportedOperator => "Unsupported operator",
            Self::MaxLengthExceeded => "Value exceeds max length",
            Self::RequiredFieldMissing => "Required field missing",
            Self::InvalidDistinctOn => "Invalid DISTINCT ON",
            Self::InvalidSubquery => "Invalid subquery",
            Self::UnknownModel => "Unknown model",
            Self::InvalidModel => "Invalid model declaration",
            Self::InvalidSort => "Invalid sort",
            Self::EmptyStatement => "Empty statement",
            Self::MissingRelationColumn => "Relation column missing from projection",
            Self::MissingPrimaryKey => "Primary key missing from record",
            Self::DatabaseError => "Database error",
            Self::SerializationError => "Serialization error",
            Self::DeserializationError => "Deserialization error",
            Self::Internal => "Internal error",
        }
    }

    /// Check if this code belongs to the compile category.
    pub fn is_compile_error(&self) -> bool {
        (1000..2000).contains(&(*self as u16))
    }

    /// Check if this code belongs to the population category.
    pub fn is_population_error(&self) -> bool {
        (2000..3000).contains(&(*self as u16))
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field involved.
    pub field: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
}

/// Errors raised while compiling statements or preparing population.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

/// Cloning keeps the code, message and context; the source error is dropped.
impl Clone for QueryError {
    fn clone(&self) -> Self {
        Self {
            code: self.code,
            message: self.message.clone(),
            context: self.context.clone(),
            source: None,
        }
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Compile Errors ==============

    /// An `and`/`or` group (or a nested document) compiled to nothing.
    pub fn empty_where(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::EmptyWhere,
            format!("WHERE statement is unexpectedly empty (model: {})", model),
        )
        .with_model(model)
        .with_suggestion("Remove the empty `and`/`or` group or give it at least one member")
    }

    /// A value was explicitly left undefined.
    pub fn undefined_value(model: impl Into<String>, property: impl Into<String>) -> Self {
        let model = model.into();
        let property = property.into();
        Self::new(
            ErrorCode::UndefinedValue,
            format!(
                "Attempting to query with an undefined value for `{}` on {}",
                property, model
            ),
        )
        .with_model(model)
        .with_field(property)
    }

    /// A property is not declared on the model.
    pub fn unknown_property(model: impl Into<String>, property: impl Into<String>) -> Self {
        let model = model.into();
        let property = property.into();
        Self::new(
            ErrorCode::UnknownProperty,
            format!("Property `{}` does not exist on {}", property, model),
        )
        .with_model(model)
        .with_field(property)
    }

    /// A dot-notation path refers to an alias that was not joined.
    pub fn unknown_alias(model: impl Into<String>, path: impl Into<String>) -> Self {
        let model = model.into();
        let path = path.into();
        Self::new(
            ErrorCode::UnknownAlias,
            format!(
                "Unable to resolve `{}` on {}: no join exists for that alias",
                path, model
            ),
        )
        .with_model(model)
        .with_field(path)
        .with_suggestion("Add a join() for the alias before filtering or sorting on it")
    }

    /// A relation does not exist, or the property is not a relation.
    pub fn unknown_relation(model: impl Into<String>, relation: impl Into<String>) -> Self {
        let model = model.into();
        let relation = relation.into();
        Self::new(
            ErrorCode::UnknownRelation,
            format!("`{}` is not a relation of {}", relation, model),
        )
        .with_model(model)
        .with_field(relation)
    }

    /// The identifier does not match the allowed grammar.
    pub fn invalid_identifier(identifier: impl Into<String>) -> Self {
        let identifier = identifier.into();
        Self::new(
            ErrorCode::InvalidIdentifier,
            format!("Invalid SQL identifier: {}", identifier),
        )
        .with_field(identifier)
    }

    /// A HAVING clause is malformed.
    pub fn invalid_having(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidHaving, message.into())
    }

    /// The operator is not usable on the column.
    pub fn unsupported_operator(
        model: impl Into<String>,
        property: impl Into<String>,
        operator: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let property = property.into();
        Self::new(
            ErrorCode::UnsupportedOperator,
            format!(
                "Operator `{}` is not supported for `{}` on {}",
                operator.into(),
                property,
                model
            ),
        )
        .with_model(model)
        .with_field(property)
    }

    /// A predicate document could not be parsed.
    pub fn invalid_where(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::UnsupportedOperator,
            format!("Invalid where document: {}", message.into()),
        )
    }

    /// A value exceeded the column's declared max length.
    pub fn max_length_exceeded(
        model: impl Into<String>,
        property: impl Into<String>,
        max_length: usize,
    ) -> Self {
        let model = model.into();
        let property = property.into();
        Self::new(
            ErrorCode::MaxLengthExceeded,
            format!(
                "Create or update value for `{}` exceeds maximum length of {}",
                property, max_length
            ),
        )
        .with_model(model)
        .with_field(property)
    }

    /// A required field was not supplied and has no default.
    pub fn required_field_missing(model: impl Into<String>, property: impl Into<String>) -> Self {
        let model = model.into();
        let property = property.into();
        Self::new(
            ErrorCode::RequiredFieldMissing,
            format!("Create statement for {} is missing value for required field: {}", model, property),
        )
        .with_model(model)
        .with_field(&property)
        .with_suggestion(format!("Provide a value for `{}` or declare a default", property))
    }

    /// DISTINCT ON is not compatible with the rest of the query.
    pub fn invalid_distinct_on(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDistinctOn, message.into())
    }

    /// A subquery cannot be embedded the way it was used.
    pub fn invalid_subquery(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidSubquery, message.into())
    }

    /// A subquery join was declared without an alias.
    pub fn subquery_alias_required(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::InvalidSubquery,
            format!("Subquery joins on {} must specify an alias", model),
        )
        .with_model(model)
    }

    /// A model name was not found in the registry.
    pub fn unknown_model(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::UnknownModel,
            format!("Unable to find model `{}` in the registry", model),
        )
        .with_model(model)
    }

    /// A model declaration is inconsistent.
    pub fn invalid_model(model: impl Into<String>, message: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::InvalidModel,
            format!("Invalid model {}: {}", model, message.into()),
        )
        .with_model(model)
    }

    /// A sort expression could not be parsed.
    pub fn invalid_sort(sort: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InvalidSort,
            format!("Unable to parse sort expression: {}", sort.into()),
        )
    }

    /// A statement has nothing to write.
    pub fn empty_statement(model: impl Into<String>, operation: impl Into<String>) -> Self {
        let model = model.into();
        let operation = operation.into();
        Self::new(
            ErrorCode::EmptyStatement,
            format!("{} statement for {} has no values", operation, model),
        )
        .with_model(model)
        .with_context(operation)
    }

    // ============== Population Errors ==============

    /// A belongs-to relation column was not selected on the parent query.
    pub fn missing_relation_column(
        model: impl Into<String>,
        relation: impl Into<String>,
        column: impl Into<String>,
    ) -> Self {
        let model = model.into();
        let relation = relation.into();
        Self::new(
            ErrorCode::MissingRelationColumn,
            format!(
                "Unable to populate `{}` on {}: column `{}` was not included in the query projection",
                relation,
                model,
                column.into()
            ),
        )
        .with_model(model)
        .with_field(&relation)
        .with_suggestion(format!("Add `{}` to select()", relation))
    }

    /// A parent record is missing its primary key value.
    pub fn missing_primary_key(model: impl Into<String>, property: impl Into<String>) -> Self {
        let model = model.into();
        let property = property.into();
        Self::new(
            ErrorCode::MissingPrimaryKey,
            format!(
                "Unable to populate relations of {}: record is missing primary key `{}`",
                model, property
            ),
        )
        .with_model(model)
        .with_field(property)
    }

    // ============== Data Errors ==============

    /// Create a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message.into())
    }

    /// Create a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DeserializationError,
            format!("Failed to deserialize record: {}", message.into()),
        )
    }

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message.into()))
    }

    // ============== Error Checks ==============

    /// Check if the input to the compiler was invalid.
    pub fn is_compile_error(&self) -> bool {
        self.code.is_compile_error()
    }

    /// Check if population preconditions were violated.
    pub fn is_population_error(&self) -> bool {
        self.code.is_population_error()
    }

    /// Display the full error with all context and suggestions.
    pub fn display_full(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!("Error [{}]: {}\n", self.code.code(), self.message));

        if let Some(ref op) = self.context.operation {
            output.push_str(&format!("  → While: {}\n", op));
        }
        if let Some(ref model) = self.context.model {
            output.push_str(&format!("  → Model: {}\n", model));
        }
        if let Some(ref field) = self.context.field {
            output.push_str(&format!("  → Field: {}\n", field));
        }

        if let Some(ref sql) = self.context.sql {
            let sql_display = if sql.len() > 200 {
                format!("{}...", &sql[..200])
            } else {
                sql.clone()
            };
            output.push_str(&format!("  → SQL: {}\n", sql_display));
        }

        if !self.context.suggestions.is_empty() {
            output.push_str("\nSuggestions:\n");
            for (i, suggestion) in self.context.suggestions.iter().enumerate() {
                output.push_str(&format!("  {}. {}\n", i + 1, suggestion));
            }
        }

        output
    }
}

/// Error returned by operations that reach an executor.
///
/// Compile and population problems surface as [`ExecuteError::Query`]; the
/// executor's own error type is carried as-is in [`ExecuteError::Executor`].
#[derive(Error, Debug)]
pub enum ExecuteError<E> {
    /// The query could not be compiled or populated.
    #[error(transparent)]
    Query(#[from] QueryError),
    /// The executor failed.
    #[error(transparent)]
    Executor(E),
}

impl<E> ExecuteError<E> {
    /// Get the compile/population error, if that is what this is.
    pub fn as_query_error(&self) -> Option<&QueryError> {
        match self {
            Self::Query(err) => Some(err),
            Self::Executor(_) => None,
        }
    }

    /// Get the executor error, if that is what this is.
    pub fn as_executor_error(&self) -> Option<&E> {
        match self {
            Self::Query(_) => None,
            Self::Executor(err) => Some(err),
        }
    }
}
