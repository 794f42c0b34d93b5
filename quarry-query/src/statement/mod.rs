//! Statement builders.
//!
//! Each builder is a pure function from metadata and options to a
//! [`CompiledStatement`](crate::sql::CompiledStatement). Executable wrappers
//! live in [`operations`](crate::operations).

mod delete;
mod insert;
mod select;
mod update;

use chrono::Utc;

use crate::compiler::{ColumnRef, Scope, compile_select_list, reduce_value};
use crate::error::{QueryError, QueryResult};
use crate::metadata::{ColumnMetadata, ModelMetadata};
use crate::value::{Record, Value};

pub use delete::compile_delete;
pub use insert::{ConflictAction, InsertOptions, OnConflict, compile_insert};
pub use select::{TOTAL_COUNT_COLUMN, compile_count, compile_count_joined, compile_select};
pub use update::compile_update;

/// Which columns a DML statement returns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Returning {
    /// Every column.
    #[default]
    All,
    /// The given properties (primary key always included).
    Columns(Vec<String>),
    /// No RETURNING clause.
    None,
}

impl Returning {
    /// Build from a `returnRecords` flag.
    pub fn records(return_records: bool) -> Self {
        if return_records { Self::All } else { Self::None }
    }

    /// Check if rows are returned.
    pub fn is_some(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Render ` RETURNING ...`, or nothing.
fn returning_sql(scope: &Scope<'_>, returning: &Returning) -> QueryResult<String> {
    Ok(match returning {
        Returning::All => format!(" RETURNING {}", compile_select_list(scope, None)?),
        Returning::Columns(columns) => {
            format!(" RETURNING {}", compile_select_list(scope, Some(columns.as_slice()))?)
        }
        Returning::None => String::new(),
    })
}

/// Check a value against the column's max length.
fn check_max_length(model: &ModelMetadata, column: &ColumnMetadata, value: &Value) -> QueryResult<()> {
    let Some(max_length) = column.max_length else {
        return Ok(());
    };
    let too_long = |v: &Value| v.as_str().is_some_and(|s| s.chars().count() > max_length);
    let exceeded = match value {
        Value::List(items) => items.iter().any(too_long),
        other => too_long(other),
    };
    if exceeded {
        Err(QueryError::max_length_exceeded(&model.name, &column.property_name, max_length))
    } else {
        Ok(())
    }
}

/// Validate and convert caller-supplied values for DML.
///
/// Collection relation properties are dropped; unknown properties are errors.
fn dml_values<'m>(
    scope: &Scope<'m>,
    record: &Record,
) -> QueryResult<Vec<(&'m ColumnMetadata, Value)>> {
    let model = scope.model;
    let mut values = Vec::with_capacity(record.len());
    for (property, value) in record.iter() {
        let Some(column) = model.column(property) else {
            if model.relation(property).is_some_and(|r| r.kind.is_collection()) {
                continue;
            }
            return Err(QueryError::unknown_property(&model.name, property));
        };
        let reference = ColumnRef {
            sql: column.quoted(),
            path: property.clone(),
            owner: model.name.clone(),
            column_type: column.column_type,
            related_model: column.model.clone(),
        };
        let value = reduce_value(scope.registry, &reference, value)?;
        check_max_length(model, column, &value)?;
        values.push((column, value));
    }
    Ok(values)
}

/// Current timestamp for created/updated columns.
fn now() -> Value {
    Value::DateTime(Utc::now())
}
