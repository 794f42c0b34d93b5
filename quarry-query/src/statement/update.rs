//! UPDATE statements.

use crate::compiler::{Scope, compile_where};
use crate::error::{QueryError, QueryResult};
use crate::filter::Where;
use crate::metadata::{ModelMetadata, ModelRegistry};
use crate::sql::{CompiledStatement, Params};
use crate::value::Record;

use super::{Returning, dml_values, now, returning_sql};

/// Compile `UPDATE ... SET ... [WHERE ...] [RETURNING ...]`.
///
/// The updated-at column is stamped unless supplied, and a version column is
/// incremented unless supplied.
pub fn compile_update(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    filter: &Where,
    values: &Record,
    returning: &Returning,
) -> QueryResult<CompiledStatement> {
    let scope = Scope::new(registry, model);
    let mut values = dml_values(&scope, values)?;
    if values.is_empty() {
        return Err(QueryError::empty_statement(&model.name, "update"));
    }

    if let Some(updated_at) = model.updated_at_column() {
        if !values.iter().any(|(c, _)| c.updated_at) {
            values.push((updated_at, now()));
        }
    }

    let sets_version = values.iter().any(|(c, _)| c.version);
    let mut params = Params::new();
    let mut assignments: Vec<String> = values
        .into_iter()
        .map(|(column, value)| format!("{}={}", column.quoted(), params.bind(value)))
        .collect();
    if let Some(version) = model.version_column() {
        if !sets_version {
            assignments.push(format!("{}={}+1", version.quoted(), version.quoted()));
        }
    }

    let mut sql = format!(
        "UPDATE {} SET {}",
        model.qualified_table(),
        assignments.join(",")
    );
    if let Some(condition) = compile_where(&scope, filter, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&condition);
    }
    sql.push_str(&returning_sql(&scope, returning)?);
    Ok(CompiledStatement::new(sql, params))
}
