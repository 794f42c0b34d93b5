//! SELECT lists, ORDER BY and DISTINCT ON.

use crate::error::{QueryError, QueryResult};
use crate::metadata::{ColumnMetadata, ModelMetadata};
use crate::sql::quote;
use crate::types::Sort;

use super::Scope;

/// Columns selected for a property list.
///
/// `None` selects every column. Collection relations are skipped, unknown
/// properties are rejected and the primary key is appended when missing.
fn selected_columns<'m>(
    model: &'m ModelMetadata,
    select: Option<&[String]>,
) -> QueryResult<Vec<&'m ColumnMetadata>> {
    let Some(properties) = select else {
        return Ok(model.columns().collect());
    };

    let mut columns: Vec<&ColumnMetadata> = Vec::with_capacity(properties.len() + 1);
    for property in properties {
        match model.column(property) {
            Some(column) => {
                if !columns.iter().any(|c| c.property_name == column.property_name) {
                    columns.push(column);
                }
            }
            None if model.relation(property).is_some() => {}
            None => return Err(QueryError::unknown_property(&model.name, property)),
        }
    }

    let primary_key = model.primary_key();
    if !columns.iter().any(|c| c.primary_key) {
        columns.push(primary_key);
    }
    Ok(columns)
}

/// Property names a select list resolves to, primary key included.
pub fn selected_properties(model: &ModelMetadata, select: Option<&[String]>) -> QueryResult<Vec<String>> {
    Ok(selected_columns(model, select)?
        .into_iter()
        .map(|c| c.property_name.clone())
        .collect())
}

/// Render a select list, aliasing storage names back to property names.
pub fn compile_select_list(scope: &Scope<'_>, select: Option<&[String]>) -> QueryResult<String> {
    let columns = selected_columns(scope.model, select)?;
    let rendered: Vec<String> = columns
        .into_iter()
        .map(|column| {
            let sql = scope.column_sql(column);
            if column.column_name == column.property_name {
                sql
            } else {
                format!("{} AS {}", sql, quote(&column.property_name))
            }
        })
        .collect();
    Ok(rendered.join(","))
}

/// Render ORDER BY terms; `None` when there are no sorts.
pub fn compile_order_by(scope: &Scope<'_>, sorts: &[Sort]) -> QueryResult<Option<String>> {
    if sorts.is_empty() {
        return Ok(None);
    }
    let mut terms = Vec::with_capacity(sorts.len());
    for sort in sorts {
        let column = scope.resolve(&sort.property)?;
        terms.push(if sort.order.is_desc() {
            format!("{} DESC", column.sql)
        } else {
            column.sql
        });
    }
    Ok(Some(terms.join(",")))
}

/// Render `DISTINCT ON (...) ` after checking it prefixes the sorts.
pub fn compile_distinct_on(
    scope: &Scope<'_>,
    distinct_on: &[String],
    sorts: &[Sort],
) -> QueryResult<Option<String>> {
    if distinct_on.is_empty() {
        return Ok(None);
    }
    if sorts.is_empty() {
        return Err(QueryError::invalid_distinct_on(
            "DISTINCT ON requires an ORDER BY whose leftmost columns match",
        )
        .with_model(&scope.model.name));
    }
    if sorts.len() < distinct_on.len() {
        return Err(QueryError::invalid_distinct_on(format!(
            "DISTINCT ON has {} columns but ORDER BY only has {}",
            distinct_on.len(),
            sorts.len()
        ))
        .with_model(&scope.model.name));
    }

    let mut columns = Vec::with_capacity(distinct_on.len());
    for (property, sort) in distinct_on.iter().zip(sorts) {
        let column = scope.resolve(property)?;
        if column.sql != scope.resolve(&sort.property)?.sql {
            return Err(QueryError::invalid_distinct_on(format!(
                "DISTINCT ON expression `{}` must match the leftmost ORDER BY expression (found `{}`)",
                property, sort.property
            ))
            .with_model(&scope.model.name));
        }
        columns.push(column.sql);
    }
    Ok(Some(format!("DISTINCT ON ({}) ", columns.join(","))))
}
