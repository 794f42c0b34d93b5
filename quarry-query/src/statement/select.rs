//! SELECT and COUNT statements.

use crate::compiler::{
    Scope, compile_distinct_on, compile_joins, compile_order_by, compile_select_list, compile_where,
};
use crate::error::{QueryError, QueryResult};
use crate::filter::Where;
use crate::join::Join;
use crate::metadata::{ModelMetadata, ModelRegistry};
use crate::options::QueryOptions;
use crate::sql::{CompiledStatement, Params};

/// Synthetic column carrying the total row count of a `with_count` query.
pub const TOTAL_COUNT_COLUMN: &str = "__total_count__";

/// Compile a SELECT statement.
///
/// Clause order: columns, FROM, JOINs, WHERE, ORDER BY, LIMIT, OFFSET.
pub fn compile_select(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    options: &QueryOptions,
) -> QueryResult<CompiledStatement> {
    if options.with_count && !options.distinct_on.is_empty() {
        return Err(QueryError::invalid_distinct_on(
            "DISTINCT ON cannot be combined with a total count",
        )
        .with_model(&model.name));
    }

    let mut params = Params::new();
    let joins = compile_joins(registry, model, &options.joins, &mut params)?;

    let mut scope = Scope::new(registry, model);
    if !joins.is_empty() {
        scope = scope.qualified();
    }
    let scope = scope.with_aliases(joins.aliases.clone());

    let mut sql = String::with_capacity(128);
    sql.push_str("SELECT ");
    if let Some(distinct) = compile_distinct_on(&scope, &options.distinct_on, &options.sorts)? {
        sql.push_str(&distinct);
    }
    sql.push_str(&compile_select_list(&scope, options.select.as_deref())?);
    if options.with_count {
        sql.push_str(",count(*) OVER() AS \"");
        sql.push_str(TOTAL_COUNT_COLUMN);
        sql.push('"');
    }

    sql.push_str(" FROM ");
    sql.push_str(&model.qualified_table());

    for clause in &joins.clauses {
        sql.push(' ');
        sql.push_str(clause);
    }

    if let Some(filter) = compile_where(&scope, &options.filter, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }

    if let Some(order) = compile_order_by(&scope, &options.sorts)? {
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    }

    if let Some(limit) = options.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(skip) = options.skip.filter(|skip| *skip > 0) {
        sql.push_str(&format!(" OFFSET {}", skip));
    }

    Ok(CompiledStatement::new(sql, params))
}

/// Compile `SELECT count(*) AS "count" FROM ... [WHERE ...]`.
pub fn compile_count(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    filter: &Where,
) -> QueryResult<CompiledStatement> {
    compile_count_joined(registry, model, &[], filter)
}

/// Compile a COUNT over the same joins a SELECT would use, so `alias.property`
/// paths in the filter resolve and joined rows are counted alike.
pub fn compile_count_joined(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    joins: &[Join],
    filter: &Where,
) -> QueryResult<CompiledStatement> {
    let mut params = Params::new();
    let joins = compile_joins(registry, model, joins, &mut params)?;

    let mut scope = Scope::new(registry, model);
    if !joins.is_empty() {
        scope = scope.qualified();
    }
    let scope = scope.with_aliases(joins.aliases.clone());

    let mut sql = format!("SELECT count(*) AS \"count\" FROM {}", model.qualified_table());
    for clause in &joins.clauses {
        sql.push(' ');
        sql.push_str(clause);
    }
    if let Some(filter) = compile_where(&scope, filter, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }
    Ok(CompiledStatement::new(sql, params))
}
