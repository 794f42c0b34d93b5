//! Subquery compilation, aggregates and HAVING.

use crate::error::{QueryError, QueryResult};
use crate::filter::Comparison;
use crate::metadata::{ColumnType, ModelRegistry};
use crate::sql::{Params, quote, quote_identifier};
use crate::subquery::{Aggregate, AggregateFn, Having, Subquery};
use crate::value::Value;

use super::predicate::compile_where;
use super::projection::compile_distinct_on;
use super::{OutputColumn, Scope};

/// How a subquery is embedded, which decides its default projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubqueryUsage {
    /// `"col" IN (...)`: one column, the primary key by default.
    In,
    /// `EXISTS (...)`: `SELECT 1` by default.
    Exists,
    /// `"col" > (...)`: exactly one column or aggregate, no default.
    Scalar,
    /// Joined derived table: every column by default.
    Join,
}

/// Compiled subquery SQL (without surrounding parentheses).
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledSubquery {
    /// SQL text.
    pub sql: String,
    /// Columns exposed to the embedding statement.
    pub columns: Vec<OutputColumn>,
}

/// Compile a subquery, binding its parameters into the embedding statement's sequence.
///
/// Subqueries see only their own model: paths into the outer query's aliases
/// are rejected as unknown aliases.
pub fn compile_subquery(
    registry: &ModelRegistry,
    subquery: &Subquery,
    usage: SubqueryUsage,
    params: &mut Params,
) -> QueryResult<CompiledSubquery> {
    let model = subquery.model();
    let scope = Scope::new(registry, model);

    let mut items = Vec::new();
    let mut columns = Vec::new();

    if let Some(selected) = subquery.selected() {
        for property in selected {
            let column = scope.column(property)?;
            items.push(if column.column_name == column.property_name {
                column.quoted()
            } else {
                format!("{} AS {}", column.quoted(), quote(&column.property_name))
            });
            columns.push(OutputColumn {
                name: column.property_name.clone(),
                column_type: column.column_type,
            });
        }
    }

    for aggregate in subquery.aggregates() {
        let alias = quote_identifier(aggregate.output_name())?;
        items.push(format!("{} AS {}", aggregate_sql(&scope, aggregate)?, alias));
        columns.push(OutputColumn {
            name: aggregate.output_name().to_string(),
            column_type: aggregate_type(&scope, aggregate)?,
        });
    }

    if items.is_empty() {
        match usage {
            SubqueryUsage::In => {
                let pk = model.primary_key();
                items.push(pk.quoted());
                columns.push(OutputColumn {
                    name: pk.property_name.clone(),
                    column_type: pk.column_type,
                });
            }
            SubqueryUsage::Exists => items.push("1".to_string()),
            SubqueryUsage::Join => {
                for column in model.columns() {
                    items.push(if column.column_name == column.property_name {
                        column.quoted()
                    } else {
                        format!("{} AS {}", column.quoted(), quote(&column.property_name))
                    });
                    columns.push(OutputColumn {
                        name: column.property_name.clone(),
                        column_type: column.column_type,
                    });
                }
            }
            SubqueryUsage::Scalar => {
                return Err(QueryError::invalid_subquery(format!(
                    "Scalar subquery on {} must select a column or an aggregate",
                    model.name
                )));
            }
        }
    }

    if matches!(usage, SubqueryUsage::In | SubqueryUsage::Scalar) && items.len() != 1 {
        return Err(QueryError::invalid_subquery(format!(
            "Subquery on {} used as a single-column operand selects {} columns",
            model.name,
            items.len()
        )));
    }

    let mut sql = String::from("SELECT ");
    if let Some(distinct) = compile_distinct_on(&scope, subquery.distinct_columns(), subquery.sorts())? {
        sql.push_str(&distinct);
    }
    sql.push_str(&items.join(","));
    sql.push_str(" FROM ");
    sql.push_str(&model.qualified_table());

    if let Some(filter) = compile_where(&scope, subquery.filter(), params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&filter);
    }

    if !subquery.grouping().is_empty() {
        let grouped = subquery
            .grouping()
            .iter()
            .map(|property| scope.column(property).map(|c| c.quoted()))
            .collect::<QueryResult<Vec<_>>>()?;
        sql.push_str(" GROUP BY ");
        sql.push_str(&grouped.join(","));
    }

    if !subquery.having_conditions().is_empty() {
        let conditions = subquery
            .having_conditions()
            .iter()
            .map(|having| having_sql(&scope, subquery.aggregates(), having))
            .collect::<QueryResult<Vec<_>>>()?;
        sql.push_str(" HAVING ");
        sql.push_str(&conditions.join(" AND "));
    }

    if !subquery.sorts().is_empty() {
        let mut terms = Vec::with_capacity(subquery.sorts().len());
        for sort in subquery.sorts() {
            let target = match subquery
                .aggregates()
                .iter()
                .find(|a| a.output_name() == sort.property)
            {
                Some(aggregate) => quote_identifier(aggregate.output_name())?,
                None => scope.resolve(&sort.property)?.sql,
            };
            terms.push(if sort.order.is_desc() {
                format!("{} DESC", target)
            } else {
                target
            });
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(&terms.join(","));
    }

    if let Some(limit) = subquery.row_limit() {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok(CompiledSubquery { sql, columns })
}

/// Render an aggregate expression without its alias.
fn aggregate_sql(scope: &Scope<'_>, aggregate: &Aggregate) -> QueryResult<String> {
    let argument = match &aggregate.property {
        Some(property) => scope.column(property)?.quoted(),
        None if aggregate.function == AggregateFn::Count => "*".to_string(),
        None => {
            return Err(QueryError::invalid_subquery(format!(
                "{} requires a column",
                aggregate.function.as_sql()
            )));
        }
    };
    Ok(format!(
        "{}({}{})",
        aggregate.function.as_sql(),
        if aggregate.distinct { "DISTINCT " } else { "" },
        argument
    ))
}

fn aggregate_type(scope: &Scope<'_>, aggregate: &Aggregate) -> QueryResult<ColumnType> {
    Ok(match aggregate.function {
        AggregateFn::Count => ColumnType::Integer,
        AggregateFn::Sum | AggregateFn::Avg => ColumnType::Float,
        AggregateFn::Min | AggregateFn::Max => match &aggregate.property {
            Some(property) => scope.column(property)?.column_type,
            None => ColumnType::Float,
        },
    })
}

/// Render one HAVING condition. Operands are validated literals, never parameters.
fn having_sql(scope: &Scope<'_>, aggregates: &[Aggregate], having: &Having) -> QueryResult<String> {
    let aggregate = aggregates
        .iter()
        .find(|a| a.output_name() == having.alias)
        .ok_or_else(|| {
            QueryError::invalid_having(format!(
                "HAVING references unknown aggregate alias `{}`",
                having.alias
            ))
        })?;

    let operator = Comparison::parse(&having.operator).ok_or_else(|| {
        QueryError::invalid_having(format!(
            "HAVING operator `{}` is not one of =, !=, >, >=, <, <=",
            having.operator
        ))
    })?;

    let literal = match &having.value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        other => {
            return Err(QueryError::invalid_having(format!(
                "HAVING value for `{}` must be a finite number, got {:?}",
                having.alias, other
            )));
        }
    };

    Ok(format!(
        "{}{}{}",
        aggregate_sql(scope, aggregate)?,
        operator.as_sql(),
        literal
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures;
    use crate::error::ErrorCode;
    use crate::filter::Where;
    use crate::subquery::Aggregate;
    use crate::types::Sort;
    use pretty_assertions::assert_eq;

    fn compile(subquery: &Subquery, usage: SubqueryUsage) -> QueryResult<CompiledSubquery> {
        let registry = fixtures::registry();
        let mut params = Params::new();
        compile_subquery(&registry, subquery, usage, &mut params)
    }

    fn products() -> Subquery {
        Subquery::new(fixtures::registry().get("Product").unwrap())
    }

    #[test]
    fn test_grouped_aggregate_with_having() {
        let subquery = products()
            .select(["store"])
            .aggregate(Aggregate::count().alias("productCount"))
            .r#where(Where::new().filter("price", crate::filter::Condition::gt(10)))
            .group_by(["store"])
            .having("productCount", ">=", 5)
            .sort(Sort::desc("productCount"))
            .limit(10);
        let compiled = compile(&subquery, SubqueryUsage::Join).unwrap();
        assert_eq!(
            compiled.sql,
            "SELECT \"store_id\" AS \"store\",COUNT(*) AS \"productCount\" FROM \"products\" WHERE \"price\">$1 GROUP BY \"store_id\" HAVING COUNT(*)>=5 ORDER BY \"productCount\" DESC LIMIT 10"
        );
        assert_eq!(
            compiled.columns,
            vec![
                OutputColumn { name: "store".into(), column_type: ColumnType::Integer },
                OutputColumn { name: "productCount".into(), column_type: ColumnType::Integer },
            ]
        );
    }

    #[test]
    fn test_aggregate_rendering() {
        let subquery = products()
            .aggregate(Aggregate::count_of("store").distinct())
            .sum("price")
            .avg("price")
            .min("createdAt")
            .max("price");
        assert_eq!(
            compile(&subquery, SubqueryUsage::Join).unwrap().sql,
            "SELECT COUNT(DISTINCT \"store_id\") AS \"count\",SUM(\"price\") AS \"sum\",AVG(\"price\") AS \"avg\",MIN(\"created_at\") AS \"min\",MAX(\"price\") AS \"max\" FROM \"products\""
        );
    }

    #[test]
    fn test_default_projections() {
        assert_eq!(
            compile(&products(), SubqueryUsage::In).unwrap().sql,
            "SELECT \"id\" FROM \"products\""
        );
        assert_eq!(
            compile(&products(), SubqueryUsage::Exists).unwrap().sql,
            "SELECT 1 FROM \"products\""
        );
        let err = compile(&products(), SubqueryUsage::Scalar).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSubquery);
    }

    #[test]
    fn test_single_column_usage_rejects_multiple_columns() {
        let err = compile(&products().select(["id", "name"]), SubqueryUsage::In).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSubquery);
    }

    #[test]
    fn test_having_validation() {
        let base = || products().count();

        let unknown_alias = compile(&base().having("total", ">", 1), SubqueryUsage::Join).unwrap_err();
        assert_eq!(unknown_alias.code, ErrorCode::InvalidHaving);

        let injected = compile(&base().having("count", "> 0 OR 1=1 --", 1), SubqueryUsage::Join).unwrap_err();
        assert_eq!(injected.code, ErrorCode::InvalidHaving);

        let non_numeric = compile(&base().having("count", ">", "5"), SubqueryUsage::Join).unwrap_err();
        assert_eq!(non_numeric.code, ErrorCode::InvalidHaving);

        let non_finite = compile(&base().having("count", ">", f64::INFINITY), SubqueryUsage::Join).unwrap_err();
        assert_eq!(non_finite.code, ErrorCode::InvalidHaving);

        assert_eq!(
            compile(&base().having("count", "!=", 2.5), SubqueryUsage::Join).unwrap().sql,
            "SELECT COUNT(*) AS \"count\" FROM \"products\" HAVING COUNT(*)<>2.5"
        );
    }

    #[test]
    fn test_invalid_aggregate_alias() {
        let err = compile(&products().aggregate(Aggregate::count().alias("bad alias")), SubqueryUsage::Join)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidIdentifier);
    }

    #[test]
    fn test_subquery_cannot_reference_outer_aliases() {
        let err = compile(&products().r#where(Where::new().eq("store.name", "Acme")), SubqueryUsage::In)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownAlias);
    }

    #[test]
    fn test_distinct_on_in_subquery() {
        let subquery = products()
            .select(["store", "name"])
            .distinct_on(["store"])
            .sort(Sort::asc("store"))
            .sort(Sort::desc("createdAt"));
        assert_eq!(
            compile(&subquery, SubqueryUsage::Join).unwrap().sql,
            "SELECT DISTINCT ON (\"store_id\") \"store_id\" AS \"store\",\"name\" FROM \"products\" ORDER BY \"store_id\",\"created_at\" DESC"
        );
    }
}
