//! WHERE clause compilation.

use crate::error::{QueryError, QueryResult};
use crate::filter::{Comparison, Condition, Operand, PatternKind, Where, WhereEntry};
use crate::sql::Params;
use crate::value::Value;

use super::subquery::{SubqueryUsage, compile_subquery};
use super::{ColumnRef, Scope, reduce_value};

const ALWAYS_FALSE: &str = "1<>1";
const ALWAYS_TRUE: &str = "1=1";

/// Compile a predicate document.
///
/// Returns `None` for an empty document. Top-level entries are AND-combined.
pub fn compile_where(
    scope: &Scope<'_>,
    filter: &Where,
    params: &mut Params,
) -> QueryResult<Option<String>> {
    if filter.is_empty() {
        return Ok(None);
    }

    let mut clauses = Vec::with_capacity(filter.len());
    for entry in filter.entries() {
        clauses.push(compile_entry(scope, entry, params)?);
    }
    Ok(Some(clauses.join(" AND ")))
}

fn compile_entry(scope: &Scope<'_>, entry: &WhereEntry, params: &mut Params) -> QueryResult<String> {
    match entry {
        WhereEntry::Property { path, condition } => {
            let column = scope.resolve(path)?;
            compile_condition(scope, &column, condition, false, params)
        }
        WhereEntry::And(members) => compile_group(scope, members, " AND ", params),
        WhereEntry::Or(members) => compile_group(scope, members, " OR ", params),
        WhereEntry::Exists { subquery, negated } => {
            let compiled = compile_subquery(scope.registry, subquery, SubqueryUsage::Exists, params)?;
            Ok(format!(
                "{}EXISTS ({})",
                if *negated { "NOT " } else { "" },
                compiled.sql
            ))
        }
    }
}

fn compile_group(
    scope: &Scope<'_>,
    members: &[Where],
    separator: &str,
    params: &mut Params,
) -> QueryResult<String> {
    let mut parts = Vec::with_capacity(members.len());
    for member in members {
        if let Some(sql) = compile_where(scope, member, params)? {
            parts.push(format!("({})", sql));
        }
    }

    match parts.len() {
        0 => Err(QueryError::empty_where(&scope.model.name)),
        1 => Ok(parts.remove(0)),
        _ => Ok(format!("({})", parts.join(separator))),
    }
}

fn compile_condition(
    scope: &Scope<'_>,
    column: &ColumnRef,
    condition: &Condition,
    negated: bool,
    params: &mut Params,
) -> QueryResult<String> {
    match condition {
        Condition::Not(inner) => compile_condition(scope, column, inner, !negated, params),
        Condition::All(conditions) => {
            let mut parts = Vec::with_capacity(conditions.len());
            for condition in conditions {
                parts.push(compile_condition(scope, column, condition, negated, params)?);
            }
            match parts.len() {
                0 => Err(QueryError::undefined_value(&column.owner, &column.path)),
                1 => Ok(parts.remove(0)),
                _ => Ok(format!(
                    "({})",
                    parts.join(if negated { " OR " } else { " AND " })
                )),
            }
        }
        Condition::Equals(value) => {
            let value = reduce_value(scope.registry, column, value)?;
            Ok(equals(column, value, negated, params))
        }
        Condition::Pattern(kind, value) => pattern(column, *kind, value, negated, params),
        Condition::Compare(op, operand) => compare(scope, column, *op, operand, negated, params),
        Condition::In(subquery) => {
            let compiled = compile_subquery(scope.registry, subquery, SubqueryUsage::In, params)?;
            Ok(format!(
                "{} {}IN ({})",
                column.sql,
                if negated { "NOT " } else { "" },
                compiled.sql
            ))
        }
    }
}

fn join_clauses(mut clauses: Vec<String>, negated: bool) -> String {
    if clauses.len() == 1 {
        clauses.remove(0)
    } else {
        format!("({})", clauses.join(if negated { " AND " } else { " OR " }))
    }
}

fn is_null(column: &ColumnRef, negated: bool) -> String {
    format!("{} IS {}NULL", column.sql, if negated { "NOT " } else { "" })
}

/// Equality, list membership and null checks.
fn equals(column: &ColumnRef, value: Value, negated: bool, params: &mut Params) -> String {
    let items = match value {
        Value::Null => return is_null(column, negated),
        Value::List(items) => items,
        scalar => return equals_scalar(column, scalar, negated, params),
    };

    let has_null = items.iter().any(Value::is_null);
    let mut values: Vec<Value> = items.into_iter().filter(|v| !v.is_null()).collect();

    let mut clauses = Vec::new();
    if has_null {
        clauses.push(is_null(column, negated));
    }

    if column.column_type.is_array() {
        if values.is_empty() && !has_null {
            return format!("{}{}'{{}}'", column.sql, if negated { "<>" } else { "=" });
        }
        for value in values {
            clauses.push(equals_scalar(column, value, negated, params));
        }
    } else {
        match values.len() {
            0 if !has_null => return (if negated { ALWAYS_TRUE } else { ALWAYS_FALSE }).to_string(),
            0 => {}
            1 => clauses.push(equals_scalar(column, values.remove(0), negated, params)),
            _ => clauses.push(format!(
                "{}{}({}::{}[])",
                column.sql,
                if negated { "<>ALL" } else { "=ANY" },
                params.bind(Value::List(values)),
                column.column_type.cast()
            )),
        }
    }

    join_clauses(clauses, negated)
}

fn equals_scalar(column: &ColumnRef, value: Value, negated: bool, params: &mut Params) -> String {
    let placeholder = params.bind(value);
    if column.column_type.is_array() {
        format!(
            "{}{}({})",
            placeholder,
            if negated { "<>ALL" } else { "=ANY" },
            column.sql
        )
    } else {
        format!(
            "{}{}{}",
            column.sql,
            if negated { "<>" } else { "=" },
            placeholder
        )
    }
}

/// `like`, `startsWith`, `endsWith` and `contains`.
fn pattern(
    column: &ColumnRef,
    kind: PatternKind,
    value: &Value,
    negated: bool,
    params: &mut Params,
) -> QueryResult<String> {
    if column.column_type.is_json() {
        return match kind {
            PatternKind::Contains => Ok(json_contains(column, value, negated, params)),
            _ => Err(QueryError::unsupported_operator(
                &column.owner,
                &column.path,
                kind.name(),
            )),
        };
    }

    let items: Vec<&Value> = match value {
        Value::List(items) => items.iter().collect(),
        single => vec![single],
    };

    let mut clauses = Vec::new();
    let mut patterns = Vec::new();
    for item in items {
        match item {
            Value::Null => clauses.push(is_null(column, negated)),
            Value::String(s) => patterns.push(s.clone()),
            other => match other.key() {
                Some(text) => patterns.push(text),
                None => {
                    return Err(QueryError::unsupported_operator(
                        &column.owner,
                        &column.path,
                        kind.name(),
                    ));
                }
            },
        }
    }

    if column.column_type.is_array() {
        for text in patterns {
            let placeholder = params.bind(kind.wrap(&text));
            clauses.push(format!(
                "{}EXISTS(SELECT 1 FROM (SELECT unnest({}) AS u) __unnested WHERE u ILIKE {})",
                if negated { "NOT " } else { "" },
                column.sql,
                placeholder
            ));
        }
    } else {
        let operator = if negated { "NOT ILIKE" } else { "ILIKE" };
        match patterns.len() {
            0 => {}
            1 if patterns[0].is_empty() => clauses.push(format!(
                "{}{}''",
                column.sql,
                if negated { "!=" } else { "=" }
            )),
            1 => {
                let placeholder = params.bind(kind.wrap(&patterns[0]));
                clauses.push(format!("{} {} {}", column.sql, operator, placeholder));
            }
            _ => {
                let placeholders: Vec<String> = patterns
                    .iter()
                    .map(|text| params.bind(kind.wrap(text)))
                    .collect();
                clauses.push(format!(
                    "{} {} {}(ARRAY[{}])",
                    column.sql,
                    operator,
                    if negated { "ALL" } else { "ANY" },
                    placeholders.join(",")
                ));
            }
        }
    }

    if clauses.is_empty() {
        return Ok((if negated { ALWAYS_TRUE } else { ALWAYS_FALSE }).to_string());
    }
    Ok(join_clauses(clauses, negated))
}

/// JSON containment (`@>`).
fn json_contains(column: &ColumnRef, value: &Value, negated: bool, params: &mut Params) -> String {
    let is_document = |v: &Value| {
        matches!(v, Value::Record(_)) || matches!(v, Value::Json(j) if j.is_object())
    };

    let containment = |document: &Value, params: &mut Params| {
        format!(
            "{}{}@>{}::jsonb",
            if negated { "NOT " } else { "" },
            column.sql,
            params.bind(Value::Json(document.to_json()))
        )
    };

    match value {
        Value::Null => is_null(column, negated),
        Value::List(items) if items.is_empty() => {
            (if negated { ALWAYS_TRUE } else { ALWAYS_FALSE }).to_string()
        }
        Value::List(items) if items.iter().all(is_document) => {
            let clauses = items.iter().map(|item| containment(item, params)).collect();
            join_clauses(clauses, negated)
        }
        other => containment(other, params),
    }
}

/// `> >= < <= = !=` against a value or a scalar subquery.
fn compare(
    scope: &Scope<'_>,
    column: &ColumnRef,
    op: Comparison,
    operand: &Operand,
    negated: bool,
    params: &mut Params,
) -> QueryResult<String> {
    match operand {
        Operand::Value(value) => {
            let value = reduce_value(scope.registry, column, value)?;
            match op {
                Comparison::Eq => Ok(equals(column, value, negated, params)),
                Comparison::Ne => Ok(equals(column, value, !negated, params)),
                _ => {
                    if value.is_null() || value.as_list().is_some() || column.column_type.is_array() {
                        return Err(QueryError::unsupported_operator(
                            &column.owner,
                            &column.path,
                            op.as_sql(),
                        ));
                    }
                    let op = if negated { op.negate() } else { op };
                    Ok(format!("{}{}{}", column.sql, op.as_sql(), params.bind(value)))
                }
            }
        }
        Operand::Subquery(subquery) => {
            let compiled = compile_subquery(scope.registry, subquery, SubqueryUsage::Scalar, params)?;
            let op = if negated { op.negate() } else { op };
            Ok(format!("{}{}({})", column.sql, op.as_sql(), compiled.sql))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures;
    use crate::compiler::{AliasTable, JoinTarget};
    use crate::error::ErrorCode;
    use crate::metadata::ModelRegistry;
    use crate::subquery::Subquery;
    use crate::value::Record;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn compile_with(registry: &ModelRegistry, filter: Where) -> QueryResult<(String, Vec<Value>)> {
        let product = registry.get("Product").unwrap();
        let scope = Scope::new(registry, &product);
        let mut params = Params::new();
        let sql = compile_where(&scope, &filter, &mut params)?.unwrap_or_default();
        Ok((sql, params.into_values()))
    }

    fn compile(filter: Where) -> (String, Vec<Value>) {
        compile_with(&fixtures::registry(), filter).unwrap()
    }

    fn compile_err(filter: Where) -> QueryError {
        compile_with(&fixtures::registry(), filter).unwrap_err()
    }

    #[test]
    fn test_empty_document_has_no_fragment() {
        assert_eq!(compile(Where::new()).0, "");
    }

    #[test]
    fn test_scalar_equality() {
        let (sql, params) = compile(Where::new().eq("name", "Widget").eq("store", 3));
        assert_eq!(sql, "\"name\"=$1 AND \"store_id\"=$2");
        assert_eq!(params, vec![Value::from("Widget"), Value::Int(3)]);
    }

    #[test]
    fn test_scalar_negation() {
        let (sql, _) = compile(Where::new().not("name", "Widget"));
        assert_eq!(sql, "\"name\"<>$1");
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(compile(Where::new().eq("sku", Value::Null)).0, "\"sku\" IS NULL");
        assert_eq!(compile(Where::new().not("sku", Value::Null)).0, "\"sku\" IS NOT NULL");
    }

    #[test]
    fn test_list_membership() {
        let (sql, params) = compile(Where::new().eq("store", vec![1, 2]));
        assert_eq!(sql, "\"store_id\"=ANY($1::INTEGER[])");
        assert_eq!(params, vec![Value::List(vec![Value::Int(1), Value::Int(2)])]);

        let (sql, _) = compile(Where::new().not("name", vec!["a", "b"]));
        assert_eq!(sql, "\"name\"<>ALL($1::TEXT[])");
    }

    #[test]
    fn test_singleton_list_collapses_to_scalar() {
        assert_eq!(compile(Where::new().eq("store", vec![1])).0, "\"store_id\"=$1");
        assert_eq!(compile(Where::new().not("store", vec![1])).0, "\"store_id\"<>$1");
    }

    #[test]
    fn test_empty_list_is_constant() {
        let (sql, params) = compile(Where::new().eq("store", Vec::<i64>::new()));
        assert_eq!(sql, "1<>1");
        assert!(params.is_empty());
        assert_eq!(compile(Where::new().not("store", Vec::<i64>::new())).0, "1=1");
    }

    #[test]
    fn test_list_with_null() {
        let (sql, params) = compile(Where::new().eq("sku", vec![Value::Null, "a".into(), "b".into()]));
        assert_eq!(sql, "(\"sku\" IS NULL OR \"sku\"=ANY($1::TEXT[]))");
        assert_eq!(params.len(), 1);

        let (sql, _) = compile(Where::new().not("sku", vec![Value::Null, "a".into()]));
        assert_eq!(sql, "(\"sku\" IS NOT NULL AND \"sku\"<>$1)");

        assert_eq!(compile(Where::new().eq("sku", vec![Value::Null])).0, "\"sku\" IS NULL");
    }

    #[test]
    fn test_array_column_membership() {
        assert_eq!(compile(Where::new().eq("aliases", "foo")).0, "$1=ANY(\"alias_names\")");
        assert_eq!(
            compile(Where::new().eq("aliases", vec!["foo", "bar"])).0,
            "($1=ANY(\"alias_names\") OR $2=ANY(\"alias_names\"))"
        );
        assert_eq!(
            compile(Where::new().not("aliases", vec!["foo", "bar"])).0,
            "($1<>ALL(\"alias_names\") AND $2<>ALL(\"alias_names\"))"
        );
        assert_eq!(compile(Where::new().eq("aliases", Vec::<String>::new())).0, "\"alias_names\"='{}'");
        assert_eq!(compile(Where::new().not("aliases", Vec::<String>::new())).0, "\"alias_names\"<>'{}'");
    }

    #[test]
    fn test_patterns() {
        let (sql, params) = compile(Where::new().filter("name", Condition::like("wid%")));
        assert_eq!(sql, "\"name\" ILIKE $1");
        assert_eq!(params, vec![Value::from("wid%")]);

        let (_, params) = compile(Where::new().filter("name", Condition::starts_with("wid")));
        assert_eq!(params, vec![Value::from("wid%")]);
        let (_, params) = compile(Where::new().filter("name", Condition::ends_with("get")));
        assert_eq!(params, vec![Value::from("%get")]);

        let (sql, params) = compile(Where::new().filter("name", Condition::contains("dg").negate()));
        assert_eq!(sql, "\"name\" NOT ILIKE $1");
        assert_eq!(params, vec![Value::from("%dg%")]);
    }

    #[test]
    fn test_pattern_lists() {
        let (sql, params) = compile(Where::new().filter("name", Condition::like(vec!["a%", "b%"])));
        assert_eq!(sql, "\"name\" ILIKE ANY(ARRAY[$1,$2])");
        assert_eq!(params.len(), 2);

        let (sql, _) = compile(Where::new().filter("name", Condition::like(vec!["a%", "b%"]).negate()));
        assert_eq!(sql, "\"name\" NOT ILIKE ALL(ARRAY[$1,$2])");
    }

    #[test]
    fn test_empty_pattern_short_circuits() {
        let (sql, params) = compile(Where::new().filter("name", Condition::like("")));
        assert_eq!(sql, "\"name\"=''");
        assert!(params.is_empty());
        assert_eq!(
            compile(Where::new().filter("name", Condition::like("").negate())).0,
            "\"name\"!=''"
        );
        assert_eq!(
            compile(Where::new().filter("name", Condition::like(Vec::<String>::new()))).0,
            "1<>1"
        );
        assert_eq!(
            compile(Where::new().filter("name", Condition::like(Vec::<String>::new()).negate())).0,
            "1=1"
        );
    }

    #[test]
    fn test_array_column_patterns() {
        let (sql, params) = compile(Where::new().filter("aliases", Condition::like("foo")));
        assert_eq!(
            sql,
            "EXISTS(SELECT 1 FROM (SELECT unnest(\"alias_names\") AS u) __unnested WHERE u ILIKE $1)"
        );
        assert_eq!(params, vec![Value::from("foo")]);

        let (sql, _) = compile(Where::new().filter("aliases", Condition::like(vec!["a", "b"]).negate()));
        assert_eq!(
            sql,
            "(NOT EXISTS(SELECT 1 FROM (SELECT unnest(\"alias_names\") AS u) __unnested WHERE u ILIKE $1) AND NOT EXISTS(SELECT 1 FROM (SELECT unnest(\"alias_names\") AS u) __unnested WHERE u ILIKE $2))"
        );
    }

    #[test]
    fn test_like_on_json_is_rejected() {
        let err = compile_err(Where::new().filter("metadata", Condition::like("a")));
        assert_eq!(err.code, ErrorCode::UnsupportedOperator);
    }

    #[test]
    fn test_json_contains() {
        let (sql, params) = compile(Where::new().filter("metadata", Condition::contains(json!({ "a": 1 }))));
        assert_eq!(sql, "\"metadata\"@>$1::jsonb");
        assert_eq!(params, vec![Value::Json(json!({ "a": 1 }))]);

        let (sql, _) = compile(Where::new().filter(
            "metadata",
            Condition::contains(json!({ "a": 1 })).negate(),
        ));
        assert_eq!(sql, "NOT \"metadata\"@>$1::jsonb");

        let (sql, _) = compile(Where::new().filter(
            "metadata",
            Condition::contains(vec![json!({ "a": 1 }), json!({ "b": 2 })]),
        ));
        assert_eq!(sql, "(\"metadata\"@>$1::jsonb OR \"metadata\"@>$2::jsonb)");

        assert_eq!(
            compile(Where::new().filter("metadata", Condition::contains(Value::Null))).0,
            "\"metadata\" IS NULL"
        );
        assert_eq!(
            compile(Where::new().filter("metadata", Condition::contains(Vec::<Value>::new()))).0,
            "1<>1"
        );
    }

    #[test]
    fn test_comparisons() {
        let (sql, params) = compile(
            Where::new().filter("price", Condition::gte(10).and(Condition::lt(20))),
        );
        assert_eq!(sql, "(\"price\">=$1 AND \"price\"<$2)");
        assert_eq!(params, vec![Value::Int(10), Value::Int(20)]);

        let (sql, _) = compile(Where::new().filter(
            "price",
            Condition::gte(10).and(Condition::lt(20)).negate(),
        ));
        assert_eq!(sql, "(\"price\"<$1 OR \"price\">=$2)");
    }

    #[test]
    fn test_double_negation_restores_fragment() {
        let plain = compile(Where::new().eq("name", "a"));
        let twice = compile(Where::new().filter(
            "name",
            Condition::Not(Box::new(Condition::Not(Box::new(Condition::equals("a"))))),
        ));
        assert_eq!(plain, twice);
    }

    #[test]
    fn test_and_or_groups() {
        let (sql, params) = compile(Where::new().or([
            Where::new().eq("name", "a"),
            Where::new().eq("name", "b").eq("sku", "c"),
        ]));
        assert_eq!(sql, "((\"name\"=$1) OR (\"name\"=$2 AND \"sku\"=$3))");
        assert_eq!(params.len(), 3);

        let (sql, _) = compile(Where::new().and([Where::new().eq("name", "a")]));
        assert_eq!(sql, "(\"name\"=$1)");
    }

    #[test]
    fn test_and_wrapping_preserves_parameter_order() {
        let document = Where::new().eq("name", "a").filter("price", Condition::gt(3));
        let (direct_sql, direct_params) = compile(document.clone());
        let (wrapped_sql, wrapped_params) = compile(Where::new().and([document]));
        assert_eq!(wrapped_sql, format!("({})", direct_sql));
        assert_eq!(wrapped_params, direct_params);
    }

    #[test]
    fn test_empty_group_is_an_error() {
        let err = compile_err(Where::new().or(Vec::new()));
        assert_eq!(err.code, ErrorCode::EmptyWhere);
        assert!(err.message.contains("WHERE statement is unexpectedly empty"));
    }

    #[test]
    fn test_record_values_reduce_to_primary_key() {
        let store = Record::new().set("id", 4).set("name", "Acme");
        let (sql, params) = compile(Where::new().eq("store", store));
        assert_eq!(sql, "\"store_id\"=$1");
        assert_eq!(params, vec![Value::Int(4)]);
    }

    #[test]
    fn test_unknown_property_and_alias() {
        assert_eq!(compile_err(Where::new().eq("nope", 1)).code, ErrorCode::UnknownProperty);
        let err = compile_err(Where::new().eq("store.name", "a"));
        assert_eq!(err.code, ErrorCode::UnknownAlias);
        assert!(err.message.contains("store.name"));
    }

    #[test]
    fn test_alias_paths() {
        let registry = fixtures::registry();
        let product = registry.get("Product").unwrap();
        let mut aliases = AliasTable::new();
        aliases.insert("store".into(), JoinTarget::Model(registry.get("Store").unwrap()));
        let scope = Scope::new(&registry, &product).qualified().with_aliases(aliases);
        let mut params = Params::new();
        let sql = compile_where(
            &scope,
            &Where::new().eq("store.name", "Acme").eq("name", "Widget"),
            &mut params,
        )
        .unwrap()
        .unwrap();
        assert_eq!(sql, "\"store\".\"name\"=$1 AND \"products\".\"name\"=$2");
    }

    #[test]
    fn test_subquery_operators() {
        let registry = fixtures::registry();
        let store = registry.get("Store").unwrap();
        let product = registry.get("Product").unwrap();

        let (sql, params) = compile_with(
            &registry,
            Where::new().filter(
                "store",
                Condition::in_subquery(Subquery::new(store.clone()).r#where(Where::new().eq("name", "Acme"))),
            ),
        )
        .unwrap();
        assert_eq!(sql, "\"store_id\" IN (SELECT \"id\" FROM \"stores\" WHERE \"name\"=$1)");
        assert_eq!(params, vec![Value::from("Acme")]);

        let (sql, _) = compile_with(
            &registry,
            Where::new().filter("store", Condition::not_in_subquery(Subquery::new(store.clone()))),
        )
        .unwrap();
        assert_eq!(sql, "\"store_id\" NOT IN (SELECT \"id\" FROM \"stores\")");

        let (sql, _) = compile_with(
            &registry,
            Where::new()
                .eq("name", "x")
                .not_exists(Subquery::new(store).r#where(Where::new().eq("name", "y"))),
        )
        .unwrap();
        assert_eq!(
            sql,
            "\"name\"=$1 AND NOT EXISTS (SELECT 1 FROM \"stores\" WHERE \"name\"=$2)"
        );

        let (sql, _) = compile_with(
            &registry,
            Where::new().filter(
                "price",
                Condition::compare_subquery(Comparison::Gt, Subquery::new(product).avg("price")),
            ),
        )
        .unwrap();
        assert_eq!(sql, "\"price\">(SELECT AVG(\"price\") AS \"avg\" FROM \"products\")");
    }
}
