//! DELETE statements.

use crate::compiler::{Scope, compile_where};
use crate::error::QueryResult;
use crate::filter::Where;
use crate::metadata::{ModelMetadata, ModelRegistry};
use crate::sql::{CompiledStatement, Params};

use super::{Returning, returning_sql};

/// Compile `DELETE FROM ... [WHERE ...] [RETURNING ...]`.
pub fn compile_delete(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    filter: &Where,
    returning: &Returning,
) -> QueryResult<CompiledStatement> {
    let scope = Scope::new(registry, model);
    let mut params = Params::new();

    let mut sql = format!("DELETE FROM {}", model.qualified_table());
    if let Some(condition) = compile_where(&scope, filter, &mut params)? {
        sql.push_str(" WHERE ");
        sql.push_str(&condition);
    }
    sql.push_str(&returning_sql(&scope, returning)?);
    Ok(CompiledStatement::new(sql, params))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures;
    use crate::filter::Condition;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_delete_all() {
        let registry = fixtures::registry();
        let model = registry.get("Category").unwrap();
        let statement = compile_delete(&registry, &model, &Where::new(), &Returning::None).unwrap();
        assert_eq!(statement.sql(), "DELETE FROM \"categories\"");
    }

    #[test]
    fn test_delete_with_where_and_returning() {
        let registry = fixtures::registry();
        let model = registry.get("Product").unwrap();
        let statement = compile_delete(
            &registry,
            &model,
            &Where::new().filter("name", Condition::starts_with("old")),
            &Returning::Columns(vec!["name".into()]),
        )
        .unwrap();
        assert_eq!(
            statement.sql(),
            "DELETE FROM \"products\" WHERE \"name\" ILIKE $1 RETURNING \"name\",\"id\""
        );
        assert_eq!(statement.params()[0], crate::value::Value::from("old%"));
    }
}
