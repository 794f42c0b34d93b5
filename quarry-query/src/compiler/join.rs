//! JOIN clause compilation.

use crate::error::{QueryError, QueryResult};
use crate::join::{Join, RelationJoin, SubqueryJoin};
use crate::metadata::{ModelMetadata, ModelRegistry, RelationKind};
use crate::sql::{Params, quote_identifier};

use super::predicate::compile_where;
use super::subquery::{SubqueryUsage, compile_subquery};
use super::{AliasTable, JoinTarget, Scope};

/// Compiled joins plus the aliases they make visible.
#[derive(Debug, Clone, Default)]
pub struct CompiledJoins {
    /// One fragment per join, in order.
    pub clauses: Vec<String>,
    /// Alias table for resolving `alias.property` paths.
    pub aliases: AliasTable,
}

impl CompiledJoins {
    /// Check if there are no joins.
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Compile joins. Must run before the WHERE clause so placeholders stay in order.
pub fn compile_joins(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    joins: &[Join],
    params: &mut Params,
) -> QueryResult<CompiledJoins> {
    let mut compiled = CompiledJoins::default();
    for join in joins {
        let (alias, clause, target) = match join {
            Join::Relation(join) => relation_join(registry, model, join, params)?,
            Join::Subquery(join) => subquery_join(registry, model, join, params)?,
        };
        if compiled.aliases.contains_key(&alias) {
            return Err(QueryError::invalid_model(
                &model.name,
                format!("join alias `{}` is used more than once", alias),
            ));
        }
        compiled.clauses.push(clause);
        compiled.aliases.insert(alias, target);
    }
    Ok(compiled)
}

fn relation_join(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    join: &RelationJoin,
    params: &mut Params,
) -> QueryResult<(String, String, JoinTarget)> {
    let (relation, target) = registry.relation(model, &join.property)?;
    let alias = join.alias_name().to_string();
    let quoted_alias = quote_identifier(&alias)?;

    let base = Scope::new(registry, model).qualified();
    let joined = Scope::new(registry, &target).with_qualifier(&alias);

    let condition = match relation.kind {
        RelationKind::BelongsTo => format!(
            "{}={}",
            base.column_sql(base.column(&relation.property_name)?),
            joined.column_sql(target.primary_key())
        ),
        RelationKind::HasMany | RelationKind::SelfReference => {
            let via = relation.via.as_deref().unwrap_or_default();
            format!(
                "{}={}",
                base.column_sql(model.primary_key()),
                joined.column_sql(joined.column(via)?)
            )
        }
        RelationKind::ManyToMany => {
            return Err(QueryError::unsupported_operator(
                &model.name,
                &relation.property_name,
                "join",
            )
            .with_suggestion("Join the junction model, or use populate() for many-to-many relations"));
        }
    };

    let mut clause = format!(
        "{} {} AS {} ON {}",
        join.kind.as_sql(),
        target.qualified_table(),
        quoted_alias,
        condition
    );
    if let Some(on) = &join.on {
        if let Some(extra) = compile_where(&joined, on, params)? {
            clause.push_str(" AND ");
            clause.push_str(&extra);
        }
    }

    Ok((alias, clause, JoinTarget::Model(target)))
}

fn subquery_join(
    registry: &ModelRegistry,
    model: &ModelMetadata,
    join: &SubqueryJoin,
    params: &mut Params,
) -> QueryResult<(String, String, JoinTarget)> {
    let alias = join
        .alias
        .clone()
        .ok_or_else(|| QueryError::subquery_alias_required(&model.name))?;
    let quoted_alias = quote_identifier(&alias)?;

    if join.on.is_empty() {
        return Err(QueryError::invalid_subquery(format!(
            "Subquery join `{}` on {} needs at least one ON column pair",
            alias, model.name
        )));
    }

    let compiled = compile_subquery(registry, &join.subquery, SubqueryUsage::Join, params)?;

    let base = Scope::new(registry, model).qualified();
    let mut conditions = Vec::with_capacity(join.on.len());
    for (property, column) in &join.on {
        let output = compiled
            .columns
            .iter()
            .find(|c| &c.name == column)
            .ok_or_else(|| QueryError::unknown_property(&alias, column))?;
        conditions.push(format!(
            "{}={}.{}",
            base.column_sql(base.column(property)?),
            quoted_alias,
            quote_identifier(&output.name)?
        ));
    }

    let clause = format!(
        "{} ({}) AS {} ON {}",
        join.kind.as_sql(),
        compiled.sql,
        quoted_alias,
        conditions.join(" AND ")
    );
    Ok((alias, clause, JoinTarget::Subquery(compiled.columns)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures;
    use crate::error::ErrorCode;
    use crate::filter::Where;
    use crate::subquery::{Aggregate, Subquery};
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    fn compile(model: &str, joins: Vec<Join>) -> QueryResult<(CompiledJoins, Vec<Value>)> {
        let registry = fixtures::registry();
        let model = registry.get(model).unwrap();
        let mut params = Params::new();
        let compiled = compile_joins(&registry, &model, &joins, &mut params)?;
        Ok((compiled, params.into_values()))
    }

    #[test]
    fn test_belongs_to_join_with_on_filter() {
        let (compiled, params) = compile(
            "Product",
            vec![Join::inner("store").on(Where::new().eq("name", "Acme")).into()],
        )
        .unwrap();
        assert_eq!(
            compiled.clauses,
            vec![
                "INNER JOIN \"stores\" AS \"store\" ON \"products\".\"store_id\"=\"store\".\"id\" AND \"store\".\"name\"=$1"
                    .to_string()
            ]
        );
        assert_eq!(params, vec![Value::from("Acme")]);
        assert!(compiled.aliases.contains_key("store"));
    }

    #[test]
    fn test_has_many_left_join_with_alias() {
        let (compiled, _) = compile("Store", vec![Join::left("products").alias("p").into()]).unwrap();
        assert_eq!(
            compiled.clauses[0],
            "LEFT JOIN \"products\" AS \"p\" ON \"stores\".\"id\"=\"p\".\"store_id\""
        );
    }

    #[test]
    fn test_join_errors() {
        assert_eq!(
            compile("Product", vec![Join::inner("name").into()]).unwrap_err().code,
            ErrorCode::UnknownRelation
        );
        assert_eq!(
            compile("Product", vec![Join::inner("categories").into()]).unwrap_err().code,
            ErrorCode::UnsupportedOperator
        );
        assert_eq!(
            compile("Product", vec![Join::inner("store").alias("x; --").into()]).unwrap_err().code,
            ErrorCode::InvalidIdentifier
        );
    }

    #[test]
    fn test_subquery_join() {
        let registry = fixtures::registry();
        let counts = Subquery::new(registry.get("Product").unwrap())
            .select(["store"])
            .aggregate(Aggregate::count().alias("productCount"))
            .group_by(["store"]);

        let (compiled, _) = compile(
            "Store",
            vec![Join::left_subquery(counts).alias("stats").on("id", "store").into()],
        )
        .unwrap();
        assert_eq!(
            compiled.clauses[0],
            "LEFT JOIN (SELECT \"store_id\" AS \"store\",COUNT(*) AS \"productCount\" FROM \"products\" GROUP BY \"store_id\") AS \"stats\" ON \"stores\".\"id\"=\"stats\".\"store\""
        );
        assert!(matches!(compiled.aliases.get("stats"), Some(JoinTarget::Subquery(columns)) if columns.len() == 2));
    }

    #[test]
    fn test_subquery_join_requires_alias_and_columns() {
        let registry = fixtures::registry();
        let products = Subquery::new(registry.get("Product").unwrap());

        let err = compile("Store", vec![Join::inner_subquery(products.clone()).on("id", "store").into()])
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSubquery);
        assert!(err.message.contains("alias"));

        let err = compile("Store", vec![Join::inner_subquery(products).alias("p").into()]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidSubquery);
    }
}
