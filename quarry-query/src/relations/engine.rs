//! Batched population of relations.
//!
//! Each requested relation costs one secondary statement (two for
//! many-to-many) no matter how many parent records there are. Relations are
//! resolved one after another, in request order; nested populates run on the
//! fetched rows before they are attached to their parents.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};

use crate::compiler::selected_properties;
use crate::error::{ExecuteError, QueryError};
use crate::filter::Where;
use crate::metadata::{ModelMetadata, ModelRegistry, RelationKind, RelationMetadata};
use crate::options::QueryOptions;
use crate::statement::compile_select;
use crate::traits::{BoxFuture, Executor, run};
use crate::value::{Record, Value};

use super::Populate;

type PopulateResult<X> = Result<(), ExecuteError<<X as Executor>::Error>>;

/// Populate `populates` on `records` of `model`.
///
/// `selected` lists the properties the parent query projected. A populate
/// carrying its own pool runs on it, and its nested populates inherit it.
pub(crate) fn populate_records<'a, X: Executor>(
    registry: &'a ModelRegistry,
    model: &'a ModelMetadata,
    records: &'a mut [Record],
    selected: &'a [String],
    populates: &'a [Populate<X>],
    executor: &'a Arc<X>,
) -> BoxFuture<'a, PopulateResult<X>> {
    Box::pin(async move {
        for populate in populates {
            if let Some(err) = &populate.error {
                return Err(err.clone().into());
            }
            let executor = populate.pool.as_ref().unwrap_or(executor);
            let (relation, target) = registry.relation(model, &populate.property)?;
            let step = Step {
                registry,
                model,
                relation,
                target: &target,
                populate,
                executor,
            };

            match relation.kind {
                RelationKind::BelongsTo => step.belongs_to(records, selected).await?,
                RelationKind::HasMany | RelationKind::SelfReference => step.has_many(records).await?,
                RelationKind::ManyToMany => step.many_to_many(records).await?,
            }
        }
        Ok(())
    })
}

/// One relation being populated.
struct Step<'a, X> {
    registry: &'a ModelRegistry,
    model: &'a ModelMetadata,
    relation: &'a RelationMetadata,
    target: &'a ModelMetadata,
    populate: &'a Populate<X>,
    executor: &'a Arc<X>,
}

impl<X: Executor> Step<'_, X> {
    async fn belongs_to(&self, records: &mut [Record], selected: &[String]) -> PopulateResult<X> {
        let property = self.relation.property_name.as_str();
        if !selected.iter().any(|p| p == property) {
            let column = self
                .model
                .column(property)
                .map_or(property, |c| c.column_name.as_str());
            return Err(QueryError::missing_relation_column(&self.model.name, property, column).into());
        }

        let keys = distinct_keys(records.iter().filter_map(|r| r.get(property)));
        quarry_debug!(
            model = %self.model.name,
            relation = property,
            keys = keys.len(),
            "Populating belongs-to relation"
        );
        if keys.is_empty() {
            return Ok(());
        }

        let primary_key = self.target.primary_key().property_name.as_str();
        let rows = self
            .fetch_targets(self.options(primary_key, keys, self.populate.select.clone()), primary_key)
            .await?;

        let by_key: HashMap<String, Arc<Record>> = rows
            .into_iter()
            .filter_map(|(key, row)| Some((key?, Arc::new(row))))
            .collect();
        for record in records.iter_mut() {
            let Some(key) = record.get(property).and_then(Value::key) else {
                continue;
            };
            if let Some(row) = by_key.get(&key) {
                record.insert(property, Value::Record(Arc::clone(row)));
            }
        }
        Ok(())
    }

    async fn has_many(&self, records: &mut [Record]) -> PopulateResult<X> {
        let property = self.relation.property_name.as_str();
        let via = self.via()?;
        let keys = self.parent_keys(records)?;
        quarry_debug!(
            model = %self.model.name,
            relation = property,
            keys = keys.len(),
            "Populating has-many relation"
        );
        if records.is_empty() {
            return Ok(());
        }

        let mut groups: IndexMap<String, Vec<Value>> = IndexMap::new();
        if !keys.is_empty() {
            let select = self.populate.select.clone().map(|mut select| {
                if !select.iter().any(|p| p == via) {
                    select.push(via.to_string());
                }
                select
            });
            let rows = self.fetch_targets(self.options(via, keys, select), via).await?;
            for (key, row) in rows {
                if let Some(key) = key {
                    groups.entry(key).or_default().push(Value::from(row));
                }
            }
        }

        let primary_key = self.model.primary_key().property_name.as_str();
        for record in records.iter_mut() {
            let children = record
                .get(primary_key)
                .and_then(Value::key)
                .and_then(|key| groups.get(&key).cloned())
                .unwrap_or_default();
            record.insert(property, Value::List(children));
        }
        Ok(())
    }

    async fn many_to_many(&self, records: &mut [Record]) -> PopulateResult<X> {
        let property = self.relation.property_name.as_str();
        let through = self.relation.through.as_ref().ok_or_else(|| {
            QueryError::invalid_model(&self.model.name, format!("relation `{}` has no junction", property))
        })?;
        let junction = self.registry.get(&through.model)?;
        let keys = self.parent_keys(records)?;
        quarry_debug!(
            model = %self.model.name,
            relation = property,
            junction = %junction.name,
            keys = keys.len(),
            "Populating many-to-many relation"
        );
        if records.is_empty() {
            return Ok(());
        }

        // Target keys per owner, in junction fetch order.
        let mut links: IndexMap<String, Vec<String>> = IndexMap::new();
        let mut target_keys = Vec::new();
        if !keys.is_empty() {
            let options = QueryOptions {
                select: Some(vec![through.source.clone(), through.target.clone()]),
                filter: Where::new()
                    .eq(through.source.as_str(), keys)
                    .merge(self.populate.through.filter.clone()),
                sorts: self.populate.through.sorts.clone(),
                ..QueryOptions::default()
            };
            let rows = self.fetch(&junction, &options).await?;
            let mut seen = HashSet::new();
            for row in &rows {
                let (Some(owner), Some(target)) = (row.get(&through.source), row.get(&through.target)) else {
                    continue;
                };
                let (Some(owner_key), Some(target_key)) = (owner.key(), target.key()) else {
                    continue;
                };
                if seen.insert(target_key.clone()) {
                    target_keys.push(target.clone());
                }
                links.entry(owner_key).or_default().push(target_key);
            }
        }

        let mut targets: IndexMap<String, Arc<Record>> = IndexMap::new();
        if !target_keys.is_empty() {
            let primary_key = self.target.primary_key().property_name.as_str();
            let rows = self
                .fetch_targets(self.options(primary_key, target_keys, self.populate.select.clone()), primary_key)
                .await?;
            targets = rows
                .into_iter()
                .filter_map(|(key, row)| Some((key?, Arc::new(row))))
                .collect();
        }

        let fetch_order = !self.populate.sorts.is_empty() && self.populate.through.sorts.is_empty();
        let primary_key = self.model.primary_key().property_name.as_str();
        for record in records.iter_mut() {
            let owned = record
                .get(primary_key)
                .and_then(Value::key)
                .and_then(|key| links.get(&key));
            let items: Vec<Value> = match owned {
                None => Vec::new(),
                Some(owned) if fetch_order => {
                    let owned: HashSet<&String> = owned.iter().collect();
                    targets
                        .iter()
                        .filter(|(key, _)| owned.contains(key))
                        .map(|(_, row)| Value::Record(Arc::clone(row)))
                        .collect()
                }
                Some(owned) => owned
                    .iter()
                    .filter_map(|key| targets.get(key))
                    .map(|row| Value::Record(Arc::clone(row)))
                    .collect(),
            };
            record.insert(property, Value::List(items));
        }
        Ok(())
    }

    /// Options for a secondary fetch of the relation's target by `property IN keys`.
    fn options(&self, property: &str, keys: Vec<Value>, select: Option<Vec<String>>) -> QueryOptions {
        QueryOptions {
            select,
            filter: Where::new().eq(property, keys).merge(self.populate.filter.clone()),
            sorts: self.populate.sorts.clone(),
            skip: self.populate.skip,
            limit: self.populate.limit,
            ..QueryOptions::default()
        }
    }

    /// Run a secondary fetch.
    async fn fetch(&self, model: &ModelMetadata, options: &QueryOptions) -> Result<Vec<Record>, ExecuteError<X::Error>> {
        let statement = compile_select(self.registry, model, options)?;
        run(self.executor.as_ref(), &statement).await
    }

    /// Fetch target rows keyed by `key_property`, then resolve nested populates.
    ///
    /// Keys are read before nesting since a nested populate may replace them.
    async fn fetch_targets(
        &self,
        options: QueryOptions,
        key_property: &str,
    ) -> Result<Vec<(Option<String>, Record)>, ExecuteError<X::Error>> {
        let mut rows = self.fetch(self.target, &options).await?;
        let keys: Vec<Option<String>> = rows
            .iter()
            .map(|row| row.get(key_property).and_then(Value::key))
            .collect();

        if !self.populate.populates.is_empty() {
            let selected = selected_properties(self.target, options.select.as_deref())?;
            populate_records(
                self.registry,
                self.target,
                &mut rows,
                &selected,
                &self.populate.populates,
                self.executor,
            )
            .await?;
        }
        Ok(keys.into_iter().zip(rows).collect())
    }

    fn via(&self) -> Result<&str, QueryError> {
        self.relation.via.as_deref().ok_or_else(|| {
            QueryError::invalid_model(
                &self.model.name,
                format!("relation `{}` has no `via` property", self.relation.property_name),
            )
        })
    }

    /// Distinct primary keys of the parents; every parent must carry one.
    fn parent_keys(&self, records: &[Record]) -> Result<Vec<Value>, QueryError> {
        let primary_key = self.model.primary_key().property_name.as_str();
        let values = records
            .iter()
            .map(|record| {
                record
                    .get(primary_key)
                    .filter(|v| !v.is_null())
                    .ok_or_else(|| QueryError::missing_primary_key(&self.model.name, primary_key))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(distinct_keys(values.into_iter()))
    }
}

/// Distinct non-null key values, in first-seen order.
fn distinct_keys<'v>(values: impl Iterator<Item = &'v Value>) -> Vec<Value> {
    let mut seen = IndexSet::new();
    values
        .filter(|value| value.key().is_some_and(|key| seen.insert(key)))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::fixtures;
    use crate::error::ErrorCode;
    use crate::testing::MockExecutor;
    use crate::types::Sort;
    use pretty_assertions::assert_eq;

    fn props(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    async fn populate(
        model: &str,
        records: &mut [Record],
        selected: &[&str],
        populates: Vec<Populate<MockExecutor>>,
        mock: &Arc<MockExecutor>,
    ) -> PopulateResult<MockExecutor> {
        let registry = fixtures::registry();
        let model = registry.get(model).unwrap();
        populate_records(&registry, &model, records, &props(selected), &populates, mock).await
    }

    fn product(id: i64, store: i64) -> Record {
        Record::new().set("id", id).set("name", format!("p{}", id)).set("store", store)
    }

    #[tokio::test]
    async fn test_belongs_to_single_key_uses_equality_and_shares_rows() {
        let mock = Arc::new(MockExecutor::new().with_rows(vec![Record::new().set("id", 1).set("name", "Acme")]));
        let mut products = vec![product(1, 1), product(2, 1)];

        populate("Product", &mut products, &["id", "name", "store"], vec![Populate::new("store")], &mock)
            .await
            .unwrap();

        assert_eq!(mock.sql(), vec!["SELECT \"id\",\"name\" FROM \"stores\" WHERE \"id\"=$1"]);
        let first = products[0].get("store").and_then(Value::as_record).unwrap();
        let second = products[1].get("store").and_then(Value::as_record).unwrap();
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(first.get("name"), Some(&Value::from("Acme")));
    }

    #[tokio::test]
    async fn test_belongs_to_many_keys_uses_any() {
        let mock = Arc::new(MockExecutor::new());
        let mut products = vec![product(1, 1), product(2, 2), product(3, 1)];

        populate(
            "Product",
            &mut products,
            &["id", "store"],
            vec![Populate::new("store").select(["name"]).sort(Sort::asc("name"))],
            &mock,
        )
        .await
        .unwrap();

        let statements = mock.statements();
        assert_eq!(
            statements[0].sql(),
            "SELECT \"name\",\"id\" FROM \"stores\" WHERE \"id\"=ANY($1::INTEGER[]) ORDER BY \"name\""
        );
        assert_eq!(statements[0].params(), &[Value::List(vec![Value::Int(1), Value::Int(2)])]);
    }

    #[tokio::test]
    async fn test_belongs_to_requires_selected_column() {
        let mock = Arc::new(MockExecutor::new());
        let mut products = vec![Record::new().set("id", 1)];

        let err = populate("Product", &mut products, &["id", "name"], vec![Populate::new("store")], &mock)
            .await
            .unwrap_err();
        let err = err.as_query_error().unwrap();
        assert_eq!(err.code, ErrorCode::MissingRelationColumn);
        assert!(err.message.contains("store_id"));
        assert_eq!(mock.round_trips(), 0);
    }

    #[tokio::test]
    async fn test_belongs_to_without_keys_skips_query() {
        let mock = Arc::new(MockExecutor::new());
        let mut products = vec![Record::new().set("id", 1).set("store", Value::Null)];

        populate("Product", &mut products, &["id", "store"], vec![Populate::new("store")], &mock)
            .await
            .unwrap();
        assert_eq!(mock.round_trips(), 0);
        assert_eq!(products[0].get("store"), Some(&Value::Null));
    }

    #[tokio::test]
    async fn test_has_many_groups_children_and_forces_via() {
        let mock = Arc::new(MockExecutor::new().with_rows(vec![
            Record::new().set("name", "b").set("store", 2).set("id", 11),
            Record::new().set("name", "a").set("store", 1).set("id", 10),
            Record::new().set("name", "c").set("store", 2).set("id", 12),
        ]));
        let mut stores = vec![
            Record::new().set("id", 1),
            Record::new().set("id", 2),
            Record::new().set("id", 3),
        ];

        populate(
            "Store",
            &mut stores,
            &["id"],
            vec![Populate::new("products").select(["name"]).r#where(Where::new().not("name", Value::Null))],
            &mock,
        )
        .await
        .unwrap();

        assert_eq!(
            mock.sql()[0],
            "SELECT \"name\",\"store_id\" AS \"store\",\"id\" FROM \"products\" WHERE \"store_id\"=ANY($1::INTEGER[]) AND \"name\" IS NOT NULL"
        );
        let names = |record: &Record| -> Vec<Value> {
            record
                .get("products")
                .and_then(Value::as_list)
                .unwrap()
                .iter()
                .map(|p| p.as_record().unwrap().get("name").cloned().unwrap())
                .collect()
        };
        assert_eq!(names(&stores[0]), vec![Value::from("a")]);
        assert_eq!(names(&stores[1]), vec![Value::from("b"), Value::from("c")]);
        assert!(names(&stores[2]).is_empty());
    }

    #[tokio::test]
    async fn test_has_many_requires_primary_key() {
        let mock = Arc::new(MockExecutor::new());
        let mut stores = vec![Record::new().set("name", "Acme")];

        let err = populate("Store", &mut stores, &["name"], vec![Populate::new("products")], &mock)
            .await
            .unwrap_err();
        assert_eq!(err.as_query_error().unwrap().code, ErrorCode::MissingPrimaryKey);
    }

    fn link(product: i64, category: i64) -> Record {
        Record::new().set("product", product).set("category", category)
    }

    fn category(id: i64, name: &str) -> Record {
        Record::new().set("id", id).set("name", name)
    }

    fn category_ids(record: &Record) -> Vec<i64> {
        record
            .get("categories")
            .and_then(Value::as_list)
            .unwrap()
            .iter()
            .map(|c| c.as_record().unwrap().get("id").and_then(Value::as_i64).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_many_to_many_keeps_per_parent_junction_order() {
        let mock = Arc::new(
            MockExecutor::new()
                .with_rows(vec![link(1, 2), link(1, 1), link(2, 1)])
                .with_rows(vec![category(1, "Tools"), category(2, "Toys")]),
        );
        let mut products = vec![Record::new().set("id", 1), Record::new().set("id", 2)];

        populate(
            "Product",
            &mut products,
            &["id"],
            vec![Populate::new("categories").through_sort(Sort::asc("ordering"))],
            &mock,
        )
        .await
        .unwrap();

        assert_eq!(
            mock.sql(),
            vec![
                "SELECT \"product_id\" AS \"product\",\"category_id\" AS \"category\",\"id\" FROM \"product__category\" WHERE \"product_id\"=ANY($1::INTEGER[]) ORDER BY \"ordering\"",
                "SELECT \"id\",\"name\" FROM \"categories\" WHERE \"id\"=ANY($1::INTEGER[])",
            ]
        );
        assert_eq!(category_ids(&products[0]), vec![2, 1]);
        assert_eq!(category_ids(&products[1]), vec![1]);
    }

    #[tokio::test]
    async fn test_many_to_many_uses_fetch_order_when_only_target_sorted() {
        let mock = Arc::new(
            MockExecutor::new()
                .with_rows(vec![link(1, 1), link(1, 2)])
                .with_rows(vec![category(2, "A"), category(1, "B")]),
        );
        let mut products = vec![Record::new().set("id", 1)];

        populate(
            "Product",
            &mut products,
            &["id"],
            vec![Populate::new("categories").sort(Sort::asc("name"))],
            &mock,
        )
        .await
        .unwrap();
        assert_eq!(category_ids(&products[0]), vec![2, 1]);
    }

    #[tokio::test]
    async fn test_many_to_many_without_links_skips_target_fetch() {
        let mock = Arc::new(MockExecutor::new());
        let mut products = vec![Record::new().set("id", 1), Record::new().set("id", 2)];

        populate("Product", &mut products, &["id"], vec![Populate::new("categories")], &mock)
            .await
            .unwrap();
        assert_eq!(mock.round_trips(), 1);
        assert!(category_ids(&products[0]).is_empty());
        assert!(category_ids(&products[1]).is_empty());
    }

    #[tokio::test]
    async fn test_nested_populate_inherits_pool_override() {
        let main = Arc::new(MockExecutor::new());
        let replica = Arc::new(
            MockExecutor::new()
                .with_rows(vec![Record::new().set("id", 10).set("store", 1)])
                .with_rows(vec![Record::new().set("id", 1).set("name", "Acme")]),
        );
        let mut inventory = vec![Record::new().set("id", 1).set("product", 10)];

        populate(
            "Inventory",
            &mut inventory,
            &["id", "product"],
            vec![
                Populate::new("product")
                    .select(["store"])
                    .pool(Arc::clone(&replica))
                    .populate(Populate::new("store")),
            ],
            &main,
        )
        .await
        .unwrap();

        assert_eq!(main.round_trips(), 0);
        assert_eq!(replica.round_trips(), 2);
        let product = inventory[0].get("product").and_then(Value::as_record).unwrap();
        let store = product.get("store").and_then(Value::as_record).unwrap();
        assert_eq!(store.get("name"), Some(&Value::from("Acme")));
    }

    #[tokio::test]
    async fn test_executor_failure_aborts_population() {
        let mock = Arc::new(MockExecutor::new().with_error("connection reset"));
        let mut products = vec![product(1, 1)];

        let err = populate("Product", &mut products, &["id", "store"], vec![Populate::new("store")], &mock)
            .await
            .unwrap_err();
        assert!(err.as_executor_error().is_some());
        assert_eq!(products[0].get("store"), Some(&Value::Int(1)));
    }

    #[tokio::test]
    async fn test_unknown_relation() {
        let mock = Arc::new(MockExecutor::new());
        let mut products = vec![product(1, 1)];

        let err = populate("Product", &mut products, &["id"], vec![Populate::new("nope")], &mock)
            .await
            .unwrap_err();
        assert_eq!(err.as_query_error().unwrap().code, ErrorCode::UnknownRelation);
    }
}
