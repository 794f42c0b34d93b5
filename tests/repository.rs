//! Statement building and execution through the repository API.

mod common;

use std::sync::Arc;

use pretty_assertions::assert_eq;
use quarry::prelude::*;
use quarry::query::{ErrorCode, OnConflict};
use quarry_query::testing::{MockError, MockExecutor};
use serde::Deserialize;
use serde_json::json;

use common::repository;

#[tokio::test]
async fn test_find_one_limits_to_one_row() {
    let mock = Arc::new(MockExecutor::new().with_rows(vec![Record::new().set("id", 1).set("name", "Acme")]));

    let store = repository("Store", &mock)
        .find_one()
        .r#where(filter!(name == "Acme"))
        .exec()
        .await
        .unwrap();

    assert_eq!(
        mock.sql(),
        vec!["SELECT \"id\",\"name\" FROM \"stores\" WHERE \"name\"=$1 LIMIT 1"]
    );
    assert_eq!(store.and_then(|s| s.get("id").and_then(Value::as_i64)), Some(1));
}

#[tokio::test]
async fn test_find_with_macros() {
    let mock = Arc::new(MockExecutor::new());

    repository("Product", &mock)
        .find()
        .r#where(or_filter!(filter!(name starts_with "Wid"), filter!(sku is null)))
        .exec()
        .await
        .unwrap();

    let statements = mock.statements();
    assert!(statements[0].sql().contains(" ILIKE $1"));
    assert!(statements[0].sql().contains("\"sku\" IS NULL"));
    assert_eq!(statements[0].params(), &[Value::from("Wid%")]);
}

#[test]
fn test_and_wrapping_keeps_parameters() {
    let mock = Arc::new(MockExecutor::new());
    let products = repository("Product", &mock);
    let document = Where::new().eq("name", "Widget").filter("store", Condition::gt(3));

    let direct = products.find().r#where(document.clone()).build().unwrap();
    let wrapped = products.find().r#where(and_filter!(document)).build().unwrap();

    assert_eq!(direct.params(), wrapped.params());
    assert_eq!(
        wrapped.sql(),
        "SELECT \"id\",\"name\",\"sku\",\"store_id\" AS \"store\" FROM \"products\" WHERE (\"name\"=$1 AND \"store_id\">$2)"
    );
}

#[test]
fn test_where_from_json_document() {
    let mock = Arc::new(MockExecutor::new());
    let filter = Where::from_json(
        "Product",
        &json!({
            "name": { "startsWith": "Wid" },
            "store": [7, 8],
        }),
    )
    .unwrap();

    let statement = repository("Product", &mock).find().r#where(filter).build().unwrap();

    assert_eq!(
        statement.sql(),
        "SELECT \"id\",\"name\",\"sku\",\"store_id\" AS \"store\" FROM \"products\" WHERE \"name\" ILIKE $1 AND \"store_id\"=ANY($2::INTEGER[])"
    );
    assert_eq!(
        statement.params(),
        &[Value::from("Wid%"), Value::List(vec![Value::Int(7), Value::Int(8)])]
    );
}

#[test]
fn test_where_from_json_rejects_unknown_operator() {
    let err = Where::from_json("Product", &json!({ "sku": { "~": "W" } })).unwrap_err();
    assert_eq!(err.code, ErrorCode::UnsupportedOperator);
    assert_eq!(err.context.model.as_deref(), Some("Product"));
}

#[test]
fn test_empty_select_returns_primary_key_only() {
    let mock = Arc::new(MockExecutor::new());
    let statement = repository("Product", &mock)
        .find()
        .select(Vec::<String>::new())
        .build()
        .unwrap();
    assert_eq!(statement.sql(), "SELECT \"id\" FROM \"products\"");
}

#[tokio::test]
async fn test_distinct_on_requires_matching_sort() {
    let mock = Arc::new(MockExecutor::new());

    let err = repository("Product", &mock)
        .find()
        .distinct_on(["store"])
        .sort_by("name asc")
        .exec()
        .await
        .unwrap_err();

    assert_eq!(err.as_query_error().map(|e| e.code), Some(ErrorCode::InvalidDistinctOn));
    assert_eq!(mock.round_trips(), 0);
}

#[tokio::test]
async fn test_exec_with_count_reads_window_total() {
    let mock = Arc::new(MockExecutor::new().with_rows(vec![
        Record::new().set("id", 3).set("name", "c").set("__total_count__", 41),
        Record::new().set("id", 4).set("name", "d").set("__total_count__", 41),
    ]));

    let (stores, total) = repository("Store", &mock)
        .find()
        .sort_by("id")
        .paginate(2, 2)
        .exec_with_count()
        .await
        .unwrap();

    assert_eq!(total, 41);
    assert_eq!(stores.len(), 2);
    assert!(stores.iter().all(|s| !s.contains("__total_count__")));
    assert!(mock.sql()[0].ends_with("LIMIT 2 OFFSET 2"));
}

#[tokio::test]
async fn test_exec_as_deserializes_rows() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Product {
        id: i64,
        name: String,
        sku: Option<String>,
    }

    let mock = Arc::new(MockExecutor::new().with_rows(vec![
        Record::new().set("id", 1).set("name", "Widget").set("sku", "W-1"),
        Record::new().set("id", 2).set("name", "Gadget").set("sku", Value::Null),
    ]));

    let products: Vec<Product> = repository("Product", &mock)
        .find()
        .select(["name", "sku"])
        .exec_as()
        .await
        .unwrap();

    assert_eq!(
        products,
        vec![
            Product {
                id: 1,
                name: "Widget".into(),
                sku: Some("W-1".into()),
            },
            Product {
                id: 2,
                name: "Gadget".into(),
                sku: None,
            },
        ]
    );
}

#[tokio::test]
async fn test_count() {
    let mock = Arc::new(MockExecutor::new().with_rows(vec![Record::new().set("count", 3)]));

    let total = repository("Product", &mock)
        .count()
        .r#where(filter!(store == 7))
        .exec()
        .await
        .unwrap();

    assert_eq!(total, 3);
    assert_eq!(
        mock.sql()[0],
        "SELECT count(*) AS \"count\" FROM \"products\" WHERE \"store_id\"=$1"
    );
}

#[tokio::test]
async fn test_create_many_binds_column_major() {
    let mock = Arc::new(MockExecutor::new());

    repository("Category", &mock)
        .create_many(vec![
            record! { "name" => "Tools" },
            record! { "name" => "Garden" },
        ])
        .return_records(false)
        .exec()
        .await
        .unwrap();

    let statements = mock.statements();
    assert_eq!(
        statements[0].sql(),
        "INSERT INTO \"categories\" (\"name\") VALUES ($1),($2)"
    );
    assert_eq!(statements[0].params(), &[Value::from("Tools"), Value::from("Garden")]);
}

#[tokio::test]
async fn test_create_many_empty_issues_no_statement() {
    let mock = Arc::new(MockExecutor::new());
    let rows = repository("Product", &mock).create_many(Vec::new()).exec().await.unwrap();
    assert!(rows.is_empty());
    assert_eq!(mock.round_trips(), 0);
}

#[tokio::test]
async fn test_create_merge_without_columns_does_nothing() {
    let mock = Arc::new(MockExecutor::new());

    repository("Category", &mock)
        .create(record! { "name" => "Tools" })
        .on_conflict(OnConflict::merge(["name"]).merge_columns(Vec::<String>::new()))
        .return_records(false)
        .exec()
        .await
        .unwrap();

    assert_eq!(
        mock.sql()[0],
        "INSERT INTO \"categories\" (\"name\") VALUES ($1) ON CONFLICT (\"name\") DO NOTHING"
    );
}

#[tokio::test]
async fn test_executor_errors_pass_through() {
    let mock = Arc::new(MockExecutor::new().with_error("connection reset"));

    let err = repository("Store", &mock)
        .destroy(filter!(id == 1))
        .exec()
        .await
        .unwrap_err();

    assert!(err.as_query_error().is_none());
    assert_eq!(err.as_executor_error(), Some(&MockError("connection reset".into())));
}

#[tokio::test]
async fn test_update_without_values_is_rejected() {
    let mock = Arc::new(MockExecutor::new());

    let err = repository("Store", &mock)
        .update(filter!(id == 1), Record::new())
        .exec()
        .await
        .unwrap_err();

    assert_eq!(err.as_query_error().map(|e| e.code), Some(ErrorCode::EmptyStatement));
    assert_eq!(mock.round_trips(), 0);
}
