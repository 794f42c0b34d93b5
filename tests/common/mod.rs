//! Shared catalog registry for the integration tests.

use std::sync::Arc;

use quarry_query::testing::MockExecutor;
use quarry::query::{ColumnMetadata, ColumnType, ModelMetadata, ModelRegistry, Repository};

pub fn registry() -> Arc<ModelRegistry> {
    let store = ModelMetadata::builder("Store", "stores")
        .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
        .column(ColumnMetadata::new("name", ColumnType::String).required())
        .has_many("products", "Product", "store")
        .build()
        .unwrap();

    let product = ModelMetadata::builder("Product", "products")
        .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
        .column(ColumnMetadata::new("name", ColumnType::String).required())
        .column(ColumnMetadata::new("sku", ColumnType::String))
        .belongs_to("store", "Store", ColumnType::Integer)
        .many_to_many("categories", "Category", "ProductCategory", "product", "category")
        .build()
        .unwrap();

    let category = ModelMetadata::builder("Category", "categories")
        .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
        .column(ColumnMetadata::new("name", ColumnType::String).required())
        .belongs_to("parent", "Category", ColumnType::Integer)
        .self_reference("children", "parent")
        .build()
        .unwrap();

    let product_category = ModelMetadata::builder("ProductCategory", "product__category")
        .column(ColumnMetadata::new("id", ColumnType::Integer).primary_key())
        .belongs_to("product", "Product", ColumnType::Integer)
        .belongs_to("category", "Category", ColumnType::Integer)
        .column(ColumnMetadata::new("ordering", ColumnType::Integer))
        .build()
        .unwrap();

    Arc::new(
        ModelRegistry::new()
            .with(store)
            .with(product)
            .with(category)
            .with(product_category),
    )
}

#[allow(dead_code)]
pub fn repository(model: &str, mock: &Arc<MockExecutor>) -> Repository<MockExecutor> {
    Repository::new(registry(), model, Arc::clone(mock)).unwrap()
}
