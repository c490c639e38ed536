//! Integration tests for additive schema evolution against provisioned tables.

use std::sync::Arc;
use std::time::Duration;

use strata_iceberg::types::{PrimitiveType, TableIdent, Type};
use strata_iceberg::{
    BootstrapRequest, IcebergError, SchemaEvolutionManager, SchemaField, TableSpec,
};
use strata_test_utils::{TestContext, analytics_config};
use tokio::time::Instant;

async fn provisioned(tables: Vec<TableSpec>) -> (TestContext, TableIdent) {
    let ctx = TestContext::with_tenant("acme");
    let request = BootstrapRequest::new("acme").with_tables(tables);
    let result = ctx
        .bootstrapper()
        .bootstrap(&analytics_config(), request)
        .await
        .expect("bootstrap");
    let ident = result.created_tables[0].clone();
    (ctx, ident)
}

async fn events_table() -> (TestContext, TableIdent) {
    let ctx = TestContext::with_tenant("acme");
    ctx.bootstrapper()
        .bootstrap(&analytics_config(), BootstrapRequest::new("acme"))
        .await
        .expect("bootstrap");
    let ident = TableIdent::new(vec!["clients".into(), "acme".into()], "events");
    (ctx, ident)
}

fn manager(ctx: &TestContext, ident: &TableIdent) -> SchemaEvolutionManager {
    SchemaEvolutionManager::new(Arc::new(ctx.catalog.clone()), ident.clone())
}

#[tokio::test]
async fn required_column_is_rejected_and_schema_unchanged() {
    let (ctx, ident) = events_table().await;
    let before = ctx.catalog.table_metadata(&ident).expect("table");

    let err = manager(&ctx, &ident)
        .add_columns_if_missing(&[
            SchemaField::new("session_id", "string"),
            SchemaField::new("user_id", "string").required(),
        ])
        .await
        .expect_err("required column");

    assert!(err.is_schema_evolution());
    assert!(err.to_string().contains("user_id"));
    assert_eq!(ctx.catalog.table_metadata(&ident).expect("table"), before);
    assert_eq!(ctx.catalog.commit_count(), 0);
}

#[tokio::test]
async fn existing_column_is_skipped() {
    let (ctx, ident) = events_table().await;

    let added = manager(&ctx, &ident)
        .add_columns_if_missing(&[
            SchemaField::new("event_type", "string"),
            SchemaField::new("session_id", "string"),
        ])
        .await
        .expect("evolve");

    assert_eq!(added, vec!["session_id"]);

    let again = manager(&ctx, &ident)
        .add_columns_if_missing(&[SchemaField::new("session_id", "string")])
        .await
        .expect("evolve again");
    assert!(again.is_empty());
    assert_eq!(ctx.catalog.commit_count(), 1);
}

#[tokio::test]
async fn two_new_columns_land_in_one_commit() {
    let (ctx, ident) = events_table().await;
    let before = ctx.catalog.table_metadata(&ident).expect("table");

    let added = manager(&ctx, &ident)
        .add_columns_if_missing(&[
            SchemaField::new("country", "string").with_doc("ISO country code"),
            SchemaField::new("revenue", "decimal(10,2)"),
        ])
        .await
        .expect("evolve");

    assert_eq!(added, vec!["country", "revenue"]);
    assert_eq!(ctx.catalog.commit_count(), 1);

    let after = ctx.catalog.table_metadata(&ident).expect("table");
    assert_eq!(after.schemas.len(), 2);
    assert_eq!(after.current_schema_id, before.current_schema_id + 1);
    assert_eq!(after.last_column_id, before.last_column_id + 2);

    let schema = after.current_schema().expect("schema");
    let country = schema.find_field("country").expect("country");
    assert!(!country.required);
    assert_eq!(country.id, before.last_column_id + 1);
    assert_eq!(country.doc.as_deref(), Some("ISO country code"));
    let revenue = schema.find_field("revenue").expect("revenue");
    assert_eq!(
        revenue.field_type,
        Type::Primitive(PrimitiveType::Decimal {
            precision: 10,
            scale: 2
        })
    );
}

#[tokio::test]
async fn nested_column_is_added_under_its_parent() {
    let (ctx, ident) = provisioned(vec![TableSpec::new(
        "profiles",
        vec![
            SchemaField::new("profile_id", "string").required(),
            SchemaField::new("address", "struct"),
            SchemaField::new("city", "string").with_parent(["address"]),
        ],
    )])
    .await;

    let added = manager(&ctx, &ident)
        .add_columns_if_missing(&[
            SchemaField::new("city", "string").with_parent(["address"]),
            SchemaField::new("postcode", "string").with_parent(["address"]),
        ])
        .await
        .expect("evolve");

    assert_eq!(added, vec!["address.postcode"]);
    let metadata = ctx.catalog.table_metadata(&ident).expect("table");
    let schema = metadata.current_schema().expect("schema");
    assert_eq!(schema.find_field("address.postcode").expect("postcode").id, 4);
}

#[tokio::test]
async fn unknown_parent_fails_without_commit() {
    let (ctx, ident) = events_table().await;

    let err = manager(&ctx, &ident)
        .add_columns_if_missing(&[SchemaField::new("zip", "string").with_parent(["location"])])
        .await
        .expect_err("unknown parent");

    assert!(err.is_schema_evolution());
    assert_eq!(ctx.catalog.commit_count(), 0);
}

#[tokio::test]
async fn expired_deadline_stops_evolution() {
    let (ctx, ident) = events_table().await;
    let deadline = Instant::now();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let err = manager(&ctx, &ident)
        .with_deadline(deadline)
        .add_columns_if_missing(&[SchemaField::new("session_id", "string")])
        .await
        .expect_err("deadline");

    assert!(matches!(err, IcebergError::DeadlineExceeded { .. }));
    assert_eq!(ctx.catalog.commit_count(), 0);
}
