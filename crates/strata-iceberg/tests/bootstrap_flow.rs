//! Integration tests for the tenant provisioning pipeline.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use strata_iceberg::types::{NamespaceIdent, TableIdent};
use strata_iceberg::{
    BootstrapRequest, Catalog, CatalogBootstrapper, IcebergError, IcebergResult, MemoryCatalog,
    SchemaField, StorageProvider, Table, TableCreation, TableSpec, WarehouseStorageManager,
};
use strata_test_utils::{
    StaticCatalogLoader, StorageOp, TestContext, analytics_config, analytics_config_with_metadata,
    init_test_logging,
};

fn acme_namespace() -> NamespaceIdent {
    vec!["clients".to_string(), "acme".to_string()]
}

#[tokio::test]
async fn acme_bootstrap_creates_default_tables() {
    init_test_logging();
    let ctx = TestContext::with_tenant("acme");
    let config = analytics_config();

    let result = ctx
        .bootstrapper()
        .bootstrap(&config, BootstrapRequest::new("acme"))
        .await
        .expect("bootstrap");

    assert_eq!(result.tenant, "acme");
    assert_eq!(result.namespace, acme_namespace());
    assert_eq!(result.warehouse_uri, "gs://analytics/warehouse/clients/acme");
    assert!(result.created_namespace);
    let names: Vec<_> = result
        .created_tables
        .iter()
        .map(|ident| ident.name.as_str())
        .collect();
    assert_eq!(names, vec!["main", "events", "metrics"]);

    assert_eq!(result.prefix_markers.len(), 1);
    let marker = &result.prefix_markers[0];
    assert_eq!(marker.provider, StorageProvider::Gcs);
    assert_eq!(marker.bucket, "analytics");
    assert_eq!(marker.path, "warehouse/clients/acme/.catalog-bootstrap");

    let properties = ctx
        .catalog
        .namespace_properties(&acme_namespace())
        .expect("namespace");
    assert_eq!(properties["location"], "gs://analytics/warehouse/clients/acme");

    for name in ["main", "events", "metrics"] {
        let metadata = ctx
            .catalog
            .table_metadata(&TableIdent::new(acme_namespace(), name))
            .expect("table");
        assert_eq!(
            metadata.location,
            format!("gs://analytics/warehouse/clients/acme/{name}")
        );
        assert_eq!(metadata.properties["write.format.default"], "parquet");
        assert_eq!(metadata.partition_specs[0].fields.len(), 1);
    }
}

#[tokio::test]
async fn second_bootstrap_is_a_no_op() {
    let ctx = TestContext::new();
    let config = analytics_config();
    let bootstrapper = ctx.bootstrapper();

    bootstrapper
        .bootstrap(&config, BootstrapRequest::new(&ctx.tenant))
        .await
        .expect("first bootstrap");
    let again = bootstrapper
        .bootstrap(&config, BootstrapRequest::new(&ctx.tenant))
        .await
        .expect("second bootstrap");

    assert!(!again.created_namespace);
    assert!(again.created_tables.is_empty());
    assert_eq!(ctx.catalog.table_identifiers().len(), 3);
}

#[tokio::test]
async fn metadata_bucket_gets_its_own_marker() {
    let ctx = TestContext::with_tenant("acme");
    let config = analytics_config_with_metadata();

    let result = ctx
        .bootstrapper()
        .bootstrap(&config, BootstrapRequest::new("acme"))
        .await
        .expect("bootstrap");

    let paths: Vec<_> = result
        .prefix_markers
        .iter()
        .map(|m| (m.bucket.as_str(), m.path.as_str()))
        .collect();
    assert_eq!(
        paths,
        vec![
            ("analytics", "warehouse/clients/acme/.catalog-bootstrap"),
            ("metadata", "meta/clients/acme/.catalog-bootstrap"),
        ]
    );
    assert_eq!(
        ctx.storage.backend("metadata").written_paths(),
        vec!["meta/clients/acme/.catalog-bootstrap"]
    );
}

#[tokio::test]
async fn marker_is_plain_text() {
    let ctx = TestContext::with_tenant("acme");
    ctx.bootstrapper()
        .prepare_storage("acme", &analytics_config())
        .await
        .expect("prepare storage");

    let ops = ctx.storage.backend("analytics").operations();
    assert!(matches!(
        ops.as_slice(),
        [StorageOp::Put { content_type: Some(ct), .. }] if ct == "text/plain"
    ));
    assert!(ctx.catalog.table_identifiers().is_empty());
}

#[tokio::test]
async fn provider_options_reach_the_storage_factory() {
    let ctx = TestContext::new();
    let config = analytics_config().with_provider_option("service_account_path", "/etc/sa.json");

    ctx.bootstrapper()
        .prepare_storage(&ctx.tenant, &config)
        .await
        .expect("prepare storage");

    let calls = ctx.storage.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].provider, StorageProvider::Gcs);
    assert_eq!(calls[0].options["service_account_path"], "/etc/sa.json");
}

#[tokio::test]
async fn storage_failure_aborts_before_catalog() {
    let ctx = TestContext::with_tenant("acme");
    ctx.storage
        .backend("analytics")
        .inject_failure("warehouse/clients/acme");

    let err = ctx
        .bootstrapper()
        .bootstrap(&analytics_config(), BootstrapRequest::new("acme"))
        .await
        .expect_err("storage failure");

    match err {
        IcebergError::Storage {
            provider,
            bucket,
            path,
            ..
        } => {
            assert_eq!(provider, StorageProvider::Gcs);
            assert_eq!(bucket, "analytics");
            assert_eq!(path, "warehouse/clients/acme/.catalog-bootstrap");
        }
        other => panic!("expected storage error, got {other:?}"),
    }
    assert!(!ctx.catalog.namespace_exists(&acme_namespace()).await.unwrap());
    assert!(ctx.loader.requests().is_empty());
}

#[tokio::test]
async fn unavailable_metadata_bucket_aborts_before_catalog() {
    let ctx = TestContext::with_tenant("acme");
    ctx.storage.make_unavailable("metadata");

    let err = ctx
        .bootstrapper()
        .bootstrap(&analytics_config_with_metadata(), BootstrapRequest::new("acme"))
        .await
        .expect_err("storage failure");

    assert!(matches!(err, IcebergError::Storage { ref bucket, .. } if bucket == "metadata"));
    assert!(ctx.catalog.table_identifiers().is_empty());
}

#[tokio::test]
async fn failed_table_is_not_rolled_back_and_retry_completes() {
    let ctx = TestContext::with_tenant("acme");
    let config = analytics_config();
    let bootstrapper = ctx.bootstrapper();
    ctx.catalog.fail_table_creation("events");

    let err = bootstrapper
        .bootstrap(&config, BootstrapRequest::new("acme"))
        .await
        .expect_err("injected failure");
    assert!(matches!(err, IcebergError::Catalog { .. }));
    assert_eq!(
        ctx.catalog.table_identifiers(),
        vec![TableIdent::new(acme_namespace(), "main")]
    );

    ctx.catalog.clear_failures();
    let retry = bootstrapper
        .bootstrap(&config, BootstrapRequest::new("acme"))
        .await
        .expect("retry");
    assert!(!retry.created_namespace);
    let names: Vec<_> = retry
        .created_tables
        .iter()
        .map(|ident| ident.name.as_str())
        .collect();
    assert_eq!(names, vec!["events", "metrics"]);
    assert_eq!(ctx.catalog.table_identifiers().len(), 3);
}

#[tokio::test]
async fn custom_tables_replace_defaults() {
    let ctx = TestContext::with_tenant("acme");
    let tables = vec![
        TableSpec::new(
            "orders",
            vec![
                SchemaField::new("order_id", "long").required(),
                SchemaField::new("amount", "decimal(12, 2)"),
                SchemaField::new("placed_on", "date"),
            ],
        )
        .partitioned_by(["placed_on"])
        .with_property("write.format.default", "parquet"),
    ];

    let result = ctx
        .bootstrapper()
        .bootstrap(
            &analytics_config(),
            BootstrapRequest::new("acme")
                .with_tables(tables)
                .with_namespace_property("owner", "finance"),
        )
        .await
        .expect("bootstrap");

    assert_eq!(
        result.created_tables,
        vec![TableIdent::new(acme_namespace(), "orders")]
    );
    let metadata = ctx
        .catalog
        .table_metadata(&TableIdent::new(acme_namespace(), "orders"))
        .expect("orders");
    let spec = metadata.default_partition_spec().expect("partition spec");
    assert_eq!(spec.fields[0].source_id, 3);
    assert_eq!(spec.fields[0].field_id, 4);
    assert_eq!(
        ctx.catalog
            .namespace_properties(&acme_namespace())
            .expect("namespace")["owner"],
        "finance"
    );
}

#[tokio::test]
async fn unpartitioned_table_gets_no_partition_spec() {
    let ctx = TestContext::with_tenant("acme");
    let tables = vec![TableSpec::new("lookup", vec![SchemaField::new("key", "string")])];

    ctx.bootstrapper()
        .bootstrap(&analytics_config(), BootstrapRequest::new("acme").with_tables(tables))
        .await
        .expect("bootstrap");

    let metadata = ctx
        .catalog
        .table_metadata(&TableIdent::new(acme_namespace(), "lookup"))
        .expect("lookup");
    assert!(metadata.partition_specs.is_empty());
}

#[tokio::test]
async fn missing_partition_column_fails_before_io() {
    let ctx = TestContext::with_tenant("acme");
    let tables = vec![
        TableSpec::new("broken", vec![SchemaField::new("id", "long")]).partitioned_by(["day"]),
    ];

    let err = ctx
        .bootstrapper()
        .bootstrap(&analytics_config(), BootstrapRequest::new("acme").with_tables(tables))
        .await
        .expect_err("invalid table");

    assert!(err.is_invalid_argument());
    assert!(ctx.storage.calls().is_empty());
    assert!(ctx.loader.requests().is_empty());
}

#[tokio::test]
async fn open_resolves_without_mutating() {
    let ctx = TestContext::with_tenant("acme");
    let config = analytics_config().with_catalog_option("warehouse", "analytics");

    let handle = ctx.bootstrapper().open(" acme ", &config).expect("open");

    assert_eq!(handle.tenant, "acme");
    assert_eq!(handle.namespace, acme_namespace());
    assert_eq!(handle.warehouse_uri, "gs://analytics/warehouse/clients/acme");
    assert!(!handle.catalog.namespace_exists(&acme_namespace()).await.unwrap());
    let requests = ctx.loader.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "clients");
    assert_eq!(requests[0].1["warehouse"], "analytics");
    assert!(ctx.storage.calls().is_empty());
}

/// Catalog whose existence checks always miss, so every create races with
/// an entry that is already there.
struct RacingCatalog(MemoryCatalog);

#[async_trait]
impl Catalog for RacingCatalog {
    async fn namespace_exists(&self, _namespace: &NamespaceIdent) -> IcebergResult<bool> {
        Ok(false)
    }

    async fn create_namespace(
        &self,
        namespace: &NamespaceIdent,
        properties: BTreeMap<String, String>,
    ) -> IcebergResult<()> {
        self.0.create_namespace(namespace, properties).await
    }

    async fn table_exists(&self, _identifier: &TableIdent) -> IcebergResult<bool> {
        Ok(false)
    }

    async fn create_table(
        &self,
        identifier: &TableIdent,
        creation: TableCreation,
    ) -> IcebergResult<Box<dyn Table>> {
        self.0.create_table(identifier, creation).await
    }

    async fn load_table(&self, identifier: &TableIdent) -> IcebergResult<Box<dyn Table>> {
        self.0.load_table(identifier).await
    }
}

#[tokio::test]
async fn concurrent_creation_counts_as_existing() {
    let ctx = TestContext::with_tenant("acme");
    let config = analytics_config();
    ctx.bootstrapper()
        .bootstrap(&config, BootstrapRequest::new("acme"))
        .await
        .expect("first bootstrap");

    let racing = CatalogBootstrapper::new(
        WarehouseStorageManager::new(Arc::new(ctx.storage.clone())),
        Arc::new(StaticCatalogLoader::new(Arc::new(RacingCatalog(
            ctx.catalog.clone(),
        )))),
    );
    let result = racing
        .bootstrap(&config, BootstrapRequest::new("acme"))
        .await
        .expect("racing bootstrap");

    assert!(!result.created_namespace);
    assert!(result.created_tables.is_empty());
}
