//! Tenant provisioning pipeline.
//!
//! A bootstrap call runs three phases, each awaited before the next starts:
//!
//! 1. **Storage**: write marker objects under the warehouse prefix (and the
//!    metadata prefix when one is configured). A failure here aborts before
//!    the catalog is touched.
//! 2. **Namespace**: create the tenant namespace unless it exists.
//! 3. **Tables**: create every declared table that does not exist yet.
//!
//! Nothing is rolled back. Every step checks for existing state first and an
//! "already exists" answer from a create call counts as success, so the
//! whole call can simply be retried after a partial failure.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use strata_core::TenantId;
use strata_core::observability::bootstrap_span;
use tokio::time::Instant;
use tracing::Instrument;

use crate::catalog::{Catalog, CatalogLoader, DefaultCatalogLoader, TableCreation};
use crate::config::CatalogConfig;
use crate::deadline::within;
use crate::error::IcebergResult;
use crate::metrics;
use crate::table_spec::{TableSpec, default_tables};
use crate::types::{NamespaceIdent, PartitionSpec, Schema, TableIdent};
use crate::warehouse::{PrefixMarker, WarehouseStorageManager};

/// Parameters of one bootstrap call.
#[derive(Debug, Clone)]
pub struct BootstrapRequest {
    tenant: String,
    tables: Vec<TableSpec>,
    namespace_properties: BTreeMap<String, String>,
    deadline: Option<Instant>,
}

impl BootstrapRequest {
    /// Bootstraps `tenant` with the default tables.
    #[must_use]
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            tables: Vec::new(),
            namespace_properties: BTreeMap::new(),
            deadline: None,
        }
    }

    /// Provisions `tables` instead of the defaults. An empty list keeps the
    /// defaults.
    #[must_use]
    pub fn with_tables(mut self, tables: Vec<TableSpec>) -> Self {
        self.tables = tables;
        self
    }

    /// Adds a namespace property. Wins over the configured properties.
    #[must_use]
    pub fn with_namespace_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.namespace_properties.insert(key.into(), value.into());
        self
    }

    /// Adds several namespace properties.
    #[must_use]
    pub fn with_namespace_properties<I, K, V>(mut self, properties: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.namespace_properties
            .extend(properties.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Fails the call with `DeadlineExceeded` if it is still running at
    /// `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Tenant id as given.
    #[must_use]
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    fn tables(&self) -> &[TableSpec] {
        if self.tables.is_empty() {
            default_tables()
        } else {
            &self.tables
        }
    }
}

/// Summary of a bootstrap call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BootstrapResult {
    /// Tenant id (trimmed).
    pub tenant: String,
    /// Tenant namespace.
    pub namespace: NamespaceIdent,
    /// Warehouse URI of the tenant.
    pub warehouse_uri: String,
    /// Whether this call created the namespace.
    pub created_namespace: bool,
    /// Tables created by this call, in declaration order.
    pub created_tables: Vec<TableIdent>,
    /// Marker objects written during the storage phase.
    pub prefix_markers: Vec<PrefixMarker>,
}

/// An opened catalog resolved for one tenant.
#[derive(Clone)]
pub struct ClientCatalogHandle {
    /// Tenant id (trimmed).
    pub tenant: String,
    /// Catalog handle.
    pub catalog: Arc<dyn Catalog>,
    /// Tenant namespace.
    pub namespace: NamespaceIdent,
    /// Warehouse URI of the tenant.
    pub warehouse_uri: String,
}

impl fmt::Debug for ClientCatalogHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCatalogHandle")
            .field("tenant", &self.tenant)
            .field("namespace", &self.namespace)
            .field("warehouse_uri", &self.warehouse_uri)
            .finish_non_exhaustive()
    }
}

/// A table definition validated into Iceberg metadata.
struct PlannedTable<'a> {
    spec: &'a TableSpec,
    schema: Schema,
    partition_spec: Option<PartitionSpec>,
}

/// Provisions tenant namespaces, warehouses and tables.
#[derive(Clone)]
pub struct CatalogBootstrapper {
    storage: WarehouseStorageManager,
    loader: Arc<dyn CatalogLoader>,
}

impl fmt::Debug for CatalogBootstrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogBootstrapper")
            .field("storage", &self.storage)
            .finish_non_exhaustive()
    }
}

impl CatalogBootstrapper {
    /// Creates a bootstrapper from a storage manager and catalog loader.
    #[must_use]
    pub fn new(storage: WarehouseStorageManager, loader: Arc<dyn CatalogLoader>) -> Self {
        Self { storage, loader }
    }

    /// Creates a bootstrapper with `object_store` storage and the catalog
    /// backend selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns `CapabilityUnavailable` if the catalog options name no usable
    /// backend.
    pub fn for_config(config: &CatalogConfig) -> IcebergResult<Self> {
        let loader = DefaultCatalogLoader::for_config(config)?;
        Ok(Self::new(WarehouseStorageManager::default(), Arc::new(loader)))
    }

    /// Opens the catalog for `tenant` without changing anything.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank tenant id, or the loader's error.
    pub fn open(&self, tenant: &str, config: &CatalogConfig) -> IcebergResult<ClientCatalogHandle> {
        let tenant = TenantId::new(tenant)?;
        let catalog = self.load_catalog(config)?;
        Ok(ClientCatalogHandle {
            tenant: tenant.to_string(),
            catalog,
            namespace: config.namespace(tenant.as_str())?,
            warehouse_uri: config.warehouse_uri(tenant.as_str())?,
        })
    }

    /// Writes the warehouse (and metadata) prefix markers for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank tenant id and `Storage` if a
    /// marker cannot be written.
    pub async fn prepare_storage(
        &self,
        tenant: &str,
        config: &CatalogConfig,
    ) -> IcebergResult<Vec<PrefixMarker>> {
        let tenant = TenantId::new(tenant)?;
        self.prepare_storage_within(tenant.as_str(), config, None)
            .await
    }

    /// Runs the full provisioning pipeline.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a blank tenant id or an invalid table
    ///   definition, before any external call.
    /// - `Storage` if a prefix marker cannot be written, before any catalog
    ///   call.
    /// - `DeadlineExceeded` if the request deadline passes.
    /// - Catalog errors from namespace or table creation. Tables created
    ///   before the failure stay in place.
    pub async fn bootstrap(
        &self,
        config: &CatalogConfig,
        request: BootstrapRequest,
    ) -> IcebergResult<BootstrapResult> {
        let span = bootstrap_span("bootstrap", request.tenant.trim());
        let result = self.run_bootstrap(config, &request).instrument(span).await;
        metrics::record_bootstrap(result.as_ref().map(|_| ()));
        match &result {
            Ok(summary) => metrics::record_tables_created(summary.created_tables.len()),
            Err(err) => tracing::warn!(tenant = %request.tenant.trim(), error = %err, "bootstrap failed"),
        }
        result
    }

    async fn run_bootstrap(
        &self,
        config: &CatalogConfig,
        request: &BootstrapRequest,
    ) -> IcebergResult<BootstrapResult> {
        let tenant = TenantId::new(&request.tenant)?;
        let tenant = tenant.as_str();
        let deadline = request.deadline;
        let namespace = config.namespace(tenant)?;
        let warehouse_uri = config.warehouse_uri(tenant)?;
        let planned = plan_tables(request.tables())?;

        let prefix_markers = self.prepare_storage_within(tenant, config, deadline).await?;

        let catalog = self.load_catalog(config)?;
        let created_namespace = self
            .ensure_namespace(
                catalog.as_ref(),
                &namespace,
                namespace_properties(config, &warehouse_uri, &request.namespace_properties),
                deadline,
            )
            .await?;

        let mut created_tables = Vec::new();
        for table in planned {
            let identifier = table.spec.identifier(&namespace);
            let exists = within(
                deadline,
                "table_exists",
                catalog.table_exists(&identifier),
            )
            .await?;
            if exists {
                tracing::debug!(table = %identifier, "table exists, skipping");
                continue;
            }
            let creation = TableCreation {
                location: table.spec.location(config, tenant)?,
                schema: table.schema,
                partition_spec: table.partition_spec,
                properties: table.spec.properties.clone(),
            };
            match within(
                deadline,
                "create_table",
                catalog.create_table(&identifier, creation),
            )
            .await
            {
                Ok(_) => {
                    tracing::info!(table = %identifier, "created table");
                    created_tables.push(identifier);
                }
                Err(err) if err.is_already_exists() => {
                    tracing::debug!(table = %identifier, "table created concurrently");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(BootstrapResult {
            tenant: tenant.to_string(),
            namespace,
            warehouse_uri,
            created_namespace,
            created_tables,
            prefix_markers,
        })
    }

    async fn prepare_storage_within(
        &self,
        tenant: &str,
        config: &CatalogConfig,
        deadline: Option<Instant>,
    ) -> IcebergResult<Vec<PrefixMarker>> {
        let mut markers = Vec::new();
        let warehouse_path = config.warehouse_path(tenant)?;
        let marker = within(
            deadline,
            "ensure_warehouse_prefix",
            self.storage.ensure_prefix(
                config.provider(),
                config.warehouse_bucket(),
                &warehouse_path,
                config.provider_options(),
            ),
        )
        .await?;
        markers.extend(marker);

        if let (Some(bucket), Some(path)) = (config.metadata_bucket(), config.metadata_path(tenant)?)
        {
            if !path.is_empty() {
                let marker = within(
                    deadline,
                    "ensure_metadata_prefix",
                    self.storage.ensure_prefix(
                        config.provider(),
                        bucket,
                        &path,
                        config.provider_options(),
                    ),
                )
                .await?;
                markers.extend(marker);
            }
        }
        Ok(markers)
    }

    async fn ensure_namespace(
        &self,
        catalog: &dyn Catalog,
        namespace: &NamespaceIdent,
        properties: BTreeMap<String, String>,
        deadline: Option<Instant>,
    ) -> IcebergResult<bool> {
        let exists = within(
            deadline,
            "namespace_exists",
            catalog.namespace_exists(namespace),
        )
        .await?;
        if exists {
            tracing::debug!(namespace = %namespace.join("."), "namespace exists");
            return Ok(false);
        }
        match within(
            deadline,
            "create_namespace",
            catalog.create_namespace(namespace, properties),
        )
        .await
        {
            Ok(()) => {
                tracing::info!(namespace = %namespace.join("."), "created namespace");
                Ok(true)
            }
            Err(err) if err.is_already_exists() => {
                tracing::debug!(namespace = %namespace.join("."), "namespace created concurrently");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn load_catalog(&self, config: &CatalogConfig) -> IcebergResult<Arc<dyn Catalog>> {
        self.loader
            .load(config.catalog_name(), config.catalog_options())
    }
}

/// `location`, then configured properties, then caller properties; later
/// entries win.
fn namespace_properties(
    config: &CatalogConfig,
    warehouse_uri: &str,
    extra: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut properties = BTreeMap::from([("location".to_string(), warehouse_uri.to_string())]);
    properties.extend(
        config
            .namespace_properties()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone())),
    );
    properties.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    properties
}

fn plan_tables(specs: &[TableSpec]) -> IcebergResult<Vec<PlannedTable<'_>>> {
    specs
        .iter()
        .map(|spec| {
            let schema = spec.build_schema()?;
            let partition_spec = spec
                .build_partition_spec(&schema)?
                .filter(|partition| !partition.is_unpartitioned());
            Ok(PlannedTable {
                spec,
                schema,
                partition_spec,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;
    use crate::error::IcebergError;
    use crate::memory::MemoryCatalog;
    use crate::table_spec::SchemaField;
    use crate::warehouse::StorageFactory;
    use strata_core::{MemoryBackend, StorageBackend};

    struct MemoryFactory(MemoryBackend);

    impl StorageFactory for MemoryFactory {
        fn create(
            &self,
            _provider: StorageProvider,
            _bucket: &str,
            _options: &BTreeMap<String, String>,
        ) -> strata_core::Result<Arc<dyn StorageBackend>> {
            Ok(Arc::new(self.0.clone()))
        }
    }

    struct FixedLoader(MemoryCatalog);

    impl CatalogLoader for FixedLoader {
        fn load(
            &self,
            _name: &str,
            _options: &BTreeMap<String, String>,
        ) -> IcebergResult<Arc<dyn Catalog>> {
            Ok(Arc::new(self.0.clone()))
        }
    }

    fn bootstrapper() -> (CatalogBootstrapper, MemoryCatalog, MemoryBackend) {
        let backend = MemoryBackend::new();
        let catalog = MemoryCatalog::new("clients");
        let bootstrapper = CatalogBootstrapper::new(
            WarehouseStorageManager::new(Arc::new(MemoryFactory(backend.clone()))),
            Arc::new(FixedLoader(catalog.clone())),
        );
        (bootstrapper, catalog, backend)
    }

    fn config() -> CatalogConfig {
        CatalogConfig::new("clients", StorageProvider::Gcs, "analytics")
            .with_warehouse_prefix("warehouse")
            .with_namespace_property("owner", "platform")
    }

    #[test]
    fn test_namespace_properties_precedence() {
        let config = config().with_namespace_property("location", "ignored-by-extra");
        let extra = BTreeMap::from([("owner".to_string(), "tenant".to_string())]);
        let properties = namespace_properties(&config, "gs://analytics/warehouse/clients/acme", &extra);
        assert_eq!(properties["location"], "ignored-by-extra");
        assert_eq!(properties["owner"], "tenant");
    }

    #[tokio::test]
    async fn test_bootstrap_defaults() {
        let (bootstrapper, catalog, backend) = bootstrapper();
        let result = bootstrapper
            .bootstrap(&config(), BootstrapRequest::new("acme"))
            .await
            .unwrap();

        assert!(result.created_namespace);
        assert_eq!(result.created_tables.len(), 3);
        assert_eq!(result.prefix_markers.len(), 1);
        assert_eq!(backend.len(), 1);
        let namespace = vec!["clients".to_string(), "acme".to_string()];
        let properties = catalog.namespace_properties(&namespace).unwrap();
        assert_eq!(properties["location"], "gs://analytics/warehouse/clients/acme");
        assert_eq!(properties["owner"], "platform");
    }

    #[tokio::test]
    async fn test_padded_buckets_are_trimmed() {
        let (bootstrapper, catalog, _backend) = bootstrapper();
        let config = CatalogConfig::new("clients", StorageProvider::Gcs, " analytics\t")
            .with_warehouse_prefix("warehouse")
            .with_metadata("  metadata ", Some("meta".to_string()));
        let result = bootstrapper
            .bootstrap(&config, BootstrapRequest::new("acme"))
            .await
            .unwrap();

        let buckets: Vec<_> = result.prefix_markers.iter().map(|m| m.bucket.as_str()).collect();
        assert_eq!(buckets, vec!["analytics", "metadata"]);
        let namespace = vec!["clients".to_string(), "acme".to_string()];
        let properties = catalog.namespace_properties(&namespace).unwrap();
        assert_eq!(properties["location"], "gs://analytics/warehouse/clients/acme");
    }

    #[tokio::test]
    async fn test_invalid_table_fails_before_storage() {
        let (bootstrapper, catalog, backend) = bootstrapper();
        let request = BootstrapRequest::new("acme").with_tables(vec![TableSpec::new(
            "bad",
            vec![SchemaField::new("a", "varchar")],
        )]);
        let err = bootstrapper.bootstrap(&config(), request).await.unwrap_err();
        assert!(err.is_invalid_argument());
        assert!(backend.is_empty());
        assert!(catalog.table_identifiers().is_empty());
    }

    #[tokio::test]
    async fn test_blank_tenant_rejected_everywhere() {
        let (bootstrapper, _, backend) = bootstrapper();
        assert!(bootstrapper.open("  ", &config()).unwrap_err().is_invalid_argument());
        assert!(
            bootstrapper
                .prepare_storage("", &config())
                .await
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(
            bootstrapper
                .bootstrap(&config(), BootstrapRequest::new(" \t"))
                .await
                .unwrap_err()
                .is_invalid_argument()
        );
        assert!(backend.is_empty());
    }

    #[tokio::test]
    async fn test_expired_deadline_stops_pipeline() {
        let (bootstrapper, catalog, _) = bootstrapper();
        let request = BootstrapRequest::new("acme").with_deadline(Instant::now());
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let err = bootstrapper.bootstrap(&config(), request).await.unwrap_err();
        assert!(matches!(err, IcebergError::DeadlineExceeded { .. }));
        assert!(catalog.table_identifiers().is_empty());
    }
}
