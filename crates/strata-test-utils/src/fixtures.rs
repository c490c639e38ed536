//! Pre-built test fixtures for common test scenarios.
//!
//! Provides configs and a wired-up bootstrapper with sensible defaults.

use std::collections::BTreeMap;
use std::sync::Arc;

use strata_iceberg::{
    Catalog, CatalogBootstrapper, CatalogConfig, CatalogLoader, IcebergResult, MemoryCatalog,
    StorageProvider, WarehouseStorageManager,
};

use crate::storage::RecordingStorageFactory;

/// Config used throughout the provisioning tests: bucket `analytics`,
/// warehouse prefix `warehouse`, namespace prefix `clients`.
#[must_use]
pub fn analytics_config() -> CatalogConfig {
    CatalogConfig::new("clients", StorageProvider::Gcs, "analytics").with_warehouse_prefix("warehouse")
}

/// [`analytics_config`] with metadata in bucket `metadata` under `meta`.
#[must_use]
pub fn analytics_config_with_metadata() -> CatalogConfig {
    analytics_config().with_metadata("metadata", Some("meta".to_string()))
}

/// A catalog loader that hands out one shared catalog and records the
/// names and options it was asked for.
#[derive(Clone)]
pub struct StaticCatalogLoader {
    catalog: Arc<dyn Catalog>,
    requests: Arc<std::sync::Mutex<Vec<(String, BTreeMap<String, String>)>>>,
}

impl std::fmt::Debug for StaticCatalogLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaticCatalogLoader")
            .field("requests", &self.requests())
            .finish_non_exhaustive()
    }
}

impl StaticCatalogLoader {
    /// Creates a loader for `catalog`.
    pub fn new(catalog: Arc<dyn Catalog>) -> Self {
        Self {
            catalog,
            requests: Arc::default(),
        }
    }

    /// Returns every `(name, options)` pair passed to `load`.
    #[must_use]
    pub fn requests(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.requests.lock().expect("lock").clone()
    }
}

impl CatalogLoader for StaticCatalogLoader {
    fn load(
        &self,
        name: &str,
        options: &BTreeMap<String, String>,
    ) -> IcebergResult<Arc<dyn Catalog>> {
        self.requests
            .lock()
            .expect("lock")
            .push((name.to_string(), options.clone()));
        Ok(Arc::clone(&self.catalog))
    }
}

/// Test context with an in-memory catalog and recording storage.
#[derive(Debug, Clone)]
pub struct TestContext {
    /// Catalog the bootstrapper provisions into.
    pub catalog: MemoryCatalog,
    /// Storage factory the bootstrapper writes markers through.
    pub storage: RecordingStorageFactory,
    /// Loader returning [`Self::catalog`].
    pub loader: StaticCatalogLoader,
    /// Tenant identifier, unique per context.
    pub tenant: String,
}

impl TestContext {
    /// Creates a context with a unique tenant id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_tenant(format!("tenant-{}", uuid::Uuid::new_v4().as_simple()))
    }

    /// Creates a context for a specific tenant.
    #[must_use]
    pub fn with_tenant(tenant: impl Into<String>) -> Self {
        let catalog = MemoryCatalog::new("clients");
        Self {
            loader: StaticCatalogLoader::new(Arc::new(catalog.clone())),
            catalog,
            storage: RecordingStorageFactory::new(),
            tenant: tenant.into(),
        }
    }

    /// Builds a bootstrapper wired to this context.
    #[must_use]
    pub fn bootstrapper(&self) -> CatalogBootstrapper {
        CatalogBootstrapper::new(
            WarehouseStorageManager::new(Arc::new(self.storage.clone())),
            Arc::new(self.loader.clone()),
        )
    }

    /// Returns the tenant namespace under `config`.
    #[must_use]
    pub fn namespace(&self, config: &CatalogConfig) -> Vec<String> {
        config.namespace(&self.tenant).expect("valid tenant")
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
