//! Catalog capability traits.
//!
//! Provisioning and evolution talk to a metadata service only through
//! [`Catalog`] and [`Table`]. Concrete backends are chosen once, when a
//! [`CatalogLoader`] is built, so a missing or misconfigured backend fails at
//! startup rather than midway through a bootstrap.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::CatalogConfig;
use crate::error::{IcebergError, IcebergResult};
use crate::memory::MemoryCatalog;
use crate::rest::{RestCatalog, RestCatalogConfig};
use crate::types::{AddColumn, NamespaceIdent, PartitionSpec, Schema, TableIdent, Type};

/// Everything needed to create a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCreation {
    /// Initial schema.
    pub schema: Schema,
    /// Storage location of the table.
    pub location: String,
    /// Partition spec; `None` for an unpartitioned table.
    pub partition_spec: Option<PartitionSpec>,
    /// Table properties.
    pub properties: BTreeMap<String, String>,
}

/// A metadata service holding namespaces and tables.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Returns whether `namespace` exists.
    async fn namespace_exists(&self, namespace: &NamespaceIdent) -> IcebergResult<bool>;

    /// Creates `namespace` with `properties`.
    ///
    /// Returns [`IcebergError::AlreadyExists`] if it already exists.
    async fn create_namespace(
        &self,
        namespace: &NamespaceIdent,
        properties: BTreeMap<String, String>,
    ) -> IcebergResult<()>;

    /// Returns whether the table exists.
    async fn table_exists(&self, identifier: &TableIdent) -> IcebergResult<bool>;

    /// Creates a table.
    ///
    /// Returns [`IcebergError::AlreadyExists`] if it already exists.
    async fn create_table(
        &self,
        identifier: &TableIdent,
        creation: TableCreation,
    ) -> IcebergResult<Box<dyn Table>>;

    /// Loads an existing table.
    async fn load_table(&self, identifier: &TableIdent) -> IcebergResult<Box<dyn Table>>;
}

/// A handle to one table.
///
/// The handle caches table metadata; [`Table::refresh`] reloads it.
#[async_trait]
pub trait Table: Send + Sync {
    /// Identifier of the table.
    fn identifier(&self) -> &TableIdent;

    /// Current schema as last loaded.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::Catalog`] if the handle state is unreadable or
    /// the metadata has no current schema.
    fn schema(&self) -> IcebergResult<Schema>;

    /// Atomically adds optional columns in one schema update.
    ///
    /// Callers normally stage changes through `update_schema` instead.
    async fn apply_schema_changes(&self, changes: Vec<AddColumn>) -> IcebergResult<()>;

    /// Reloads the table metadata.
    async fn refresh(&self) -> IcebergResult<()>;
}

impl dyn Table {
    /// Starts a schema update against this table.
    #[must_use]
    pub fn update_schema(&self) -> SchemaUpdate<'_> {
        SchemaUpdate::new(self)
    }
}

/// Staged schema changes, committed together.
pub struct SchemaUpdate<'a> {
    table: &'a dyn Table,
    changes: Vec<AddColumn>,
}

impl fmt::Debug for SchemaUpdate<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaUpdate")
            .field("table", self.table.identifier())
            .field("changes", &self.changes)
            .finish()
    }
}

impl<'a> SchemaUpdate<'a> {
    /// Creates an empty update for `table`.
    #[must_use]
    pub fn new(table: &'a dyn Table) -> Self {
        Self {
            table,
            changes: Vec::new(),
        }
    }

    /// Stages an optional column under `parent` (empty for top level).
    #[must_use]
    pub fn add_column(
        mut self,
        parent: Vec<String>,
        name: impl Into<String>,
        field_type: Type,
        doc: Option<String>,
    ) -> Self {
        self.changes.push(AddColumn {
            parent,
            name: name.into(),
            field_type,
            doc,
        });
        self
    }

    /// Staged changes, in order.
    #[must_use]
    pub fn changes(&self) -> &[AddColumn] {
        &self.changes
    }

    /// Returns true when nothing is staged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Commits the staged changes. An empty update is a no-op.
    ///
    /// # Errors
    ///
    /// Returns the catalog's error if the commit is rejected.
    pub async fn commit(self) -> IcebergResult<()> {
        if self.changes.is_empty() {
            return Ok(());
        }
        self.table.apply_schema_changes(self.changes).await
    }
}

/// Opens a catalog by name and connection options.
pub trait CatalogLoader: Send + Sync {
    /// Returns a catalog handle.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::CapabilityUnavailable`] if the options do not
    /// describe a usable backend.
    fn load(&self, name: &str, options: &BTreeMap<String, String>)
    -> IcebergResult<Arc<dyn Catalog>>;
}

/// Catalog backends known to [`DefaultCatalogLoader`].
#[derive(Debug, Clone)]
enum CatalogKind {
    Rest(RestCatalogConfig),
    Memory(MemoryCatalog),
}

/// Loader that picks a backend from the `type` catalog option.
///
/// `type = "rest"` (or a `uri` option with no `type`) selects the Iceberg REST
/// client; `type = "memory"` selects a process-local catalog shared by every
/// handle this loader returns.
#[derive(Debug, Clone)]
pub struct DefaultCatalogLoader {
    kind: CatalogKind,
}

impl DefaultCatalogLoader {
    /// Validates the catalog options of `config` and builds a loader.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::CapabilityUnavailable`] for an unknown catalog
    /// type or a REST catalog without a `uri`.
    pub fn for_config(config: &CatalogConfig) -> IcebergResult<Self> {
        Self::from_options(config.catalog_name(), config.catalog_options())
    }

    /// Like [`for_config`](Self::for_config), from raw options.
    ///
    /// # Errors
    ///
    /// See [`for_config`](Self::for_config).
    pub fn from_options(name: &str, options: &BTreeMap<String, String>) -> IcebergResult<Self> {
        let kind = match options.get("type").map(|t| t.trim().to_ascii_lowercase()) {
            Some(t) if t == "rest" => CatalogKind::Rest(RestCatalogConfig::from_options(options)?),
            None if options.contains_key("uri") => {
                CatalogKind::Rest(RestCatalogConfig::from_options(options)?)
            }
            Some(t) if t == "memory" => CatalogKind::Memory(MemoryCatalog::new(name)),
            Some(other) => {
                return Err(IcebergError::CapabilityUnavailable {
                    capability: "catalog",
                    message: format!("unsupported catalog type '{other}' for catalog '{name}'"),
                });
            }
            None => {
                return Err(IcebergError::CapabilityUnavailable {
                    capability: "catalog",
                    message: format!(
                        "catalog '{name}' has neither a 'type' nor a 'uri' option"
                    ),
                });
            }
        };
        Ok(Self { kind })
    }
}

impl CatalogLoader for DefaultCatalogLoader {
    fn load(
        &self,
        name: &str,
        _options: &BTreeMap<String, String>,
    ) -> IcebergResult<Arc<dyn Catalog>> {
        match &self.kind {
            CatalogKind::Rest(config) => Ok(Arc::new(RestCatalog::new(name, config.clone())?)),
            CatalogKind::Memory(catalog) => Ok(Arc::new(catalog.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageProvider;

    fn config() -> CatalogConfig {
        CatalogConfig::new("clients", StorageProvider::Gcs, "analytics")
    }

    #[test]
    fn test_unknown_type_is_capability_unavailable() {
        let err = DefaultCatalogLoader::for_config(&config().with_catalog_option("type", "hive"))
            .unwrap_err();
        assert!(matches!(
            err,
            IcebergError::CapabilityUnavailable {
                capability: "catalog",
                ..
            }
        ));
        assert!(err.to_string().contains("hive"));
    }

    #[test]
    fn test_missing_options_is_capability_unavailable() {
        let err = DefaultCatalogLoader::for_config(&config()).unwrap_err();
        assert!(matches!(err, IcebergError::CapabilityUnavailable { .. }));
    }

    #[test]
    fn test_rest_requires_uri() {
        let err = DefaultCatalogLoader::for_config(&config().with_catalog_option("type", "rest"))
            .unwrap_err();
        assert!(err.to_string().contains("uri"));
    }

    #[test]
    fn test_uri_without_type_selects_rest() {
        let loader = DefaultCatalogLoader::for_config(
            &config().with_catalog_option("uri", "http://localhost:8181"),
        )
        .unwrap();
        assert!(matches!(loader.kind, CatalogKind::Rest(_)));
    }

    #[tokio::test]
    async fn test_memory_loader_shares_state() {
        let config = config().with_catalog_option("type", "memory");
        let loader = DefaultCatalogLoader::for_config(&config).unwrap();
        let namespace = vec!["clients".to_string(), "acme".to_string()];

        let first = loader.load("clients", config.catalog_options()).unwrap();
        first
            .create_namespace(&namespace, BTreeMap::new())
            .await
            .unwrap();

        let second = loader.load("clients", config.catalog_options()).unwrap();
        assert!(second.namespace_exists(&namespace).await.unwrap());
    }
}
