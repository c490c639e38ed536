//! In-memory catalog.
//!
//! Behaves like a conflict-safe metadata service: creates on existing
//! entries return [`IcebergError::AlreadyExists`], and schema commits are
//! checked against the schema the caller last saw. Used by tests and by the
//! `memory` catalog type for local runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::catalog::{Catalog, Table, TableCreation};
use crate::error::{IcebergError, IcebergResult};
use crate::types::{AddColumn, NamespaceIdent, Schema, TableIdent, TableMetadata};

/// Process-local catalog. Clones share state.
#[derive(Debug, Clone)]
pub struct MemoryCatalog {
    name: String,
    state: Arc<RwLock<MemoryState>>,
}

#[derive(Debug, Default)]
struct MemoryState {
    namespaces: BTreeMap<NamespaceIdent, BTreeMap<String, String>>,
    tables: BTreeMap<TableIdent, TableMetadata>,
    commits: usize,
    failing_tables: BTreeSet<String>,
}

impl MemoryCatalog {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::default(),
        }
    }

    /// Catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Properties of `namespace`, if it exists.
    #[must_use]
    pub fn namespace_properties(
        &self,
        namespace: &NamespaceIdent,
    ) -> Option<BTreeMap<String, String>> {
        self.read().ok()?.namespaces.get(namespace).cloned()
    }

    /// Stored metadata of a table, if it exists.
    #[must_use]
    pub fn table_metadata(&self, identifier: &TableIdent) -> Option<TableMetadata> {
        self.read().ok()?.tables.get(identifier).cloned()
    }

    /// Identifiers of every table, sorted.
    #[must_use]
    pub fn table_identifiers(&self) -> Vec<TableIdent> {
        self.read()
            .map(|state| state.tables.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of schema commits applied.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.read().map_or(0, |state| state.commits)
    }

    /// Makes every future `create_table` for a table named `name` fail with a
    /// catalog error.
    pub fn fail_table_creation(&self, name: impl Into<String>) {
        if let Ok(mut state) = self.write() {
            state.failing_tables.insert(name.into());
        }
    }

    /// Removes every failure installed by [`Self::fail_table_creation`].
    pub fn clear_failures(&self) {
        if let Ok(mut state) = self.write() {
            state.failing_tables.clear();
        }
    }

    fn read(&self) -> IcebergResult<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|_| IcebergError::catalog("memory catalog lock poisoned"))
    }

    fn write(&self) -> IcebergResult<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|_| IcebergError::catalog("memory catalog lock poisoned"))
    }

    fn commit_schema(
        &self,
        identifier: &TableIdent,
        base_schema_id: i32,
        changes: &[AddColumn],
    ) -> IcebergResult<TableMetadata> {
        let mut state = self.write()?;
        let metadata = state
            .tables
            .get_mut(identifier)
            .ok_or_else(|| IcebergError::table_not_found(identifier.to_string()))?;
        if metadata.current_schema_id != base_schema_id {
            return Err(IcebergError::schema_evolution(format!(
                "table '{identifier}' changed concurrently: expected schema {base_schema_id}, found {}",
                metadata.current_schema_id
            )));
        }
        let current = metadata.current_schema().ok_or_else(|| {
            IcebergError::catalog(format!("table '{identifier}' has no current schema"))
        })?;
        let next_schema_id = metadata
            .schemas
            .iter()
            .map(Schema::schema_id)
            .max()
            .unwrap_or(0)
            + 1;
        let (schema, last_column_id) =
            current.with_added_columns(changes, metadata.last_column_id)?;
        let schema = schema.with_schema_id(next_schema_id);

        metadata.schemas.push(schema);
        metadata.current_schema_id = next_schema_id;
        metadata.last_column_id = last_column_id;
        metadata.last_updated_ms = Utc::now().timestamp_millis();
        let updated = metadata.clone();
        state.commits += 1;
        Ok(updated)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn namespace_exists(&self, namespace: &NamespaceIdent) -> IcebergResult<bool> {
        Ok(self.read()?.namespaces.contains_key(namespace))
    }

    async fn create_namespace(
        &self,
        namespace: &NamespaceIdent,
        properties: BTreeMap<String, String>,
    ) -> IcebergResult<()> {
        let mut state = self.write()?;
        if state.namespaces.contains_key(namespace) {
            return Err(IcebergError::AlreadyExists {
                resource_type: "namespace",
                id: namespace.join("."),
            });
        }
        state.namespaces.insert(namespace.clone(), properties);
        Ok(())
    }

    async fn table_exists(&self, identifier: &TableIdent) -> IcebergResult<bool> {
        Ok(self.read()?.tables.contains_key(identifier))
    }

    async fn create_table(
        &self,
        identifier: &TableIdent,
        creation: TableCreation,
    ) -> IcebergResult<Box<dyn Table>> {
        let metadata = {
            let mut state = self.write()?;
            if state.failing_tables.contains(&identifier.name) {
                return Err(IcebergError::catalog(format!(
                    "injected failure creating table '{identifier}'"
                )));
            }
            if !state.namespaces.contains_key(&identifier.namespace) {
                return Err(IcebergError::namespace_not_found(
                    identifier.namespace.join("."),
                ));
            }
            if state.tables.contains_key(identifier) {
                return Err(IcebergError::AlreadyExists {
                    resource_type: "table",
                    id: identifier.to_string(),
                });
            }
            let metadata = new_metadata(creation);
            state.tables.insert(identifier.clone(), metadata.clone());
            metadata
        };
        Ok(Box::new(MemoryTable::new(self.clone(), identifier.clone(), metadata)))
    }

    async fn load_table(&self, identifier: &TableIdent) -> IcebergResult<Box<dyn Table>> {
        let metadata = self
            .table_metadata(identifier)
            .ok_or_else(|| IcebergError::table_not_found(identifier.to_string()))?;
        Ok(Box::new(MemoryTable::new(self.clone(), identifier.clone(), metadata)))
    }
}

fn new_metadata(creation: TableCreation) -> TableMetadata {
    let last_column_id = creation.schema.highest_field_id();
    let current_schema_id = creation.schema.schema_id();
    let last_partition_id = creation
        .partition_spec
        .as_ref()
        .and_then(|spec| spec.fields.iter().map(|f| f.field_id).max())
        .unwrap_or(0);
    let (default_spec_id, partition_specs) = match creation.partition_spec {
        Some(spec) => (spec.spec_id, vec![spec]),
        None => (0, Vec::new()),
    };
    TableMetadata {
        format_version: 2,
        table_uuid: Uuid::new_v4(),
        location: creation.location,
        last_updated_ms: Utc::now().timestamp_millis(),
        last_column_id,
        current_schema_id,
        schemas: vec![creation.schema],
        properties: creation.properties,
        default_spec_id,
        partition_specs,
        last_partition_id,
    }
}

/// Table handle over a [`MemoryCatalog`].
#[derive(Debug)]
struct MemoryTable {
    catalog: MemoryCatalog,
    identifier: TableIdent,
    metadata: RwLock<TableMetadata>,
}

impl MemoryTable {
    fn new(catalog: MemoryCatalog, identifier: TableIdent, metadata: TableMetadata) -> Self {
        Self {
            catalog,
            identifier,
            metadata: RwLock::new(metadata),
        }
    }

    fn cached(&self) -> IcebergResult<TableMetadata> {
        self.metadata
            .read()
            .map(|m| m.clone())
            .map_err(|_| IcebergError::catalog("table handle lock poisoned"))
    }

    fn replace(&self, metadata: TableMetadata) -> IcebergResult<()> {
        let mut guard = self
            .metadata
            .write()
            .map_err(|_| IcebergError::catalog("table handle lock poisoned"))?;
        *guard = metadata;
        Ok(())
    }
}

#[async_trait]
impl Table for MemoryTable {
    fn identifier(&self) -> &TableIdent {
        &self.identifier
    }

    fn schema(&self) -> IcebergResult<Schema> {
        self.cached()?.current_schema().cloned().ok_or_else(|| {
            IcebergError::catalog(format!("table '{}' has no current schema", self.identifier))
        })
    }

    async fn apply_schema_changes(&self, changes: Vec<AddColumn>) -> IcebergResult<()> {
        let base = self.cached()?.current_schema_id;
        self.catalog
            .commit_schema(&self.identifier, base, &changes)
            .map(|_| ())
    }

    async fn refresh(&self) -> IcebergResult<()> {
        let metadata = self
            .catalog
            .table_metadata(&self.identifier)
            .ok_or_else(|| IcebergError::table_not_found(self.identifier.to_string()))?;
        self.replace(metadata)
    }
}
