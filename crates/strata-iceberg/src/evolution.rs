//! Additive schema evolution.
//!
//! Only optional columns are ever added: existing rows read them as null,
//! so readers and writers of the old schema keep working. Columns already in
//! the schema are skipped, which makes repeated calls no-ops.

use std::sync::Arc;

use strata_core::observability::evolution_span;
use tokio::time::Instant;
use tracing::Instrument;

use crate::catalog::Catalog;
use crate::deadline::within;
use crate::error::{IcebergError, IcebergResult};
use crate::metrics;
use crate::table_spec::SchemaField;
use crate::types::TableIdent;

/// Adds missing optional columns to one table.
#[derive(Clone)]
pub struct SchemaEvolutionManager {
    catalog: Arc<dyn Catalog>,
    table: TableIdent,
    deadline: Option<Instant>,
}

impl std::fmt::Debug for SchemaEvolutionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaEvolutionManager")
            .field("table", &self.table)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl SchemaEvolutionManager {
    /// Creates a manager for `table` in `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<dyn Catalog>, table: TableIdent) -> Self {
        Self {
            catalog,
            table,
            deadline: None,
        }
    }

    /// Bounds every catalog call by `deadline`.
    #[must_use]
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Target table.
    #[must_use]
    pub fn table(&self) -> &TableIdent {
        &self.table
    }

    /// Adds every column of `columns` whose dotted path is not yet in the
    /// schema, in one commit.
    ///
    /// Returns the dotted paths that were added, in order. Nothing is
    /// loaded for an empty `columns` and nothing is committed when every
    /// column already exists.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::SchemaEvolution`] if the table cannot be
    /// loaded, a column is marked required, or a type name is invalid. No
    /// change is committed in those cases. `DeadlineExceeded` and commit
    /// failures are returned as is.
    pub async fn add_columns_if_missing(
        &self,
        columns: &[SchemaField],
    ) -> IcebergResult<Vec<String>> {
        if columns.is_empty() {
            return Ok(Vec::new());
        }
        let span = evolution_span(&self.table.to_string());
        let added = self.evolve(columns).instrument(span).await?;
        if !added.is_empty() {
            metrics::record_columns_added(added.len());
        }
        Ok(added)
    }

    async fn evolve(&self, columns: &[SchemaField]) -> IcebergResult<Vec<String>> {
        let table = within(self.deadline, "load_table", self.catalog.load_table(&self.table))
            .await
            .map_err(|err| match err {
                IcebergError::DeadlineExceeded { .. } => err,
                other => IcebergError::SchemaEvolution {
                    message: format!(
                        "unable to load table '{}' for schema evolution",
                        self.table
                    ),
                    source: Some(Box::new(other)),
                },
            })?;
        let schema = table.schema().map_err(|err| IcebergError::SchemaEvolution {
            message: format!("unable to read schema of table '{}'", self.table),
            source: Some(Box::new(err)),
        })?;

        let mut update = table.update_schema();
        let mut added = Vec::new();
        for column in columns {
            let path = column.dotted_path();
            if column.required {
                return Err(IcebergError::schema_evolution(format!(
                    "refusing to add required column '{path}': only optional columns can be added safely"
                )));
            }
            if schema.find_field(&path).is_some() {
                tracing::debug!(column = %path, "column exists, skipping");
                continue;
            }
            let field_type = column.resolve_type().map_err(|err| IcebergError::SchemaEvolution {
                message: format!("invalid type for column '{path}'"),
                source: Some(Box::new(err)),
            })?;
            update = update.add_column(
                column.parent.clone(),
                column.name.clone(),
                field_type,
                column.doc.clone(),
            );
            added.push(path);
        }

        if added.is_empty() {
            tracing::debug!("schema already up to date");
            return Ok(added);
        }

        within(self.deadline, "commit_schema", update.commit()).await?;
        within(self.deadline, "refresh_table", table.refresh()).await?;
        tracing::info!(columns = ?added, "added columns");
        Ok(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::catalog::TableCreation;
    use crate::memory::MemoryCatalog;
    use crate::types::{NestedField, PrimitiveType, Schema};

    async fn setup() -> (MemoryCatalog, TableIdent) {
        let catalog = MemoryCatalog::new("test");
        let namespace = vec!["clients".to_string(), "acme".to_string()];
        catalog
            .create_namespace(&namespace, BTreeMap::new())
            .await
            .unwrap();
        let ident = TableIdent::new(namespace, "events");
        catalog
            .create_table(
                &ident,
                TableCreation {
                    schema: Schema::new(vec![NestedField::required(
                        1,
                        "event_id",
                        PrimitiveType::String,
                    )]),
                    location: "gs://analytics/events".to_string(),
                    partition_spec: None,
                    properties: BTreeMap::new(),
                },
            )
            .await
            .unwrap();
        (catalog, ident)
    }

    #[tokio::test]
    async fn test_empty_columns_skip_io() {
        let catalog = MemoryCatalog::new("test");
        let missing = TableIdent::new(vec!["nope".into()], "t");
        let manager = SchemaEvolutionManager::new(Arc::new(catalog), missing);
        assert!(manager.add_columns_if_missing(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_type_is_schema_evolution_error() {
        let (catalog, ident) = setup().await;
        let manager = SchemaEvolutionManager::new(Arc::new(catalog.clone()), ident);
        let err = manager
            .add_columns_if_missing(&[SchemaField::new("score", "decimal(5)")])
            .await
            .unwrap_err();
        assert!(err.is_schema_evolution());
        assert_eq!(catalog.commit_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_table_is_schema_evolution_error() {
        let (catalog, _) = setup().await;
        let ident = TableIdent::new(vec!["clients".into(), "acme".into()], "missing");
        let manager = SchemaEvolutionManager::new(Arc::new(catalog), ident);
        let err = manager
            .add_columns_if_missing(&[SchemaField::new("x", "string")])
            .await
            .unwrap_err();
        assert!(err.is_schema_evolution());
        assert!(err.to_string().contains("clients.acme.missing"));
    }
}
