//! Object storage preparation for tenant warehouses.
//!
//! Before a namespace is registered, each warehouse prefix gets a small
//! marker object so the prefix exists (and shows up in provider consoles).
//! Writing the marker is idempotent: a repeat call overwrites the same object.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use strata_core::{ObjectStoreBackend, StorageBackend};

use crate::config::StorageProvider;
use crate::error::{IcebergError, IcebergResult};
use crate::metrics;

/// Name of the marker object written under each prepared prefix.
pub const MARKER_FILENAME: &str = ".catalog-bootstrap";

const MARKER_CONTENT_TYPE: &str = "text/plain";

/// Receipt for a marker write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixMarker {
    /// Storage provider of the bucket.
    pub provider: StorageProvider,
    /// Bucket that was written to.
    pub bucket: String,
    /// Path of the marker object.
    pub path: String,
}

/// Builds a storage backend for a provider and bucket.
pub trait StorageFactory: Send + Sync {
    /// Creates a backend bound to `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be configured.
    fn create(
        &self,
        provider: StorageProvider,
        bucket: &str,
        options: &BTreeMap<String, String>,
    ) -> strata_core::Result<Arc<dyn StorageBackend>>;
}

/// Storage factory backed by `object_store` clients for every provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStorageFactory;

impl StorageFactory for DefaultStorageFactory {
    fn create(
        &self,
        provider: StorageProvider,
        bucket: &str,
        options: &BTreeMap<String, String>,
    ) -> strata_core::Result<Arc<dyn StorageBackend>> {
        let options = options.iter().map(|(k, v)| (k.as_str(), v.as_str()));
        let backend = match provider {
            StorageProvider::Gcs => ObjectStoreBackend::gcs(bucket, options)?,
            StorageProvider::S3 => ObjectStoreBackend::s3(bucket, options)?,
            StorageProvider::Azure => ObjectStoreBackend::azure(bucket, options)?,
        };
        Ok(Arc::new(backend))
    }
}

/// Ensures warehouse prefixes exist by writing marker objects.
#[derive(Clone)]
pub struct WarehouseStorageManager {
    factory: Arc<dyn StorageFactory>,
    marker_filename: String,
}

impl fmt::Debug for WarehouseStorageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseStorageManager")
            .field("marker_filename", &self.marker_filename)
            .finish_non_exhaustive()
    }
}

impl Default for WarehouseStorageManager {
    fn default() -> Self {
        Self::new(Arc::new(DefaultStorageFactory))
    }
}

impl WarehouseStorageManager {
    /// Creates a manager that builds backends with `factory`.
    #[must_use]
    pub fn new(factory: Arc<dyn StorageFactory>) -> Self {
        Self {
            factory,
            marker_filename: MARKER_FILENAME.to_string(),
        }
    }

    /// Overrides the marker object name.
    #[must_use]
    pub fn with_marker_filename(mut self, name: impl Into<String>) -> Self {
        self.marker_filename = name.into();
        self
    }

    /// Writes a marker under `prefix` in `bucket`.
    ///
    /// Whitespace and leading and trailing `/` are trimmed from `prefix`. An
    /// empty or blank prefix
    /// is the bucket root, which is assumed to exist: nothing is written and
    /// `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::Storage`] naming the provider, bucket and
    /// marker path if the backend cannot be built or the write fails.
    pub async fn ensure_prefix(
        &self,
        provider: StorageProvider,
        bucket: &str,
        prefix: &str,
        options: &BTreeMap<String, String>,
    ) -> IcebergResult<Option<PrefixMarker>> {
        let normalized = prefix.trim().trim_matches('/').trim();
        if normalized.is_empty() {
            tracing::debug!(%provider, bucket, "root prefix, skipping marker");
            return Ok(None);
        }
        let marker_path = format!("{normalized}/{}", self.marker_filename);
        let storage_error = |source: strata_core::Error| IcebergError::Storage {
            provider,
            bucket: bucket.to_string(),
            path: marker_path.clone(),
            source: Box::new(source),
        };

        let backend = self
            .factory
            .create(provider, bucket, options)
            .map_err(storage_error)?;
        let payload = format!(
            "Bootstrap marker written at {} UTC",
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
        );
        backend
            .put(&marker_path, Bytes::from(payload), Some(MARKER_CONTENT_TYPE))
            .await
            .map_err(storage_error)?;

        metrics::record_prefix_marker();
        tracing::info!(%provider, bucket, path = %marker_path, "wrote prefix marker");
        Ok(Some(PrefixMarker {
            provider,
            bucket: bucket.to_string(),
            path: marker_path,
        }))
    }
}
