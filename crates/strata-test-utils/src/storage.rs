//! Test storage implementations with operation tracing.
//!
//! Provides in-memory storage that records all operations for test
//! assertions, and a storage factory that records which buckets were asked
//! for.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use strata_core::error::{Error, Result};
use strata_core::storage::{ObjectMeta, StorageBackend};
use strata_iceberg::{StorageFactory, StorageProvider};

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    /// Get operation.
    Get {
        /// Path that was read.
        path: String,
    },
    /// Put operation.
    Put {
        /// Path that was written.
        path: String,
        /// Size of data written.
        size: usize,
        /// Content type supplied by the writer.
        content_type: Option<String>,
    },
    /// List operation.
    List {
        /// Prefix that was listed.
        prefix: String,
    },
}

/// In-memory storage backend with operation tracing.
///
/// Records all operations for later assertion in tests.
#[derive(Debug, Clone, Default)]
pub struct TracingMemoryBackend {
    data: Arc<Mutex<BTreeMap<String, Bytes>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_paths: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

impl TracingMemoryBackend {
    /// Creates a new empty tracing storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage with simulated latency.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Returns the paths of all recorded writes, in order.
    #[must_use]
    pub fn written_paths(&self) -> Vec<String> {
        self.operations()
            .into_iter()
            .filter_map(|op| match op {
                StorageOp::Put { path, .. } => Some(path),
                _ => None,
            })
            .collect()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Injects a failure for the given path prefix.
    pub fn inject_failure(&self, path: impl Into<String>) {
        self.fail_paths.lock().expect("lock").push(path.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_paths.lock().expect("lock").clear();
    }

    /// Returns all stored paths (for debugging).
    #[must_use]
    pub fn paths(&self) -> Vec<String> {
        self.data.lock().expect("lock").keys().cloned().collect()
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, path: &str) -> Result<()> {
        let fail_paths = self.fail_paths.lock().expect("lock");
        if fail_paths.iter().any(|p| path.starts_with(p)) {
            return Err(Error::storage(format!("Injected failure for path: {path}")));
        }
        Ok(())
    }

    async fn maybe_delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait::async_trait]
impl StorageBackend for TracingMemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        self.maybe_delay().await;
        self.check_failure(path)?;
        self.record(StorageOp::Get {
            path: path.to_string(),
        });

        let data = self.data.lock().expect("lock");
        data.get(path)
            .cloned()
            .ok_or_else(|| Error::not_found(path))
    }

    async fn put(&self, path: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        self.maybe_delay().await;
        self.check_failure(path)?;
        self.record(StorageOp::Put {
            path: path.to_string(),
            size: data.len(),
            content_type: content_type.map(str::to_string),
        });

        self.data.lock().expect("lock").insert(path.to_string(), data);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        self.maybe_delay().await;
        self.check_failure(prefix)?;
        self.record(StorageOp::List {
            prefix: prefix.to_string(),
        });

        let data = self.data.lock().expect("lock");
        Ok(data
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectMeta {
                path: k.clone(),
                size: v.len() as u64,
            })
            .collect())
    }
}

/// A storage factory call recorded by [`RecordingStorageFactory`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryCall {
    /// Requested provider.
    pub provider: StorageProvider,
    /// Requested bucket.
    pub bucket: String,
    /// Provider options passed along.
    pub options: BTreeMap<String, String>,
}

/// Storage factory handing out one [`TracingMemoryBackend`] per bucket.
#[derive(Debug, Clone, Default)]
pub struct RecordingStorageFactory {
    backends: Arc<Mutex<BTreeMap<String, TracingMemoryBackend>>>,
    calls: Arc<Mutex<Vec<FactoryCall>>>,
    unavailable: Arc<Mutex<Vec<String>>>,
}

impl RecordingStorageFactory {
    /// Creates a factory with no buckets.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the backend for `bucket`, creating it if needed.
    #[must_use]
    pub fn backend(&self, bucket: &str) -> TracingMemoryBackend {
        self.backends
            .lock()
            .expect("lock")
            .entry(bucket.to_string())
            .or_default()
            .clone()
    }

    /// Returns all recorded factory calls.
    #[must_use]
    pub fn calls(&self) -> Vec<FactoryCall> {
        self.calls.lock().expect("lock").clone()
    }

    /// Makes backend construction for `bucket` fail.
    pub fn make_unavailable(&self, bucket: impl Into<String>) {
        self.unavailable.lock().expect("lock").push(bucket.into());
    }
}

impl StorageFactory for RecordingStorageFactory {
    fn create(
        &self,
        provider: StorageProvider,
        bucket: &str,
        options: &BTreeMap<String, String>,
    ) -> Result<Arc<dyn StorageBackend>> {
        self.calls.lock().expect("lock").push(FactoryCall {
            provider,
            bucket: bucket.to_string(),
            options: options.clone(),
        });
        if self
            .unavailable
            .lock()
            .expect("lock")
            .iter()
            .any(|b| b == bucket)
        {
            return Err(Error::storage(format!("no credentials for bucket {bucket}")));
        }
        Ok(Arc::new(self.backend(bucket)))
    }
}
