//! Storage backend abstraction for object storage (GCS, S3, Azure, memory).
//!
//! This module defines the object-store contract consumed by warehouse
//! preparation:
//! - Whole-object reads
//! - Unconditional writes with an optional content type
//! - Prefix listing in lexicographic path order
//!
//! Buckets are bound when a backend is constructed, so every path here is
//! relative to that bucket.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::{Error, Result};

/// Metadata about a stored object, as returned by [`StorageBackend::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    /// Object path (key) relative to the bucket.
    pub path: String,
    /// Object size in bytes.
    pub size: u64,
}

/// Storage backend trait for object storage.
///
/// All storage backends (GCS, S3, Azure, memory) implement this trait.
#[async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Reads entire object.
    ///
    /// Returns `Error::NotFound` if object doesn't exist.
    async fn get(&self, path: &str) -> Result<Bytes>;

    /// Writes an object, replacing any existing content at `path`.
    async fn put(&self, path: &str, data: Bytes, content_type: Option<&str>) -> Result<()>;

    /// Lists objects with the given prefix.
    ///
    /// Returns an empty vec if no objects match. Results are sorted by path.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>>;
}

/// In-memory storage backend for testing and local runs.
///
/// Thread-safe via `RwLock`. Backed by a `BTreeMap` so listings come back in
/// lexicographic order without an extra sort.
#[derive(Debug, Default, Clone)]
pub struct MemoryBackend {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
}

/// An object held by [`MemoryBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Object content.
    pub data: Bytes,
    /// Content type supplied on write.
    pub content_type: Option<String>,
    /// Time of the last write.
    pub last_modified: DateTime<Utc>,
}

impl MemoryBackend {
    /// Creates a new empty memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the object stored at `path`, if any.
    #[must_use]
    pub fn object(&self, path: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(path).cloned()
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().map_or(0, |objects| objects.len())
    }

    /// Returns true when no objects are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| Error::not_found(path))
    }

    async fn put(&self, path: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        self.objects
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert(
                path.to_string(),
                StoredObject {
                    data,
                    content_type: content_type.map(str::to_string),
                    last_modified: Utc::now(),
                },
            );
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let objects = self.objects.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(path, obj)| ObjectMeta {
                path: path.clone(),
                size: obj.data.len() as u64,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_roundtrip() {
        let backend = MemoryBackend::new();
        let data = Bytes::from("hello world");

        backend
            .put("test/file.txt", data.clone(), Some("text/plain"))
            .await
            .expect("put should succeed");

        let retrieved = backend
            .get("test/file.txt")
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);

        let stored = backend.object("test/file.txt").expect("object exists");
        assert_eq!(stored.content_type.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let backend = MemoryBackend::new();
        let err = backend.get("missing.txt").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let backend = MemoryBackend::new();
        backend
            .put("marker", Bytes::from("v1"), None)
            .await
            .unwrap();
        backend
            .put("marker", Bytes::from("v2"), None)
            .await
            .unwrap();

        assert_eq!(backend.len(), 1);
        assert_eq!(backend.get("marker").await.unwrap(), Bytes::from("v2"));
    }

    #[tokio::test]
    async fn test_list_with_prefix_is_sorted() {
        let backend = MemoryBackend::new();

        for path in ["a/2.txt", "b/1.txt", "a/1.txt", "a/10.txt"] {
            backend
                .put(path, Bytes::from(path), None)
                .await
                .unwrap();
        }

        let list_a = backend.list("a/").await.expect("should succeed");
        let paths: Vec<_> = list_a.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["a/1.txt", "a/10.txt", "a/2.txt"]);
        assert_eq!(list_a[0].size, 7);

        let list_b = backend.list("b/").await.expect("should succeed");
        assert_eq!(list_b.len(), 1);

        assert!(backend.list("c/").await.unwrap().is_empty());
    }
}
