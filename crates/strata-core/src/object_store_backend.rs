//! [`StorageBackend`] implementation over the `object_store` crate.
//!
//! One backend is bound to one bucket (or Azure container). Credentials and
//! endpoints come from the environment, overridden by string key/value
//! options using the provider's own configuration keys (for example
//! `google_service_account` or `aws_region`).

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::{AmazonS3Builder, AmazonS3ConfigKey};
use object_store::azure::{AzureConfigKey, MicrosoftAzureBuilder};
use object_store::gcp::{GoogleCloudStorageBuilder, GoogleConfigKey};
use object_store::memory::InMemory;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};

use crate::error::{Error, Result};
use crate::storage::{ObjectMeta, StorageBackend};

/// Object storage backend backed by `Arc<dyn object_store::ObjectStore>`.
#[derive(Clone)]
pub struct ObjectStoreBackend {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl fmt::Debug for ObjectStoreBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreBackend")
            .field("store", &self.store.to_string())
            .field("bucket", &self.bucket)
            .finish()
    }
}

impl ObjectStoreBackend {
    /// Wraps an existing object store.
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    /// Creates an in-process backend (useful for local runs).
    #[must_use]
    pub fn in_memory(bucket: impl Into<String>) -> Self {
        Self::new(Arc::new(InMemory::new()), bucket)
    }

    /// Creates a Google Cloud Storage backend for `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if an option key is unknown or the client cannot be built.
    pub fn gcs<'a, I>(bucket: &str, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = GoogleCloudStorageBuilder::from_env().with_bucket_name(bucket);
        for (key, value) in options {
            let key: GoogleConfigKey = key.parse().map_err(|e| option_error(bucket, key, e))?;
            builder = builder.with_config(key, value);
        }
        let store = builder.build().map_err(|e| {
            Error::storage_with_source(format!("failed to build GCS client for bucket '{bucket}'"), e)
        })?;
        Ok(Self::new(Arc::new(store), bucket))
    }

    /// Creates an Amazon S3 backend for `bucket`.
    ///
    /// # Errors
    ///
    /// Returns an error if an option key is unknown or the client cannot be built.
    pub fn s3<'a, I>(bucket: &str, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        for (key, value) in options {
            let key: AmazonS3ConfigKey = key.parse().map_err(|e| option_error(bucket, key, e))?;
            builder = builder.with_config(key, value);
        }
        let store = builder.build().map_err(|e| {
            Error::storage_with_source(format!("failed to build S3 client for bucket '{bucket}'"), e)
        })?;
        Ok(Self::new(Arc::new(store), bucket))
    }

    /// Creates an Azure Blob Storage backend for `container`.
    ///
    /// # Errors
    ///
    /// Returns an error if an option key is unknown or the client cannot be built.
    pub fn azure<'a, I>(container: &str, options: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut builder = MicrosoftAzureBuilder::from_env().with_container_name(container);
        for (key, value) in options {
            let key: AzureConfigKey = key.parse().map_err(|e| option_error(container, key, e))?;
            builder = builder.with_config(key, value);
        }
        let store = builder.build().map_err(|e| {
            Error::storage_with_source(
                format!("failed to build Azure client for container '{container}'"),
                e,
            )
        })?;
        Ok(Self::new(Arc::new(store), container))
    }

    /// Returns the bucket this backend is bound to.
    #[must_use]
    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

fn option_error(bucket: &str, key: &str, err: object_store::Error) -> Error {
    Error::InvalidInput(format!(
        "unknown storage option '{key}' for bucket '{bucket}': {err}"
    ))
}

fn map_object_store_error(op: &str, path: &str, err: object_store::Error) -> Error {
    match err {
        object_store::Error::NotFound { .. } => Error::not_found(path),
        other => Error::storage_with_source(format!("{op} failed for '{path}'"), other),
    }
}

#[async_trait]
impl StorageBackend for ObjectStoreBackend {
    async fn get(&self, path: &str) -> Result<Bytes> {
        let location = Path::from(path);
        let result = self
            .store
            .get(&location)
            .await
            .map_err(|e| map_object_store_error("get", path, e))?;
        result
            .bytes()
            .await
            .map_err(|e| map_object_store_error("get", path, e))
    }

    async fn put(&self, path: &str, data: Bytes, content_type: Option<&str>) -> Result<()> {
        let location = Path::from(path);
        let mut attributes = Attributes::new();
        if let Some(content_type) = content_type {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..PutOptions::default()
        };
        self.store
            .put_opts(&location, PutPayload::from(data), options)
            .await
            .map_err(|e| map_object_store_error("put", path, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectMeta>> {
        let trimmed = prefix.trim_matches('/');
        let location = (!trimmed.is_empty()).then(|| Path::from(trimmed));
        let objects: Vec<object_store::ObjectMeta> = self
            .store
            .list(location.as_ref())
            .try_collect()
            .await
            .map_err(|e| map_object_store_error("list", prefix, e))?;

        let mut listed: Vec<ObjectMeta> = objects
            .into_iter()
            .map(|meta| ObjectMeta {
                path: meta.location.to_string(),
                size: u64::try_from(meta.size).unwrap_or(u64::MAX),
            })
            .filter(|meta| meta.path.starts_with(trimmed))
            .collect();
        listed.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(listed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_store_roundtrip_and_listing() {
        let backend = ObjectStoreBackend::in_memory("analytics");
        backend
            .put("warehouse/b/.marker", Bytes::from("b"), Some("text/plain"))
            .await
            .unwrap();
        backend
            .put("warehouse/a/.marker", Bytes::from("a"), None)
            .await
            .unwrap();
        backend
            .put("other/x", Bytes::from("x"), None)
            .await
            .unwrap();

        assert_eq!(
            backend.get("warehouse/a/.marker").await.unwrap(),
            Bytes::from("a")
        );

        let listed = backend.list("warehouse/").await.unwrap();
        let paths: Vec<_> = listed.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["warehouse/a/.marker", "warehouse/b/.marker"]);
        assert_eq!(listed[0].size, 1);
    }

    #[tokio::test]
    async fn test_missing_object_maps_to_not_found() {
        let backend = ObjectStoreBackend::in_memory("analytics");
        let err = backend.get("nope").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let err = ObjectStoreBackend::gcs("analytics", [("definitely_not_a_key", "x")]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(err.to_string().contains("definitely_not_a_key"));
    }
}
