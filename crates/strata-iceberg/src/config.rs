//! Catalog configuration and path resolution.
//!
//! A [`CatalogConfig`] is immutable once built. Every namespace, warehouse
//! path, and table location is a pure function of the config plus a tenant
//! id; nothing here performs I/O or caches results.
//!
//! # Example
//!
//! ```rust
//! use strata_iceberg::config::{CatalogConfig, StorageProvider};
//!
//! let config = CatalogConfig::new("clients", StorageProvider::Gcs, "analytics-bucket")
//!     .with_warehouse_prefix("warehouse")
//!     .with_namespace_prefix(["tenants"]);
//!
//! assert_eq!(
//!     config.warehouse_uri("client-123").unwrap(),
//!     "gs://analytics-bucket/warehouse/tenants/client-123"
//! );
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strata_core::TenantId;

use crate::error::{IcebergError, IcebergResult};
use crate::types::NamespaceIdent;

/// Object storage providers supported for tenant warehouses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StorageProvider {
    /// Google Cloud Storage.
    Gcs,
    /// Amazon S3.
    S3,
    /// Azure Data Lake Storage Gen2 / Blob Storage.
    Azure,
}

impl StorageProvider {
    /// All supported providers.
    pub const ALL: [Self; 3] = [Self::Gcs, Self::S3, Self::Azure];

    /// Returns the configuration tag for this provider.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Gcs => "gcs",
            Self::S3 => "s3",
            Self::Azure => "azure",
        }
    }

    /// Returns the URI scheme used for warehouse locations.
    #[must_use]
    pub fn scheme(self) -> &'static str {
        match self {
            Self::Gcs => "gs",
            Self::S3 => "s3",
            Self::Azure => "abfs",
        }
    }
}

impl FromStr for StorageProvider {
    type Err = IcebergError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.tag() == normalized)
            .ok_or_else(|| {
                IcebergError::invalid_argument(format!(
                    "unsupported storage provider '{s}' (expected one of: gcs, s3, azure)"
                ))
            })
    }
}

impl TryFrom<String> for StorageProvider {
    type Error = IcebergError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<StorageProvider> for String {
    fn from(value: StorageProvider) -> Self {
        value.tag().to_string()
    }
}

impl fmt::Display for StorageProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

fn default_namespace_prefix() -> Vec<String> {
    vec!["clients".to_string()]
}

/// Describes how to resolve the catalog, namespaces, and warehouse locations
/// for tenants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    name: String,
    provider: StorageProvider,
    warehouse_bucket: String,
    #[serde(default)]
    warehouse_prefix: String,
    #[serde(default = "default_namespace_prefix")]
    namespace_prefix: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata_bucket: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata_prefix: Option<String>,
    #[serde(default)]
    provider_options: BTreeMap<String, String>,
    #[serde(default)]
    namespace_properties: BTreeMap<String, String>,
    #[serde(default)]
    catalog_options: BTreeMap<String, String>,
}

impl CatalogConfig {
    /// Creates a config with the default namespace prefix (`["clients"]`)
    /// and no warehouse prefix.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        provider: StorageProvider,
        warehouse_bucket: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            provider,
            warehouse_bucket: warehouse_bucket.into(),
            warehouse_prefix: String::new(),
            namespace_prefix: default_namespace_prefix(),
            metadata_bucket: None,
            metadata_prefix: None,
            provider_options: BTreeMap::new(),
            namespace_properties: BTreeMap::new(),
            catalog_options: BTreeMap::new(),
        }
    }

    /// Sets the warehouse prefix inside the bucket.
    #[must_use]
    pub fn with_warehouse_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.warehouse_prefix = prefix.into();
        self
    }

    /// Sets the namespace segments placed before the tenant id.
    #[must_use]
    pub fn with_namespace_prefix<I, S>(mut self, segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespace_prefix = segments.into_iter().map(Into::into).collect();
        self
    }

    /// Configures a dedicated metadata bucket.
    ///
    /// When `prefix` is `None` the warehouse prefix is reused.
    #[must_use]
    pub fn with_metadata(mut self, bucket: impl Into<String>, prefix: Option<String>) -> Self {
        self.metadata_bucket = Some(bucket.into());
        self.metadata_prefix = prefix;
        self
    }

    /// Adds a provider-specific storage option.
    #[must_use]
    pub fn with_provider_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.provider_options.insert(key.into(), value.into());
        self
    }

    /// Adds a property applied to every namespace created with this config.
    #[must_use]
    pub fn with_namespace_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.namespace_properties.insert(key.into(), value.into());
        self
    }

    /// Adds a catalog connection option (for example `type` or `uri`).
    #[must_use]
    pub fn with_catalog_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.catalog_options.insert(key.into(), value.into());
        self
    }

    /// Catalog name passed to the catalog loader.
    #[must_use]
    pub fn catalog_name(&self) -> &str {
        &self.name
    }

    /// Storage provider for warehouse and metadata buckets.
    #[must_use]
    pub fn provider(&self) -> StorageProvider {
        self.provider
    }

    /// Bucket holding table data, trimmed.
    #[must_use]
    pub fn warehouse_bucket(&self) -> &str {
        self.warehouse_bucket.trim()
    }

    /// Prefix inside the warehouse bucket.
    #[must_use]
    pub fn warehouse_prefix(&self) -> &str {
        &self.warehouse_prefix
    }

    /// Namespace segments placed before the tenant id.
    #[must_use]
    pub fn namespace_prefix(&self) -> &[String] {
        &self.namespace_prefix
    }

    /// Dedicated metadata bucket, trimmed, if configured.
    #[must_use]
    pub fn metadata_bucket(&self) -> Option<&str> {
        self.metadata_bucket
            .as_deref()
            .map(str::trim)
            .filter(|bucket| !bucket.is_empty())
    }

    /// Provider-specific storage options.
    #[must_use]
    pub fn provider_options(&self) -> &BTreeMap<String, String> {
        &self.provider_options
    }

    /// Properties applied to every created namespace.
    #[must_use]
    pub fn namespace_properties(&self) -> &BTreeMap<String, String> {
        &self.namespace_properties
    }

    /// Catalog connection options.
    #[must_use]
    pub fn catalog_options(&self) -> &BTreeMap<String, String> {
        &self.catalog_options
    }

    /// Returns the namespace for `tenant`: the namespace prefix followed by
    /// the trimmed tenant id.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn namespace(&self, tenant: &str) -> IcebergResult<NamespaceIdent> {
        let tenant = TenantId::new(tenant)?;
        let mut namespace = self.namespace_prefix.clone();
        namespace.push(tenant.as_str().to_string());
        Ok(namespace)
    }

    /// Returns the namespace joined with `/`, as used inside warehouse paths.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn namespace_path(&self, tenant: &str) -> IcebergResult<String> {
        Ok(self.namespace(tenant)?.join("/"))
    }

    /// Returns the object store prefix for the tenant's warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn warehouse_path(&self, tenant: &str) -> IcebergResult<String> {
        let namespace_path = self.namespace_path(tenant)?;
        Ok(join_path(&[&self.warehouse_prefix, &namespace_path]))
    }

    /// Returns the fully qualified URI of the tenant's warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn warehouse_uri(&self, tenant: &str) -> IcebergResult<String> {
        let path = self.warehouse_path(tenant)?;
        Ok(self.uri(self.warehouse_bucket(), &path))
    }

    /// Returns the metadata prefix when a metadata bucket is configured.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn metadata_path(&self, tenant: &str) -> IcebergResult<Option<String>> {
        let namespace_path = self.namespace_path(tenant)?;
        if self.metadata_bucket().is_none() {
            return Ok(None);
        }
        let prefix = self
            .metadata_prefix
            .as_deref()
            .unwrap_or(&self.warehouse_prefix);
        Ok(Some(join_path(&[prefix, &namespace_path])))
    }

    /// Returns the metadata URI when a metadata bucket is configured.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn metadata_uri(&self, tenant: &str) -> IcebergResult<Option<String>> {
        let Some(path) = self.metadata_path(tenant)? else {
            return Ok(None);
        };
        Ok(self.metadata_bucket().map(|bucket| self.uri(bucket, &path)))
    }

    /// Returns the default location of `table_name` within the tenant's warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn table_location(&self, tenant: &str, table_name: &str) -> IcebergResult<String> {
        let base = self.warehouse_uri(tenant)?;
        Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            table_name.trim()
        ))
    }

    fn uri(&self, bucket: &str, path: &str) -> String {
        let scheme = self.provider.scheme();
        if path.is_empty() {
            format!("{scheme}://{bucket}")
        } else {
            format!("{scheme}://{bucket}/{path}")
        }
    }

    /// Loads a config from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the file cannot be read
    /// or does not describe a valid config.
    pub fn from_json_file(path: impl AsRef<Path>) -> IcebergResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            IcebergError::invalid_argument(format!(
                "failed to read catalog config {}: {e}",
                path.display()
            ))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            IcebergError::invalid_argument(format!(
                "invalid catalog config {}: {e}",
                path.display()
            ))
        })
    }

    /// Builds a config from `STRATA_*` environment variables.
    ///
    /// | variable | field |
    /// |----------|-------|
    /// | `STRATA_CATALOG_NAME` | catalog name (default `default`) |
    /// | `STRATA_PROVIDER` | provider tag (default `gcs`) |
    /// | `STRATA_WAREHOUSE_BUCKET` | warehouse bucket (required) |
    /// | `STRATA_WAREHOUSE_PREFIX` | warehouse prefix |
    /// | `STRATA_NAMESPACE_PREFIX` | `/`-separated namespace prefix |
    /// | `STRATA_METADATA_BUCKET` / `STRATA_METADATA_PREFIX` | metadata location |
    /// | `STRATA_CATALOG_TYPE` / `STRATA_CATALOG_URI` | catalog options `type` / `uri` |
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the bucket is missing or
    /// the provider tag is unsupported.
    pub fn from_env() -> IcebergResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> IcebergResult<Self> {
        let var = |name: &str| {
            lookup(name).and_then(|v| {
                let trimmed = v.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    Some(trimmed.to_string())
                }
            })
        };

        let bucket = var("STRATA_WAREHOUSE_BUCKET").ok_or_else(|| {
            IcebergError::invalid_argument("STRATA_WAREHOUSE_BUCKET is required")
        })?;
        let provider = match var("STRATA_PROVIDER") {
            Some(tag) => tag.parse()?,
            None => StorageProvider::Gcs,
        };
        let name = var("STRATA_CATALOG_NAME").unwrap_or_else(|| "default".to_string());

        let mut config = Self::new(name, provider, bucket);
        if let Some(prefix) = var("STRATA_WAREHOUSE_PREFIX") {
            config.warehouse_prefix = prefix;
        }
        if let Some(prefix) = var("STRATA_NAMESPACE_PREFIX") {
            config.namespace_prefix = prefix
                .split('/')
                .map(str::trim)
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(bucket) = var("STRATA_METADATA_BUCKET") {
            config.metadata_bucket = Some(bucket);
            config.metadata_prefix = var("STRATA_METADATA_PREFIX");
        }
        if let Some(kind) = var("STRATA_CATALOG_TYPE") {
            config.catalog_options.insert("type".to_string(), kind);
        }
        if let Some(uri) = var("STRATA_CATALOG_URI") {
            config.catalog_options.insert("uri".to_string(), uri);
        }
        Ok(config)
    }
}

/// Joins path segments with `/`, trimming separators from each segment and
/// dropping segments that end up empty.
fn join_path(segments: &[&str]) -> String {
    segments
        .iter()
        .map(|segment| segment.trim_matches('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn tenants_config() -> CatalogConfig {
        CatalogConfig::new("clients", StorageProvider::Gcs, "analytics-bucket")
            .with_warehouse_prefix("warehouse")
            .with_namespace_prefix(["tenants"])
            .with_metadata("metadata-bucket", Some("metadata".to_string()))
    }

    #[test]
    fn test_namespace_and_paths() {
        let config = tenants_config();

        assert_eq!(
            config.namespace("client-123").unwrap(),
            vec!["tenants".to_string(), "client-123".to_string()]
        );
        assert_eq!(
            config.warehouse_path("client-123").unwrap(),
            "warehouse/tenants/client-123"
        );
        assert_eq!(
            config.warehouse_uri("client-123").unwrap(),
            "gs://analytics-bucket/warehouse/tenants/client-123"
        );
        assert_eq!(
            config.metadata_path("client-123").unwrap().as_deref(),
            Some("metadata/tenants/client-123")
        );
        assert_eq!(
            config.metadata_uri("client-123").unwrap().as_deref(),
            Some("gs://metadata-bucket/metadata/tenants/client-123")
        );
        assert_eq!(
            config.table_location("client-123", "events").unwrap(),
            "gs://analytics-bucket/warehouse/tenants/client-123/events"
        );
    }

    #[test]
    fn test_namespace_is_stable_across_calls() {
        let config = tenants_config();
        let first = config.namespace(" client-123 ").unwrap();
        for _ in 0..3 {
            assert_eq!(config.namespace("client-123").unwrap(), first);
        }
    }

    #[test]
    fn test_blank_tenant_is_rejected_everywhere() {
        let config = tenants_config();
        assert!(config.namespace(" ").unwrap_err().is_invalid_argument());
        assert!(config.warehouse_path("").unwrap_err().is_invalid_argument());
        assert!(config.warehouse_uri("\t").unwrap_err().is_invalid_argument());
        assert!(config.metadata_uri(" ").unwrap_err().is_invalid_argument());
        assert!(
            config
                .table_location("  ", "events")
                .unwrap_err()
                .is_invalid_argument()
        );
    }

    #[test]
    fn test_separators_and_empty_segments_are_dropped() {
        let config = CatalogConfig::new("c", StorageProvider::S3, "lake")
            .with_warehouse_prefix("/warehouse/")
            .with_namespace_prefix(Vec::<String>::new());
        assert_eq!(config.warehouse_path("acme").unwrap(), "warehouse/acme");
        assert_eq!(config.warehouse_uri("acme").unwrap(), "s3://lake/warehouse/acme");

        let bare = CatalogConfig::new("c", StorageProvider::Azure, " lake ")
            .with_warehouse_prefix("///");
        assert_eq!(bare.warehouse_uri("acme").unwrap(), "abfs://lake/clients/acme");
    }

    #[test]
    fn test_buckets_are_trimmed() {
        let config = CatalogConfig::new("c", StorageProvider::S3, "  lake ")
            .with_metadata(" meta\n", None);
        assert_eq!(config.warehouse_bucket(), "lake");
        assert_eq!(config.metadata_bucket(), Some("meta"));
        assert_eq!(config.metadata_uri("acme").unwrap().as_deref(), Some("s3://meta/clients/acme"));

        let parsed: CatalogConfig = serde_json::from_str(
            r#"{"name":"c","provider":"gcs","warehouse_bucket":" lake ","metadata_bucket":"  "}"#,
        )
        .unwrap();
        assert_eq!(parsed.warehouse_bucket(), "lake");
        assert_eq!(parsed.metadata_bucket(), None);
    }

    #[test]
    fn test_metadata_not_configured() {
        let config = CatalogConfig::new("c", StorageProvider::Gcs, "analytics");
        assert_eq!(config.metadata_path("acme").unwrap(), None);
        assert_eq!(config.metadata_uri("acme").unwrap(), None);
    }

    #[test]
    fn test_metadata_prefix_falls_back_to_warehouse_prefix() {
        let config = CatalogConfig::new("c", StorageProvider::Gcs, "analytics")
            .with_warehouse_prefix("warehouse")
            .with_metadata("meta", None);
        assert_eq!(
            config.metadata_uri("acme").unwrap().as_deref(),
            Some("gs://meta/warehouse/clients/acme")
        );
    }

    #[test]
    fn test_table_location_trims_name() {
        let config = CatalogConfig::new("c", StorageProvider::Gcs, "analytics");
        assert_eq!(
            config.table_location("acme", "  main ").unwrap(),
            "gs://analytics/clients/acme/main"
        );
    }

    #[test]
    fn test_provider_lookup_is_total() {
        let schemes: Vec<_> = StorageProvider::ALL.iter().map(|p| p.scheme()).collect();
        assert_eq!(schemes, vec!["gs", "s3", "abfs"]);
        for provider in StorageProvider::ALL {
            assert_eq!(provider.tag().parse::<StorageProvider>().unwrap(), provider);
        }
        assert!("hdfs".parse::<StorageProvider>().unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_deserializes_with_defaults() {
        let config: CatalogConfig = serde_json::from_str(
            r#"{"name":"clients","provider":"gcs","warehouse_bucket":"analytics"}"#,
        )
        .unwrap();
        assert_eq!(config.namespace_prefix(), ["clients".to_string()]);
        assert_eq!(config.warehouse_prefix(), "");
        assert!(config.catalog_options().is_empty());
    }

    #[test]
    fn test_unknown_provider_fails_deserialization() {
        let err = serde_json::from_str::<CatalogConfig>(
            r#"{"name":"clients","provider":"ftp","warehouse_bucket":"analytics"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ftp"));
    }

    #[test]
    fn test_from_lookup_reads_strata_variables() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("STRATA_WAREHOUSE_BUCKET", "analytics"),
            ("STRATA_PROVIDER", "s3"),
            ("STRATA_WAREHOUSE_PREFIX", "warehouse"),
            ("STRATA_NAMESPACE_PREFIX", "org/clients"),
            ("STRATA_METADATA_BUCKET", "   "),
            ("STRATA_CATALOG_TYPE", "rest"),
            ("STRATA_CATALOG_URI", "http://localhost:8181"),
        ]);
        let config =
            CatalogConfig::from_lookup(|name| vars.get(name).map(ToString::to_string)).unwrap();

        assert_eq!(config.provider(), StorageProvider::S3);
        assert_eq!(config.catalog_name(), "default");
        assert_eq!(
            config.warehouse_uri("acme").unwrap(),
            "s3://analytics/warehouse/org/clients/acme"
        );
        assert_eq!(config.metadata_bucket(), None);
        assert_eq!(
            config.catalog_options().get("uri").map(String::as_str),
            Some("http://localhost:8181")
        );
    }

    #[test]
    fn test_from_lookup_requires_bucket() {
        let err = CatalogConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains("STRATA_WAREHOUSE_BUCKET"));
    }
}
