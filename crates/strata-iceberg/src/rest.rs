//! Iceberg REST catalog client.
//!
//! Speaks the subset of the Iceberg REST protocol that provisioning and
//! schema evolution need: namespace and table existence checks, creates,
//! table loads and schema commits. Multi-level namespaces travel as one path
//! segment joined with the unit separator (`0x1F`).

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::catalog::{Catalog, Table, TableCreation};
use crate::error::{IcebergError, IcebergResult};
use crate::types::{
    AddColumn, CommitTableRequest, CreateNamespaceRequest, CreateTableRequest, ErrorResponse,
    LoadTableResponse, NamespaceIdent, Schema, TableIdent, TableMetadata, TableUpdate,
    UpdateRequirement,
};

const NAMESPACE_SEPARATOR: &str = "\u{1f}";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for a REST catalog.
#[derive(Clone, PartialEq, Eq)]
pub struct RestCatalogConfig {
    /// Base URI of the catalog service.
    pub uri: Url,
    /// Path prefix inserted after `/v1`.
    pub prefix: Option<String>,
    /// Bearer token.
    pub token: Option<String>,
    /// Warehouse used to look up the prefix from `/v1/config`.
    pub warehouse: Option<String>,
}

impl fmt::Debug for RestCatalogConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestCatalogConfig")
            .field("uri", &self.uri.as_str())
            .field("prefix", &self.prefix)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("warehouse", &self.warehouse)
            .finish()
    }
}

impl RestCatalogConfig {
    /// Reads `uri`, `prefix`, `token` and `warehouse` from catalog options.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::CapabilityUnavailable`] if `uri` is missing or
    /// not an absolute URL.
    pub fn from_options(options: &BTreeMap<String, String>) -> IcebergResult<Self> {
        let non_blank = |key: &str| {
            options
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let raw_uri = non_blank("uri").ok_or_else(|| IcebergError::CapabilityUnavailable {
            capability: "rest catalog",
            message: "the 'uri' catalog option is required".to_string(),
        })?;
        let uri = Url::parse(&raw_uri).map_err(|e| IcebergError::CapabilityUnavailable {
            capability: "rest catalog",
            message: format!("invalid catalog uri '{raw_uri}': {e}"),
        })?;
        if uri.cannot_be_a_base() {
            return Err(IcebergError::CapabilityUnavailable {
                capability: "rest catalog",
                message: format!("catalog uri '{raw_uri}' cannot be used as a base URL"),
            });
        }
        Ok(Self {
            uri,
            prefix: non_blank("prefix").map(|p| p.trim_matches('/').to_string()),
            token: non_blank("token"),
            warehouse: non_blank("warehouse"),
        })
    }
}

/// Catalog backed by an Iceberg REST service. Clones share the HTTP client.
#[derive(Clone)]
pub struct RestCatalog {
    inner: Arc<RestInner>,
}

struct RestInner {
    name: String,
    client: Client,
    config: RestCatalogConfig,
    prefix: OnceCell<Option<String>>,
}

impl fmt::Debug for RestCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestCatalog")
            .field("name", &self.inner.name)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct ConfigResponse {
    #[serde(default)]
    defaults: BTreeMap<String, String>,
    #[serde(default)]
    overrides: BTreeMap<String, String>,
}

impl RestCatalog {
    /// Creates a client.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::CapabilityUnavailable`] if the HTTP client
    /// cannot be built.
    pub fn new(name: impl Into<String>, config: RestCatalogConfig) -> IcebergResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| IcebergError::CapabilityUnavailable {
                capability: "rest catalog",
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            inner: Arc::new(RestInner {
                name: name.into(),
                client,
                config,
                prefix: OnceCell::new(),
            }),
        })
    }

    /// Catalog name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    async fn prefix(&self) -> IcebergResult<Option<String>> {
        self.inner
            .prefix
            .get_or_try_init(|| async {
                if let Some(prefix) = &self.inner.config.prefix {
                    return Ok(Some(prefix.clone()));
                }
                let Some(warehouse) = &self.inner.config.warehouse else {
                    return Ok(None);
                };
                let mut url = self.url_from(&["v1", "config"])?;
                url.query_pairs_mut().append_pair("warehouse", warehouse);
                let response = self.send(self.inner.client.get(url), "get config").await?;
                let config: ConfigResponse = expect_json(response, "get config").await?;
                let prefix = config
                    .overrides
                    .get("prefix")
                    .or_else(|| config.defaults.get("prefix"))
                    .map(|p| p.trim_matches('/').to_string())
                    .filter(|p| !p.is_empty());
                tracing::debug!(catalog = %self.inner.name, ?prefix, "resolved catalog prefix");
                Ok(prefix)
            })
            .await
            .cloned()
    }

    fn url_from(&self, segments: &[&str]) -> IcebergResult<Url> {
        let mut url = self.inner.config.uri.clone();
        url.path_segments_mut()
            .map_err(|()| IcebergError::catalog("catalog uri cannot be used as a base URL"))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn url(&self, segments: &[&str]) -> IcebergResult<Url> {
        let prefix = self.prefix().await?;
        let mut all = vec!["v1"];
        if let Some(prefix) = prefix.as_deref() {
            all.extend(prefix.split('/'));
        }
        all.extend_from_slice(segments);
        self.url_from(&all)
    }

    async fn namespace_url(&self, namespace: &NamespaceIdent) -> IcebergResult<Url> {
        let encoded = namespace.join(NAMESPACE_SEPARATOR);
        self.url(&["namespaces", &encoded]).await
    }

    async fn table_url(&self, identifier: &TableIdent) -> IcebergResult<Url> {
        let encoded = identifier.namespace.join(NAMESPACE_SEPARATOR);
        self.url(&["namespaces", &encoded, "tables", &identifier.name])
            .await
    }

    async fn send(&self, request: RequestBuilder, operation: &str) -> IcebergResult<Response> {
        let request = match &self.inner.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        request.send().await.map_err(|e| {
            IcebergError::catalog_with_source(format!("{operation}: request failed"), e)
        })
    }

    async fn exists(&self, url: Url, operation: &str) -> IcebergResult<bool> {
        let response = self.send(self.inner.client.head(url), operation).await?;
        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(response, operation).await),
        }
    }

    async fn load_metadata(&self, identifier: &TableIdent) -> IcebergResult<TableMetadata> {
        let url = self.table_url(identifier).await?;
        let response = self.send(self.inner.client.get(url), "load table").await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(IcebergError::table_not_found(identifier.to_string()));
        }
        let loaded: LoadTableResponse = expect_json(response, "load table").await?;
        Ok(loaded.metadata)
    }

    async fn commit(&self, identifier: &TableIdent, request: &CommitTableRequest) -> IcebergResult<()> {
        let url = self.table_url(identifier).await?;
        let response = self
            .send(self.inner.client.post(url).json(request), "commit table")
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(IcebergError::table_not_found(identifier.to_string())),
            StatusCode::CONFLICT => {
                let detail = error_detail(response).await;
                Err(IcebergError::schema_evolution(format!(
                    "commit to table '{identifier}' conflicted: {detail}"
                )))
            }
            _ => Err(unexpected(response, "commit table").await),
        }
    }
}

#[async_trait]
impl Catalog for RestCatalog {
    async fn namespace_exists(&self, namespace: &NamespaceIdent) -> IcebergResult<bool> {
        let url = self.namespace_url(namespace).await?;
        self.exists(url, "namespace exists").await
    }

    async fn create_namespace(
        &self,
        namespace: &NamespaceIdent,
        properties: BTreeMap<String, String>,
    ) -> IcebergResult<()> {
        let url = self.url(&["namespaces"]).await?;
        let body = CreateNamespaceRequest {
            namespace: namespace.clone(),
            properties,
        };
        let response = self
            .send(self.inner.client.post(url).json(&body), "create namespace")
            .await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            StatusCode::CONFLICT => Err(IcebergError::AlreadyExists {
                resource_type: "namespace",
                id: namespace.join("."),
            }),
            _ => Err(unexpected(response, "create namespace").await),
        }
    }

    async fn table_exists(&self, identifier: &TableIdent) -> IcebergResult<bool> {
        let url = self.table_url(identifier).await?;
        self.exists(url, "table exists").await
    }

    async fn create_table(
        &self,
        identifier: &TableIdent,
        creation: TableCreation,
    ) -> IcebergResult<Box<dyn Table>> {
        let encoded = identifier.namespace.join(NAMESPACE_SEPARATOR);
        let url = self.url(&["namespaces", &encoded, "tables"]).await?;
        let body = CreateTableRequest {
            name: identifier.name.clone(),
            location: Some(creation.location),
            schema: creation.schema,
            partition_spec: creation.partition_spec,
            properties: creation.properties,
        };
        let response = self
            .send(self.inner.client.post(url).json(&body), "create table")
            .await?;
        match response.status() {
            StatusCode::CONFLICT => {
                return Err(IcebergError::AlreadyExists {
                    resource_type: "table",
                    id: identifier.to_string(),
                });
            }
            StatusCode::NOT_FOUND => {
                return Err(IcebergError::namespace_not_found(
                    identifier.namespace.join("."),
                ));
            }
            _ => {}
        }
        let loaded: LoadTableResponse = expect_json(response, "create table").await?;
        Ok(Box::new(RestTable::new(
            self.clone(),
            identifier.clone(),
            loaded.metadata,
        )))
    }

    async fn load_table(&self, identifier: &TableIdent) -> IcebergResult<Box<dyn Table>> {
        let metadata = self.load_metadata(identifier).await?;
        Ok(Box::new(RestTable::new(
            self.clone(),
            identifier.clone(),
            metadata,
        )))
    }
}

async fn expect_json<T: DeserializeOwned>(response: Response, operation: &str) -> IcebergResult<T> {
    if !response.status().is_success() {
        return Err(unexpected(response, operation).await);
    }
    response.json().await.map_err(|e| {
        IcebergError::catalog_with_source(format!("{operation}: invalid response body"), e)
    })
}

async fn error_detail(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorResponse>(&body)
        .map(|parsed| format!("{}: {}", parsed.error.error_type, parsed.error.message))
        .unwrap_or(body)
}

async fn unexpected(response: Response, operation: &str) -> IcebergError {
    let status = response.status();
    let detail = error_detail(response).await;
    IcebergError::catalog(format!("{operation} failed ({status}): {detail}"))
}

/// Table handle over a [`RestCatalog`].
struct RestTable {
    catalog: RestCatalog,
    identifier: TableIdent,
    metadata: RwLock<TableMetadata>,
}

impl RestTable {
    fn new(catalog: RestCatalog, identifier: TableIdent, metadata: TableMetadata) -> Self {
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
}

#[async_trait]
impl Table for RestTable {
    fn identifier(&self) -> &TableIdent {
        &self.identifier
    }

    fn schema(&self) -> IcebergResult<Schema> {
        self.cached()?.current_schema().cloned().ok_or_else(|| {
            IcebergError::catalog(format!("table '{}' has no current schema", self.identifier))
        })
    }

    async fn apply_schema_changes(&self, changes: Vec<AddColumn>) -> IcebergResult<()> {
        let metadata = self.cached()?;
        let current = metadata.current_schema().ok_or_else(|| {
            IcebergError::catalog(format!(
                "table '{}' has no current schema",
                self.identifier
            ))
        })?;
        let next_schema_id = metadata
            .schemas
            .iter()
            .map(Schema::schema_id)
            .max()
            .unwrap_or(0)
            + 1;
        let (schema, last_column_id) =
            current.with_added_columns(&changes, metadata.last_column_id)?;
        let request = CommitTableRequest {
            identifier: Some(self.identifier.clone()),
            requirements: vec![UpdateRequirement::AssertCurrentSchemaId {
                current_schema_id: metadata.current_schema_id,
            }],
            updates: vec![
                TableUpdate::AddSchema {
                    schema: schema.with_schema_id(next_schema_id),
                    last_column_id: Some(last_column_id),
                },
                // -1 selects the schema added by this commit
                TableUpdate::SetCurrentSchema { schema_id: -1 },
            ],
        };
        self.catalog.commit(&self.identifier, &request).await
    }

    async fn refresh(&self) -> IcebergResult<()> {
        let metadata = self.catalog.load_metadata(&self.identifier).await?;
        let mut guard = self
            .metadata
            .write()
            .map_err(|_| IcebergError::catalog("table handle lock poisoned"))?;
        *guard = metadata;
        Ok(())
    }
}
