//! Table metadata and Iceberg REST request/response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ident::{NamespaceIdent, TableIdent};
use super::partition::PartitionSpec;
use super::schema::Schema;

/// Iceberg table metadata.
///
/// Only the parts that provisioning and schema evolution touch are modelled;
/// snapshot and sort-order state is left to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    /// Format version (1 or 2).
    #[serde(rename = "format-version")]
    pub format_version: i32,

    /// Unique table identifier.
    #[serde(rename = "table-uuid")]
    pub table_uuid: Uuid,

    /// Table location (root path for data and metadata).
    pub location: String,

    /// Last updated timestamp in milliseconds.
    #[serde(rename = "last-updated-ms", default)]
    pub last_updated_ms: i64,

    /// Last assigned column ID.
    #[serde(rename = "last-column-id")]
    pub last_column_id: i32,

    /// Current schema ID.
    #[serde(rename = "current-schema-id")]
    pub current_schema_id: i32,

    /// All schemas, oldest first.
    pub schemas: Vec<Schema>,

    /// Table properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    /// Default partition spec ID.
    #[serde(rename = "default-spec-id", default)]
    pub default_spec_id: i32,

    /// Partition specs.
    #[serde(rename = "partition-specs", default)]
    pub partition_specs: Vec<PartitionSpec>,

    /// Highest assigned partition field ID.
    #[serde(rename = "last-partition-id", default)]
    pub last_partition_id: i32,
}

impl TableMetadata {
    /// Returns the current schema.
    #[must_use]
    pub fn current_schema(&self) -> Option<&Schema> {
        self.schemas
            .iter()
            .find(|schema| schema.schema_id() == self.current_schema_id)
    }

    /// Returns the default partition spec.
    #[must_use]
    pub fn default_partition_spec(&self) -> Option<&PartitionSpec> {
        self.partition_specs
            .iter()
            .find(|spec| spec.spec_id == self.default_spec_id)
    }
}

/// Response from `GET /v1/{prefix}/namespaces/{namespace}/tables/{table}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadTableResponse {
    /// The location of the metadata file.
    #[serde(rename = "metadata-location", default, skip_serializing_if = "Option::is_none")]
    pub metadata_location: Option<String>,

    /// The table metadata.
    pub metadata: TableMetadata,

    /// Additional configuration for the table.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub config: BTreeMap<String, String>,
}

/// Body of `POST /v1/{prefix}/namespaces`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNamespaceRequest {
    /// Namespace to create.
    pub namespace: NamespaceIdent,

    /// Namespace properties.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// Body of `POST /v1/{prefix}/namespaces/{namespace}/tables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTableRequest {
    /// Table name.
    pub name: String,

    /// Table location.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Table schema.
    pub schema: Schema,

    /// Partition spec, if partitioned.
    #[serde(rename = "partition-spec", skip_serializing_if = "Option::is_none")]
    pub partition_spec: Option<PartitionSpec>,

    /// Table properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

/// Requirement checked by the catalog before applying a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum UpdateRequirement {
    /// Assert the current schema ID.
    AssertCurrentSchemaId {
        /// Expected current schema ID.
        #[serde(rename = "current-schema-id")]
        current_schema_id: i32,
    },

    /// Assert the last assigned column ID.
    AssertLastAssignedFieldId {
        /// Expected last assigned field ID.
        #[serde(rename = "last-assigned-field-id")]
        last_assigned_field_id: i32,
    },
}

/// Metadata update applied by a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TableUpdate {
    /// Add a new schema.
    AddSchema {
        /// The schema to add.
        schema: Schema,
        /// Highest column ID after the change.
        #[serde(rename = "last-column-id", skip_serializing_if = "Option::is_none")]
        last_column_id: Option<i32>,
    },

    /// Set the current schema.
    SetCurrentSchema {
        /// Schema ID to make current.
        #[serde(rename = "schema-id")]
        schema_id: i32,
    },
}

/// Body of `POST /v1/{prefix}/namespaces/{namespace}/tables/{table}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitTableRequest {
    /// Target table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<TableIdent>,

    /// Requirements that must hold for the commit to apply.
    pub requirements: Vec<UpdateRequirement>,

    /// Updates to apply.
    pub updates: Vec<TableUpdate>,
}

/// Iceberg REST error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error details.
    pub error: ErrorModel,
}

/// Error details inside [`ErrorResponse`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorModel {
    /// Human-readable message.
    pub message: String,
    /// Error type name.
    #[serde(rename = "type")]
    pub error_type: String,
    /// HTTP status code.
    pub code: u16,
}
