//! Declarative table definitions.
//!
//! A [`TableSpec`] names a table, its columns (typed with a small type-name
//! vocabulary) and its partition columns. It is turned into an Iceberg
//! [`Schema`] and [`PartitionSpec`] right before table creation, so a bad
//! type name or partition column fails before any catalog call is made.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};

use crate::config::CatalogConfig;
use crate::error::{IcebergError, IcebergResult};
use crate::types::{
    NamespaceIdent, NestedField, PartitionField, PartitionSpec, PrimitiveType, Schema, StructType,
    TableIdent, Transform, Type, dotted, parse_decimal_args, struct_fields_mut,
};

/// A column in a table definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Column name.
    pub name: String,
    /// Type name, for example `string`, `timestamptz` or `decimal(10,2)`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the column is required.
    #[serde(default)]
    pub required: bool,
    /// Optional column documentation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
    /// Path of the enclosing struct column; empty for top-level columns.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent: Vec<String>,
}

impl SchemaField {
    /// Creates an optional top-level column.
    #[must_use]
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            required: false,
            doc: None,
            parent: Vec::new(),
        }
    }

    /// Marks the column as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Attaches documentation.
    #[must_use]
    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Places the column under a struct column.
    #[must_use]
    pub fn with_parent<I, S>(mut self, parent: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parent = parent.into_iter().map(Into::into).collect();
        self
    }

    /// Returns `parent.name`, the key used to match columns during evolution.
    #[must_use]
    pub fn dotted_path(&self) -> String {
        dotted(&self.parent, &self.name)
    }

    /// Maps the type name to an Iceberg type.
    ///
    /// Names are matched case-insensitively after trimming. Besides the
    /// primitive names, `struct` yields an empty struct that later columns
    /// can name as their parent.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] naming the type string if it
    /// is not recognized or is a malformed decimal.
    pub fn resolve_type(&self) -> IcebergResult<Type> {
        let normalized = self.type_name.trim().to_ascii_lowercase();
        if normalized.starts_with("decimal") {
            let (precision, scale) = parse_decimal_args(&normalized).ok_or_else(|| {
                IcebergError::invalid_argument(format!(
                    "decimal specification '{}' must look like decimal(precision,scale)",
                    self.type_name
                ))
            })?;
            return PrimitiveType::decimal(precision, scale).map(Type::Primitive);
        }
        let primitive = match normalized.as_str() {
            "string" => PrimitiveType::String,
            "boolean" => PrimitiveType::Boolean,
            "binary" => PrimitiveType::Binary,
            "int" | "integer" => PrimitiveType::Int,
            "long" => PrimitiveType::Long,
            "float" => PrimitiveType::Float,
            "double" => PrimitiveType::Double,
            "date" => PrimitiveType::Date,
            "timestamp" => PrimitiveType::Timestamp,
            "timestamptz" | "timestamp_tz" | "timestamp with time zone" => {
                PrimitiveType::Timestamptz
            }
            "uuid" => PrimitiveType::Uuid,
            "struct" => return Ok(Type::Struct(StructType::default())),
            _ => {
                return Err(IcebergError::invalid_argument(format!(
                    "unsupported Iceberg field type: {}",
                    self.type_name
                )));
            }
        };
        Ok(Type::Primitive(primitive))
    }

    fn to_nested_field(&self, id: i32) -> IcebergResult<NestedField> {
        Ok(NestedField {
            id,
            name: self.name.clone(),
            required: self.required,
            field_type: self.resolve_type()?,
            doc: self.doc.clone(),
        })
    }
}

/// The desired layout of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Table name.
    pub name: String,
    /// Columns in declaration order.
    pub fields: Vec<SchemaField>,
    /// Partition columns (dotted paths), in declaration order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub partition_by: Vec<String>,
    /// Table properties.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, String>,
}

impl TableSpec {
    /// Creates an unpartitioned table definition.
    #[must_use]
    pub fn new(name: impl Into<String>, fields: Vec<SchemaField>) -> Self {
        Self {
            name: name.into(),
            fields,
            partition_by: Vec::new(),
            properties: BTreeMap::new(),
        }
    }

    /// Sets the partition columns.
    #[must_use]
    pub fn partitioned_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.partition_by = columns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a table property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Returns the identifier of this table under `namespace`.
    #[must_use]
    pub fn identifier(&self, namespace: &NamespaceIdent) -> TableIdent {
        TableIdent::new(namespace.clone(), self.name.clone())
    }

    /// Builds the Iceberg schema, assigning field ids from 1 in declaration
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] for an unsupported type name
    /// or a parent path that does not name an earlier struct column.
    pub fn build_schema(&self) -> IcebergResult<Schema> {
        let mut columns: Vec<NestedField> = Vec::with_capacity(self.fields.len());
        for (field, id) in self.fields.iter().zip(1..) {
            let nested = field.to_nested_field(id)?;
            let siblings = struct_fields_mut(&mut columns, &field.parent).ok_or_else(|| {
                IcebergError::invalid_argument(format!(
                    "column '{}' in table '{}' names parent '{}', which is not a struct column declared before it",
                    field.dotted_path(),
                    self.name,
                    field.parent.join(".")
                ))
            })?;
            siblings.push(nested);
        }
        Ok(Schema::new(columns))
    }

    /// Builds an identity partition spec over the partition columns.
    ///
    /// Returns `Ok(None)` when no partition columns are declared. Partition
    /// field ids start one past the schema's highest field id.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if a partition column is not
    /// in `schema`.
    pub fn build_partition_spec(&self, schema: &Schema) -> IcebergResult<Option<PartitionSpec>> {
        if self.partition_by.is_empty() {
            return Ok(None);
        }
        let mut next_id = schema.highest_field_id();
        let mut fields = Vec::with_capacity(self.partition_by.len());
        for column in &self.partition_by {
            let source = schema.find_field(column).ok_or_else(|| {
                IcebergError::invalid_argument(format!(
                    "partition column '{column}' is not present in the schema for table '{}'",
                    self.name
                ))
            })?;
            next_id += 1;
            fields.push(PartitionField {
                source_id: source.id,
                field_id: next_id,
                name: column.clone(),
                transform: Transform::Identity,
            });
        }
        Ok(Some(PartitionSpec { spec_id: 0, fields }))
    }

    /// Returns the storage location of this table for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns [`IcebergError::InvalidArgument`] if the tenant id is blank.
    pub fn location(&self, config: &CatalogConfig, tenant: &str) -> IcebergResult<String> {
        config.table_location(tenant, &self.name)
    }
}

const PARQUET: &str = "parquet";
const FORMAT_PROPERTY: &str = "write.format.default";
const TARGET_FILE_SIZE_PROPERTY: &str = "write.target-file-size-bytes";
const MAIN_TARGET_FILE_SIZE: u64 = 512 * 1024 * 1024;

/// The tables provisioned when a bootstrap call names none: `main`,
/// `events` and `metrics`.
#[must_use]
pub fn default_tables() -> &'static [TableSpec] {
    static DEFAULTS: OnceLock<Vec<TableSpec>> = OnceLock::new();
    DEFAULTS.get_or_init(build_default_tables)
}

fn build_default_tables() -> Vec<TableSpec> {
    vec![
        TableSpec::new(
            "main",
            vec![
                SchemaField::new("record_id", "string")
                    .required()
                    .with_doc("Stable identifier for the record."),
                SchemaField::new("source", "string").with_doc("System that produced the record."),
                SchemaField::new("payload", "string")
                    .with_doc("Raw JSON payload ingested from the source system."),
                SchemaField::new("ingested_at", "timestamptz")
                    .with_doc("Timestamp when the record reached the warehouse."),
                SchemaField::new("ingested_date", "date")
                    .with_doc("Calendar date derived from ingested_at for filtering."),
            ],
        )
        .partitioned_by(["ingested_date"])
        .with_property(FORMAT_PROPERTY, PARQUET)
        .with_property(TARGET_FILE_SIZE_PROPERTY, MAIN_TARGET_FILE_SIZE.to_string()),
        TableSpec::new(
            "events",
            vec![
                SchemaField::new("event_id", "string")
                    .required()
                    .with_doc("Unique identifier for the event."),
                SchemaField::new("event_type", "string")
                    .with_doc("Logical type or category for the event."),
                SchemaField::new("occurred_at", "timestamptz")
                    .with_doc("When the event took place according to the producer."),
                SchemaField::new("ingested_at", "timestamptz")
                    .with_doc("Ingestion timestamp assigned by the pipeline."),
                SchemaField::new("properties", "string")
                    .with_doc("Semi-structured JSON payload for event attributes."),
            ],
        )
        .partitioned_by(["occurred_at"])
        .with_property(FORMAT_PROPERTY, PARQUET),
        TableSpec::new(
            "metrics",
            vec![
                SchemaField::new("metric_id", "string")
                    .required()
                    .with_doc("Identifier for the metric sample."),
                SchemaField::new("metric_name", "string").with_doc("Human-friendly metric name."),
                SchemaField::new("metric_value", "double")
                    .with_doc("Numeric value captured for the metric."),
                SchemaField::new("captured_at", "timestamptz")
                    .with_doc("Time when the metric was captured."),
                SchemaField::new("dimensions", "string")
                    .with_doc("JSON object describing metric dimensions or tags."),
            ],
        )
        .partitioned_by(["captured_at"])
        .with_property(FORMAT_PROPERTY, PARQUET),
    ]
}
