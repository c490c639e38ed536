//! Partition specification types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Partition specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    /// Spec ID.
    #[serde(rename = "spec-id")]
    pub spec_id: i32,

    /// Partition fields.
    #[serde(default)]
    pub fields: Vec<PartitionField>,
}

impl PartitionSpec {
    /// Returns true when the spec has no fields.
    #[must_use]
    pub fn is_unpartitioned(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A field in a partition specification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionField {
    /// Source column ID.
    #[serde(rename = "source-id")]
    pub source_id: i32,

    /// Unique partition field ID.
    #[serde(rename = "field-id")]
    pub field_id: i32,

    /// Field name.
    pub name: String,

    /// Transform applied to the source column.
    pub transform: Transform,
}

/// Partition transforms.
///
/// Only identity partitioning is produced by table provisioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    /// Partition directly by the source value.
    Identity,
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identity => f.write_str("identity"),
        }
    }
}
