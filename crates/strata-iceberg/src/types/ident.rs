//! Namespace and table identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A namespace identifier, represented as a list of strings.
///
/// Example: `["clients", "acme"]` represents namespace `clients.acme`
pub type NamespaceIdent = Vec<String>;

/// Table identifier with namespace and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableIdent {
    /// The namespace containing the table.
    pub namespace: NamespaceIdent,

    /// The table name.
    pub name: String,
}

impl TableIdent {
    /// Creates a new table identifier.
    #[must_use]
    pub fn new(namespace: NamespaceIdent, name: impl Into<String>) -> Self {
        Self {
            namespace,
            name: name.into(),
        }
    }

    /// Returns the identifier as path segments (namespace followed by name).
    #[must_use]
    pub fn to_segments(&self) -> Vec<String> {
        let mut segments = self.namespace.clone();
        segments.push(self.name.clone());
        segments
    }
}

impl fmt::Display for TableIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.namespace {
            write!(f, "{segment}.")?;
        }
        f.write_str(&self.name)
    }
}
