//! Error types for catalog bootstrap and schema evolution.
//!
//! The variants follow the failure taxonomy callers need to act on:
//! bad input is never retried, storage and catalog failures carry the
//! identifiers needed to diagnose them, and schema-evolution failures are
//! kept distinct so "bad column definition" never looks like an outage.

use thiserror::Error;

use crate::config::StorageProvider;

/// Result type alias for catalog operations.
pub type IcebergResult<T> = Result<T, IcebergError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors raised while resolving, provisioning, or evolving tenant catalogs.
#[derive(Debug, Error)]
pub enum IcebergError {
    /// Caller error: blank tenant id, bad type name, unknown partition column,
    /// unsupported provider tag.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Human-readable error message.
        message: String,
    },

    /// Preparing or writing a warehouse prefix failed.
    #[error("storage error: unable to write to {provider} bucket '{bucket}' under '{path}'")]
    Storage {
        /// Storage provider of the target bucket.
        provider: StorageProvider,
        /// Target bucket.
        bucket: String,
        /// Object path that was being written.
        path: String,
        /// The underlying cause.
        #[source]
        source: BoxError,
    },

    /// A schema change could not be applied safely.
    #[error("schema evolution error: {message}")]
    SchemaEvolution {
        /// Human-readable error message.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// A required backend (catalog type, storage provider) is not configured.
    #[error("capability unavailable: {capability}: {message}")]
    CapabilityUnavailable {
        /// Name of the missing capability.
        capability: &'static str,
        /// Human-readable error message.
        message: String,
    },

    /// A namespace or table does not exist.
    #[error("{resource_type} does not exist: {id}")]
    NotFound {
        /// Kind of resource (`namespace`, `table`).
        resource_type: &'static str,
        /// Identifier that was looked up.
        id: String,
    },

    /// A create call found the resource already present.
    #[error("{resource_type} already exists: {id}")]
    AlreadyExists {
        /// Kind of resource (`namespace`, `table`).
        resource_type: &'static str,
        /// Identifier of the conflicting resource.
        id: String,
    },

    /// Any other catalog backend failure.
    #[error("catalog error: {message}")]
    Catalog {
        /// Human-readable error message.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The caller-supplied deadline expired before the call completed.
    #[error("deadline exceeded during {operation}")]
    DeadlineExceeded {
        /// The operation that was in flight.
        operation: String,
    },
}

impl IcebergError {
    /// Creates an invalid argument error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a schema evolution error without a cause.
    #[must_use]
    pub fn schema_evolution(message: impl Into<String>) -> Self {
        Self::SchemaEvolution {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a catalog error without a cause.
    #[must_use]
    pub fn catalog(message: impl Into<String>) -> Self {
        Self::Catalog {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a catalog error with a cause.
    #[must_use]
    pub fn catalog_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Catalog {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a not found error for a namespace.
    #[must_use]
    pub fn namespace_not_found(namespace: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "namespace",
            id: namespace.into(),
        }
    }

    /// Creates a not found error for a table.
    #[must_use]
    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::NotFound {
            resource_type: "table",
            id: table.into(),
        }
    }

    /// Returns true for the "already exists" outcome of a create call.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Returns true for caller errors.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns true for schema evolution failures.
    #[must_use]
    pub fn is_schema_evolution(&self) -> bool {
        matches!(self, Self::SchemaEvolution { .. })
    }
}

impl From<strata_core::Error> for IcebergError {
    fn from(err: strata_core::Error) -> Self {
        match err {
            strata_core::Error::InvalidId { message } => Self::InvalidArgument { message },
            strata_core::Error::InvalidInput(message) => Self::InvalidArgument { message },
            other => Self::Catalog {
                message: other.to_string(),
                source: Some(Box::new(other)),
            },
        }
    }
}
