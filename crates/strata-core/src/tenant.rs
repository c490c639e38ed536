//! Tenant identity.
//!
//! Every catalog namespace and warehouse prefix is derived from a tenant
//! (client) identifier. The identifier is stored trimmed; a value that is
//! empty after trimming is rejected at every entry point.
//!
//! # Example
//!
//! ```rust
//! use strata_core::tenant::TenantId;
//!
//! let tenant = TenantId::new(" client-123 ").unwrap();
//! assert_eq!(tenant.as_str(), "client-123");
//! assert!(TenantId::new("   ").is_err());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// A validated, trimmed tenant identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant ID from a raw client identifier.
    ///
    /// Surrounding whitespace is removed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidId`] if the identifier is blank.
    pub fn new(id: impl AsRef<str>) -> Result<Self> {
        let trimmed = id.as_ref().trim();
        if trimmed.is_empty() {
            return Err(Error::InvalidId {
                message: "tenant id must be a non-empty string".to_string(),
            });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the tenant ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for TenantId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<TenantId> for String {
    fn from(value: TenantId) -> Self {
        value.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
