//! # strata-core
//!
//! Core abstractions shared by the Strata tenant catalog components.
//!
//! This crate provides the foundational types and traits used across Strata:
//!
//! - **Tenant Identity**: the validated tenant (client) identifier
//! - **Storage Traits**: the object-store capability consumed by warehouse preparation
//! - **Storage Adapters**: an in-memory backend and an `object_store`-backed backend
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: logging initialization and span helpers
//!
//! ## Example
//!
//! ```rust
//! use strata_core::prelude::*;
//!
//! let tenant = TenantId::new("  acme  ").unwrap();
//! assert_eq!(tenant.as_str(), "acme");
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod object_store_backend;
pub mod observability;
pub mod storage;
pub mod tenant;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use strata_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::object_store_backend::ObjectStoreBackend;
    pub use crate::storage::{MemoryBackend, ObjectMeta, StorageBackend};
    pub use crate::tenant::TenantId;
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use object_store_backend::ObjectStoreBackend;
pub use observability::{LogFormat, init_logging};
pub use storage::{MemoryBackend, ObjectMeta, StorageBackend};
pub use tenant::TenantId;
