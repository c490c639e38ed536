//! # strata-iceberg
//!
//! Per-tenant Iceberg catalog provisioning and schema evolution.
//!
//! Given a tenant id and a [`CatalogConfig`], this crate:
//!
//! - **Resolves** the tenant namespace, warehouse URI and table locations
//!   ([`config`]), without any I/O
//! - **Prepares storage** by writing a marker under each warehouse prefix
//!   ([`warehouse`])
//! - **Provisions** the namespace and declared tables in the catalog
//!   ([`bootstrap`]), idempotently and resumably
//! - **Evolves** existing tables by adding optional columns ([`evolution`])
//!
//! Catalog backends sit behind the [`Catalog`] and [`Table`] traits, with an
//! in-memory implementation ([`memory`]) and an Iceberg REST client
//! ([`rest`]).
//!
//! ## Example
//!
//! ```rust
//! use strata_iceberg::prelude::*;
//!
//! let config = CatalogConfig::new("clients", StorageProvider::Gcs, "analytics")
//!     .with_warehouse_prefix("warehouse");
//! assert_eq!(
//!     config.table_location("acme", "events").unwrap(),
//!     "gs://analytics/warehouse/clients/acme/events"
//! );
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod bootstrap;
pub mod catalog;
pub mod config;
mod deadline;
pub mod error;
pub mod evolution;
pub mod memory;
pub mod metrics;
pub mod rest;
pub mod table_spec;
pub mod types;
pub mod warehouse;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::bootstrap::{
        BootstrapRequest, BootstrapResult, CatalogBootstrapper, ClientCatalogHandle,
    };
    pub use crate::catalog::{Catalog, CatalogLoader, DefaultCatalogLoader, Table, TableCreation};
    pub use crate::config::{CatalogConfig, StorageProvider};
    pub use crate::error::{IcebergError, IcebergResult};
    pub use crate::evolution::SchemaEvolutionManager;
    pub use crate::table_spec::{SchemaField, TableSpec, default_tables};
    pub use crate::warehouse::{
        DefaultStorageFactory, PrefixMarker, StorageFactory, WarehouseStorageManager,
    };
}

pub use bootstrap::{BootstrapRequest, BootstrapResult, CatalogBootstrapper, ClientCatalogHandle};
pub use catalog::{Catalog, CatalogLoader, DefaultCatalogLoader, SchemaUpdate, Table, TableCreation};
pub use config::{CatalogConfig, StorageProvider};
pub use error::{IcebergError, IcebergResult};
pub use evolution::SchemaEvolutionManager;
pub use memory::MemoryCatalog;
pub use rest::{RestCatalog, RestCatalogConfig};
pub use table_spec::{SchemaField, TableSpec, default_tables};
pub use warehouse::{
    DefaultStorageFactory, MARKER_FILENAME, PrefixMarker, StorageFactory, WarehouseStorageManager,
};
