//! Shared test utilities for Strata integration tests.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: In-memory storage with operation recording
//! - [`RecordingStorageFactory`]: Storage factory with one traced backend per bucket
//! - [`TestContext`]: In-memory catalog, storage and bootstrapper wired together
//! - Config fixtures
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_iceberg::BootstrapRequest;
//! use strata_test_utils::{TestContext, analytics_config};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let ctx = TestContext::new();
//!     let result = ctx
//!         .bootstrapper()
//!         .bootstrap(&analytics_config(), BootstrapRequest::new(&ctx.tenant))
//!         .await
//!         .unwrap();
//!     assert_eq!(result.created_tables.len(), 3);
//! }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;

pub use fixtures::*;
pub use storage::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("strata=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
