//! Counters for tenant provisioning and schema evolution.
//!
//! Recording goes through the `metrics` facade; installing an exporter is up
//! to the embedding process.

use std::sync::OnceLock;

use metrics::{counter, describe_counter};

use crate::error::IcebergError;

/// Bootstrap calls, labelled by `outcome`.
pub const BOOTSTRAP_TOTAL: &str = "strata_bootstrap_total";

/// Tables created by bootstrap calls.
pub const TABLES_CREATED_TOTAL: &str = "strata_tables_created_total";

/// Prefix markers written to object storage.
pub const PREFIX_MARKERS_TOTAL: &str = "strata_prefix_markers_total";

/// Columns added by schema evolution.
pub const SCHEMA_COLUMNS_ADDED_TOTAL: &str = "strata_schema_columns_added_total";

static METRICS_REGISTERED: OnceLock<()> = OnceLock::new();

/// Registers metric descriptions.
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn register_metrics() {
    METRICS_REGISTERED.get_or_init(|| {
        describe_counter!(BOOTSTRAP_TOTAL, "Total number of tenant bootstrap calls");
        describe_counter!(
            TABLES_CREATED_TOTAL,
            "Total number of tables created during bootstrap"
        );
        describe_counter!(
            PREFIX_MARKERS_TOTAL,
            "Total number of warehouse prefix markers written"
        );
        describe_counter!(
            SCHEMA_COLUMNS_ADDED_TOTAL,
            "Total number of optional columns added by schema evolution"
        );
    });
}

/// Records the outcome of a bootstrap call.
pub fn record_bootstrap(result: Result<(), &IcebergError>) {
    register_metrics();
    counter!(BOOTSTRAP_TOTAL, "outcome" => outcome_label(result)).increment(1);
}

/// Records newly created tables.
pub fn record_tables_created(count: usize) {
    register_metrics();
    counter!(TABLES_CREATED_TOTAL).increment(count as u64);
}

/// Records a written prefix marker.
pub fn record_prefix_marker() {
    register_metrics();
    counter!(PREFIX_MARKERS_TOTAL).increment(1);
}

/// Records columns added to a table schema.
pub fn record_columns_added(count: usize) {
    register_metrics();
    counter!(SCHEMA_COLUMNS_ADDED_TOTAL).increment(count as u64);
}

fn outcome_label(result: Result<(), &IcebergError>) -> &'static str {
    match result {
        Ok(()) => "success",
        Err(IcebergError::InvalidArgument { .. }) => "invalid_argument",
        Err(IcebergError::Storage { .. }) => "storage_error",
        Err(IcebergError::DeadlineExceeded { .. }) => "deadline_exceeded",
        Err(IcebergError::CapabilityUnavailable { .. }) => "capability_unavailable",
        Err(_) => "catalog_error",
    }
}
