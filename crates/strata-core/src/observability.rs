//! Observability infrastructure for Strata.
//!
//! Structured logging with consistent spans. This module provides
//! initialization helpers and span constructors shared by every component.

use std::sync::Once;
use tracing::Span;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

static INIT: Once = Once::new();

/// Log output format.
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON structured logs (for production).
    Json,
    /// Pretty-printed logs (for development).
    #[default]
    Pretty,
}

/// Initializes the logging subsystem.
///
/// Call once at application startup. Safe to call multiple times;
/// subsequent calls are no-ops.
///
/// # Environment Variables
///
/// - `RUST_LOG`: Controls log levels (e.g., `info`, `strata_iceberg=debug`)
///
/// # Example
///
/// ```rust
/// use strata_core::observability::{init_logging, LogFormat};
///
/// init_logging(LogFormat::Pretty);
/// ```
pub fn init_logging(format: LogFormat) {
    INIT.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        match format {
            LogFormat::Json => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().json())
                    .try_init();
            }
            LogFormat::Pretty => {
                let _ = tracing_subscriber::registry()
                    .with(env_filter)
                    .with(fmt::layer().pretty())
                    .try_init();
            }
        }
    });
}

/// Creates a span for tenant provisioning operations with standard fields.
///
/// # Example
///
/// ```rust
/// use strata_core::observability::bootstrap_span;
///
/// let span = bootstrap_span("bootstrap", "acme");
/// let _guard = span.enter();
/// ```
#[must_use]
pub fn bootstrap_span(operation: &str, tenant: &str) -> Span {
    tracing::info_span!("bootstrap", op = operation, tenant = tenant)
}

/// Creates a span for schema evolution against a single table.
#[must_use]
pub fn evolution_span(table: &str) -> Span {
    tracing::info_span!("schema_evolution", table = table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_succeeds() {
        // Should not panic (uses Once internally)
        init_logging(LogFormat::Pretty);
        init_logging(LogFormat::Json); // Second call should be no-op
    }

    #[test]
    fn test_span_helpers_create_spans() {
        let span = bootstrap_span("test_operation", "acme");
        let _guard = span.enter();
        tracing::info!("test message in span");

        let span = evolution_span("clients.acme.events");
        let _guard = span.enter();
        tracing::debug!("evolution message");
    }
}
