//! Bootstrap command - provision a tenant catalog.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use strata_iceberg::{BootstrapRequest, BootstrapResult, CatalogBootstrapper, TableSpec};

use super::{deadline, read_json};
use crate::{Config, OutputFormat};

/// Arguments for the bootstrap command.
#[derive(Debug, Args)]
pub struct BootstrapArgs {
    /// Tenant identifier.
    #[arg()]
    pub tenant: String,

    /// JSON file with a list of table definitions (defaults to the built-in tables).
    #[arg(long)]
    pub tables: Option<PathBuf>,

    /// Extra namespace property as `key=value`. Repeatable.
    #[arg(long = "property", value_parser = parse_property)]
    pub properties: Vec<(String, String)>,

    /// Abort if the whole call takes longer than this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Execute the bootstrap command.
///
/// # Errors
///
/// Returns an error if the table file is unreadable, the catalog backend is
/// not configured, or any provisioning step fails.
pub async fn execute(args: BootstrapArgs, config: &Config) -> Result<()> {
    let bootstrapper = CatalogBootstrapper::for_config(&config.catalog)
        .context("Failed to set up the catalog backend")?;

    let request = build_request(args)?;
    let tenant = request.tenant().trim().to_string();
    let result = bootstrapper
        .bootstrap(&config.catalog, request)
        .await
        .with_context(|| format!("Bootstrap failed for tenant '{tenant}'"))?;

    log_result(&result);
    print_result(&result, config)
}

fn log_result(result: &BootstrapResult) {
    tracing::info!(
        tenant = %result.tenant,
        warehouse = %result.warehouse_uri,
        created_namespace = result.created_namespace,
        tables = result.created_tables.len(),
        markers = result.prefix_markers.len(),
        "bootstrap complete"
    );
}

fn build_request(args: BootstrapArgs) -> Result<BootstrapRequest> {
    let mut request = BootstrapRequest::new(args.tenant).with_namespace_properties(args.properties);
    if let Some(path) = &args.tables {
        let tables: Vec<TableSpec> = read_json(path)?;
        request = request.with_tables(tables);
    }
    if let Some(deadline) = deadline(args.timeout_secs) {
        request = request.with_deadline(deadline);
    }
    Ok(request)
}

fn print_result(result: &BootstrapResult, config: &Config) -> Result<()> {
    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Text => {
            println!("Tenant:    {}", result.tenant);
            println!("Warehouse: {}", result.warehouse_uri);
            let verb = if result.created_namespace {
                "created"
            } else {
                "exists"
            };
            println!("Namespace: {} ({verb})", result.namespace.join("."));
            for marker in &result.prefix_markers {
                println!("Marker:    {}/{}", marker.bucket, marker.path);
            }
            if result.created_tables.is_empty() {
                println!("No tables created; catalog already up to date");
            } else {
                println!("Created tables:");
                for table in &result.created_tables {
                    println!("  {table}");
                }
            }
        }
    }
    Ok(())
}

fn parse_property(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty property key in '{raw}'"));
    }
    Ok((key.to_string(), value.trim().to_string()))
}
