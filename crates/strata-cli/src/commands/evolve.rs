//! Evolve command - add missing optional columns to a table.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use strata_iceberg::types::TableIdent;
use strata_iceberg::{CatalogBootstrapper, SchemaEvolutionManager, SchemaField};

use super::{deadline, read_json};
use crate::{Config, OutputFormat};

/// Arguments for the evolve command.
#[derive(Debug, Args)]
pub struct EvolveArgs {
    /// Tenant identifier.
    #[arg()]
    pub tenant: String,

    /// Table name inside the tenant namespace.
    #[arg()]
    pub table: String,

    /// JSON file with the list of columns to ensure.
    #[arg(long)]
    pub columns: PathBuf,

    /// Abort if the change takes longer than this many seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

/// Execute the evolve command.
///
/// # Errors
///
/// Returns an error if the column file is unreadable, the catalog backend is
/// not configured, or the schema change is rejected.
pub async fn execute(args: EvolveArgs, config: &Config) -> Result<()> {
    let columns: Vec<SchemaField> = read_json(&args.columns)?;

    let handle = CatalogBootstrapper::for_config(&config.catalog)
        .context("Failed to set up the catalog backend")?
        .open(&args.tenant, &config.catalog)?;
    let identifier = TableIdent::new(handle.namespace, args.table.trim());

    let mut manager = SchemaEvolutionManager::new(handle.catalog, identifier.clone());
    if let Some(deadline) = deadline(args.timeout_secs) {
        manager = manager.with_deadline(deadline);
    }
    let added = manager
        .add_columns_if_missing(&columns)
        .await
        .with_context(|| format!("Schema evolution failed for {identifier}"))?;
    log_added(&identifier, &added);

    match config.format {
        OutputFormat::Json => {
            let body = serde_json::json!({
                "table": identifier.to_string(),
                "added_columns": added,
            });
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        OutputFormat::Text => {
            if added.is_empty() {
                println!("{identifier}: schema already up to date");
            } else {
                println!("{identifier}: added {}", added.join(", "));
            }
        }
    }
    Ok(())
}

fn log_added(identifier: &TableIdent, added: &[String]) {
    if added.is_empty() {
        tracing::info!(table = %identifier, "schema already up to date");
    } else {
        tracing::info!(table = %identifier, added = %added.join(","), "schema evolution complete");
    }
}
