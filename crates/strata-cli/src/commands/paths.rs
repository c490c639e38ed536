//! Paths command - show derived locations without touching storage.

use std::collections::BTreeMap;

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use strata_iceberg::{CatalogConfig, IcebergResult, default_tables};

use crate::{Config, OutputFormat};

/// Arguments for the paths command.
#[derive(Debug, Args)]
pub struct PathsArgs {
    /// Tenant identifier.
    #[arg()]
    pub tenant: String,

    /// Table names to resolve (defaults to the built-in tables).
    #[arg(long = "table")]
    pub tables: Vec<String>,
}

/// Everything derived for one tenant.
#[derive(Debug, Serialize)]
pub struct TenantPaths {
    /// Tenant id (trimmed).
    pub tenant: String,
    /// Tenant namespace.
    pub namespace: Vec<String>,
    /// Warehouse prefix inside the bucket.
    pub warehouse_path: String,
    /// Warehouse URI.
    pub warehouse_uri: String,
    /// Metadata URI, when a metadata bucket is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata_uri: Option<String>,
    /// Table locations by table name.
    pub tables: BTreeMap<String, String>,
}

impl TenantPaths {
    /// Resolves every path for `tenant`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a blank tenant id.
    pub fn resolve(config: &CatalogConfig, tenant: &str, tables: &[String]) -> IcebergResult<Self> {
        let names: Vec<&str> = if tables.is_empty() {
            default_tables().iter().map(|spec| spec.name.as_str()).collect()
        } else {
            tables.iter().map(String::as_str).collect()
        };
        let tables: BTreeMap<String, String> = names
            .into_iter()
            .map(|name| Ok((name.to_string(), config.table_location(tenant, name)?)))
            .collect::<IcebergResult<_>>()?;
        Ok(Self {
            tenant: tenant.trim().to_string(),
            namespace: config.namespace(tenant)?,
            warehouse_path: config.warehouse_path(tenant)?,
            warehouse_uri: config.warehouse_uri(tenant)?,
            metadata_uri: config.metadata_uri(tenant)?,
            tables,
        })
    }
}

/// Execute the paths command.
///
/// # Errors
///
/// Returns an error if the tenant id is blank.
pub fn execute(args: &PathsArgs, config: &Config) -> Result<()> {
    let paths = TenantPaths::resolve(&config.catalog, &args.tenant, &args.tables)?;

    match config.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&paths)?);
        }
        OutputFormat::Text => {
            println!("Tenant:     {}", paths.tenant);
            println!("Namespace:  {}", paths.namespace.join("."));
            println!("Warehouse:  {}", paths.warehouse_uri);
            if let Some(uri) = &paths.metadata_uri {
                println!("Metadata:   {uri}");
            }
            println!();
            println!("Tables:");
            for (name, location) in &paths.tables {
                println!("  {name:<12} {location}");
            }
        }
    }

    Ok(())
}
