//! # strata-cli
//!
//! Command-line interface for provisioning tenant catalogs.
//!
//! ## Commands
//!
//! - `strata paths` - Show the namespace and locations derived for a tenant
//! - `strata bootstrap` - Provision storage, namespace and tables for a tenant
//! - `strata evolve` - Add missing optional columns to a tenant table
//!
//! ## Configuration
//!
//! The catalog config is read from the JSON file named by `--config` or
//! `STRATA_CONFIG`. Without one, it is built from `STRATA_*` environment
//! variables (see `CatalogConfig::from_env`).

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
// CLI uses print! macros intentionally
#![allow(clippy::print_stdout)]
#![allow(clippy::print_stderr)]

pub mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use strata_iceberg::CatalogConfig;

/// Strata CLI - tenant catalog provisioning.
#[derive(Debug, Parser)]
#[command(name = "strata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON catalog config.
    #[arg(long, env = "STRATA_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(long, default_value = "text", global = true)]
    pub format: OutputFormat,

    /// Emit JSON logs instead of the compact text format.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolves the catalog config from `--config` or the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be loaded or the
    /// environment does not describe a valid config.
    pub fn config(&self) -> Result<Config> {
        let catalog = match &self.config {
            Some(path) => CatalogConfig::from_json_file(path)
                .with_context(|| format!("Failed to load catalog config {}", path.display()))?,
            None => CatalogConfig::from_env()
                .context("No --config given and STRATA_* environment is incomplete")?,
        };
        Ok(Config {
            catalog,
            format: self.format.clone(),
        })
    }
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show the namespace and locations derived for a tenant.
    Paths(commands::paths::PathsArgs),
    /// Provision storage, namespace and tables for a tenant.
    Bootstrap(commands::bootstrap::BootstrapArgs),
    /// Add missing optional columns to a tenant table.
    Evolve(commands::evolve::EvolveArgs),
}

/// Output format.
#[derive(Debug, Clone, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output.
    Json,
}

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Catalog config.
    pub catalog: CatalogConfig,
    /// Output format.
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_config_from_file() {
        let path = std::env::temp_dir().join(format!("strata-cli-{}.json", uuid::Uuid::new_v4()));
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"name":"clients","provider":"gcs","warehouse_bucket":"analytics","warehouse_prefix":"warehouse"}}"#
        )
        .unwrap();

        let cli = Cli::parse_from([
            "strata",
            "--config",
            path.to_str().unwrap(),
            "--format",
            "json",
            "paths",
            "acme",
        ]);
        let config = cli.config().unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(config.catalog.warehouse_bucket(), "analytics");
        assert!(matches!(config.format, OutputFormat::Json));
        assert!(matches!(cli.command, Commands::Paths(ref args) if args.tenant == "acme"));
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let cli = Cli::parse_from(["strata", "--config", "/nonexistent/strata.json", "paths", "acme"]);
        let err = cli.config().unwrap_err();
        assert!(err.to_string().contains("/nonexistent/strata.json"));
    }
}
