//! Strata CLI - Command-line interface for tenant catalogs.
//!
//! The main entry point for the `strata` CLI binary.

use anyhow::Result;
use clap::Parser;
use strata_core::observability::{LogFormat, init_logging};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use strata_cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.log_json {
        init_logging(LogFormat::Json);
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_target(false))
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .init();
    }

    let config = cli.config()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        match cli.command {
            Commands::Paths(args) => strata_cli::commands::paths::execute(&args, &config),
            Commands::Bootstrap(args) => {
                strata_cli::commands::bootstrap::execute(args, &config).await
            }
            Commands::Evolve(args) => strata_cli::commands::evolve::execute(args, &config).await,
        }
    })
}
