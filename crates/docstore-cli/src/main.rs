//! Helios document store CLI.
//!
//! Writes, reads, searches and batches FHIR resources against a versioned
//! document store. Results are printed to stdout as JSON; logs go to stderr.

mod commands;
mod config;

use clap::Parser;
use tracing::debug;

use crate::config::CliConfig;

/// Initializes logging. `RUST_LOG` overrides the configured level.
fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("helios_docstore={level},docstore={level}"))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    debug!(command = ?config.command, database = %config.database, "Running command");

    let output = commands::run(&config).await?;
    println!("{}", serde_json::to_string_pretty(&output.body)?);

    if !output.success {
        std::process::exit(1);
    }

    Ok(())
}
