//! dim command-line application
//!
//! Installs, updates and verifies open-data files declared in `dim.json`.

mod commands;

use clap::Parser;
use dim_core::DimError;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use commands::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // RUST_LOG overrides the default filter; logs go to stderr so stdout stays parseable
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("dim=info,dim_core=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting dim v{}", dim_core::VERSION);

    let cli = Cli::parse();
    match commands::run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            report(&e);
            ExitCode::FAILURE
        }
    }
}

fn report(error: &anyhow::Error) {
    eprintln!("Error: {}", error);
    if let Some(DimError::BatchFailed { installed, failures }) = error.downcast_ref::<DimError>() {
        for failure in failures {
            eprintln!("  - {}", failure);
        }
        if !installed.is_empty() {
            eprintln!("Installed before failing: {}", installed.join(", "));
        }
    }
}
