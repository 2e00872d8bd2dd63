//! wasm-aks CLI
//!
//! Provisions an AKS cluster with a WASI node pool and runs the Spin demo on it.

use std::process::ExitCode;

use clap::Parser;
use tracing::error;

use wasm_aks_cli::Cli;
use wasm_aks_common::telemetry::{init_telemetry, shutdown_telemetry};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = init_telemetry(cli.telemetry_config()) {
        eprintln!("error: {}", e);
        return ExitCode::FAILURE;
    }

    let result = cli.run().await;
    shutdown_telemetry();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}
