//! wasm-aks CLI library

pub mod commands;
pub mod config;
pub mod error;

pub use error::{Error, Result};

use clap::{Parser, Subcommand};

use wasm_aks_common::telemetry::{LogFormat, TelemetryConfig};

/// wasm-aks - AKS with a WASI node pool, running the Spin demo
#[derive(Parser, Debug)]
#[command(name = "wasm-aks")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Stack the command operates on
    #[arg(long, env = "WASM_AKS_STACK", default_value = "dev", global = true)]
    pub stack: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "WASM_AKS_LOG_JSON", global = true)]
    pub log_json: bool,

    #[command(flatten)]
    pub settings: config::Settings,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show what `up` would ensure, without calling any provider
    Preview(commands::preview::PreviewArgs),
    /// Create or update every resource of the stack
    ///
    /// Builds the app image with the local docker CLI from `--image-context`
    /// (default `./aks-spin-demo`), which must hold the Spin app and its
    /// `Dockerfile`.
    Up(commands::up::UpArgs),
    /// Delete every resource of the stack that exists
    Destroy,
}

impl Cli {
    /// Telemetry settings for this invocation
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            stack: Some(self.stack.clone()),
            format: if self.log_json {
                LogFormat::Json
            } else {
                LogFormat::Pretty
            },
            ..Default::default()
        }
    }

    /// Run the CLI command
    pub async fn run(self) -> Result<()> {
        match self.command {
            Commands::Preview(args) => commands::preview::run(&self.stack, &self.settings, args),
            Commands::Up(args) => commands::up::run(&self.stack, &self.settings, args).await,
            Commands::Destroy => commands::destroy::run(&self.stack, &self.settings).await,
        }
    }
}
