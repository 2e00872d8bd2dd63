//! Up command - create or update the whole stack
//!
//! Usage: wasm-aks up [--show-secrets] [--image-context <DIR>]
//!
//! Stops at the first failing resource; resources already created stay.
//!
//! The application image is built locally with docker from a directory
//! holding the Spin app and its `Dockerfile`. That directory is not part of
//! this repository: check out the app and pass it with `--image-context`
//! (default `./aks-spin-demo`).

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Args;
use tracing::info;
use wasm_aks_engine::UpSummary;
use wasm_aks_topology::TopologyConfig;

use crate::config::Settings;
use crate::{Error, Result};

/// Apply the stack
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Print secret outputs such as the kubeconfig in plaintext
    #[arg(long)]
    pub show_secrets: bool,

    /// Build context of the Spin app image; must contain a `Dockerfile`
    #[arg(
        long,
        env = "WASM_AKS_IMAGE_CONTEXT",
        default_value = "aks-spin-demo",
        value_name = "DIR"
    )]
    pub image_context: PathBuf,
}

impl UpArgs {
    /// Topology building the image from `image_context`
    pub fn topology(&self) -> Result<TopologyConfig> {
        let dockerfile = self.image_context.join("Dockerfile");
        if !dockerfile.is_file() {
            return Err(Error::config(format!(
                "no Dockerfile in image build context {}; pass --image-context <DIR> \
                 pointing at the Spin app to deploy",
                self.image_context.display()
            )));
        }

        let mut config = TopologyConfig::default();
        config.image.context = self.image_context.clone();
        config.image.dockerfile = dockerfile;
        Ok(config)
    }
}

pub async fn run(stack: &str, settings: &Settings, args: UpArgs) -> Result<()> {
    let topology = args.topology()?;
    let providers = settings.providers().await?;
    let summary = super::engine(stack, &providers, &topology)?.up().await?;

    info!(stack = %stack, resources = summary.applied.len(), "Stack is up");
    print!("{}", render(&summary, args.show_secrets));
    Ok(())
}

/// Human-readable summary; secrets stay redacted unless `show_secrets`
fn render(summary: &UpSummary, show_secrets: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Resources: {} ensured", summary.applied.len());
    let _ = writeln!(out, "Outputs:");
    for (name, value) in &summary.exports {
        if show_secrets {
            let _ = writeln!(out, "  {}: {}", name, value.expose());
        } else {
            let _ = writeln!(out, "  {}: {}", name, value);
        }
    }
    out
}
