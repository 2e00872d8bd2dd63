//! Destroy command - delete every resource of the stack, dependents first
//!
//! Usage: wasm-aks destroy
//!
//! The pushed image is left in place and reported as retained; it goes
//! away with the registry.

use std::fmt::Write as _;

use tracing::info;
use wasm_aks_engine::DestroySummary;
use wasm_aks_topology::TopologyConfig;

use crate::config::Settings;
use crate::Result;

pub async fn run(stack: &str, settings: &Settings) -> Result<()> {
    let providers = settings.providers().await?;
    let summary = super::engine(stack, &providers, &TopologyConfig::default())?.destroy().await?;

    info!(
        stack = %stack,
        deleted = summary.deleted.len(),
        retained = summary.retained.len(),
        absent = summary.absent.len(),
        "Stack destroyed"
    );
    print!("{}", render(&summary));
    Ok(())
}

fn render(summary: &DestroySummary) -> String {
    let mut out = String::new();
    for urn in &summary.deleted {
        let _ = writeln!(out, "  - {}", urn);
    }
    for urn in &summary.retained {
        let _ = writeln!(out, "    {} (retained)", urn);
    }
    for urn in &summary.absent {
        let _ = writeln!(out, "    {} (not found)", urn);
    }
    let _ = writeln!(
        out,
        "Resources: {} deleted, {} retained, {} not found",
        summary.deleted.len(),
        summary.retained.len(),
        summary.absent.len()
    );
    out
}
