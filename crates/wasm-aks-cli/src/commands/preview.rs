//! Preview command - print the plan `up` would follow
//!
//! Usage: wasm-aks preview [--json]
//!
//! Offline: no credentials, no subscription lookup, no provider calls.

use clap::Args;
use wasm_aks_topology::TopologyConfig;

use crate::config::Settings;
use crate::Result;

/// Print the plan
#[derive(Args, Debug)]
pub struct PreviewArgs {
    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(stack: &str, settings: &Settings, args: PreviewArgs) -> Result<()> {
    let providers = settings.offline_providers()?;
    let plan = super::engine(stack, &providers, &TopologyConfig::default())?.preview();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", plan);
    }
    Ok(())
}
