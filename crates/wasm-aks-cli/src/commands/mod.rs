//! CLI commands

use wasm_aks_engine::{Engine, Stack};
use wasm_aks_topology::{declare, Providers, TopologyConfig};

use crate::Result;

pub mod destroy;
pub mod preview;
pub mod up;

/// Declare the topology on a fresh stack and hand it to an engine
fn engine(stack: &str, providers: &Providers, config: &TopologyConfig) -> Result<Engine> {
    let stack = Stack::new(stack);
    declare(&stack, providers, config)?;
    Ok(Engine::new(stack)?)
}
