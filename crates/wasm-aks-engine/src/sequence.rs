//! Topological grouping of the resource graph
//!
//! Groups are ordered such that every dependency of a node in group N lives
//! in groups 0..N-1. Apply does not run group by group (nodes only wait for
//! their own dependencies); the grouping drives previews and cycle
//! detection.

use std::collections::HashSet;

use tracing::debug;
use wasm_aks_common::{Error, Result};

use crate::{ResourceGraph, Urn};

/// Ordered groups of nodes that have no dependencies on each other
#[derive(Debug, Clone)]
pub struct ApplySequence {
    groups: Vec<Vec<Urn>>,
}

impl ApplySequence {
    /// Compute the sequence with Kahn's algorithm
    ///
    /// 1. Find all nodes whose dependencies are placed
    /// 2. Add them to the current group
    /// 3. Repeat until all nodes are placed; no progress means a cycle
    pub fn from_graph(graph: &ResourceGraph) -> Result<Self> {
        let mut placed: HashSet<&Urn> = HashSet::new();
        let mut groups: Vec<Vec<Urn>> = Vec::new();

        while placed.len() < graph.len() {
            let group: Vec<Urn> = graph
                .urns()
                .iter()
                .filter(|urn| !placed.contains(urn))
                .filter(|urn| graph.dependencies(urn).all(|d| placed.contains(d)))
                .cloned()
                .collect();

            if group.is_empty() {
                let stuck: Vec<String> = graph
                    .urns()
                    .iter()
                    .filter(|urn| !placed.contains(urn))
                    .map(|urn| urn.to_string())
                    .collect();

                return Err(Error::validation(format!(
                    "dependency cycle detected, stuck resources: {:?}",
                    stuck
                )));
            }

            debug!(group = groups.len(), nodes = group.len(), "Computed apply group");

            for urn in &group {
                if let Some(node) = graph.get(urn) {
                    placed.insert(&node.urn);
                }
            }
            groups.push(group);
        }

        Ok(Self { groups })
    }

    /// The ordered groups
    pub fn groups(&self) -> &[Vec<Urn>] {
        &self.groups
    }
}
