//! Dependency graph of declared nodes
//!
//! Every node lists the nodes it depends on. A dependency must already be
//! registered when its dependent is, so a graph built through
//! [`crate::Stack`] is acyclic by construction; [`crate::ApplySequence`]
//! still checks.

use std::collections::{BTreeMap, BTreeSet};

use wasm_aks_common::{Error, Result};

use crate::Urn;

/// A node in the resource graph
#[derive(Debug, Clone)]
pub(crate) struct GraphNode {
    pub(crate) urn: Urn,
    /// Explicit and implicit dependencies
    pub(crate) dependencies: BTreeSet<Urn>,
}

/// The graph of all nodes declared on a stack
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    /// All nodes indexed by URN
    nodes: BTreeMap<Urn, GraphNode>,
    /// Registration order
    order: Vec<Urn>,
}

impl ResourceGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node whose dependencies are all already present
    pub fn insert(&mut self, urn: Urn, dependencies: BTreeSet<Urn>) -> Result<()> {
        if self.nodes.contains_key(&urn) {
            return Err(Error::validation_for(
                urn.to_string(),
                "a resource with this URN is already declared",
            ));
        }

        if let Some(missing) = dependencies.iter().find(|d| !self.nodes.contains_key(*d)) {
            return Err(Error::validation_for(
                urn.to_string(),
                format!("depends on undeclared resource {}", missing),
            ));
        }

        self.insert_unchecked(urn, dependencies);
        Ok(())
    }

    pub(crate) fn insert_unchecked(&mut self, urn: Urn, dependencies: BTreeSet<Urn>) {
        self.order.push(urn.clone());
        self.nodes.insert(urn.clone(), GraphNode { urn, dependencies });
    }

    pub(crate) fn get(&self, urn: &Urn) -> Option<&GraphNode> {
        self.nodes.get(urn)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All URNs in registration order
    pub fn urns(&self) -> &[Urn] {
        &self.order
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, urn: &Urn) -> impl Iterator<Item = &Urn> {
        self.nodes
            .get(urn)
            .into_iter()
            .flat_map(|n| n.dependencies.iter())
    }

    /// Nodes that directly depend on `urn`
    pub fn dependents<'a>(&'a self, urn: &'a Urn) -> impl Iterator<Item = &'a Urn> + 'a {
        self.order.iter().filter(move |candidate| {
            self.nodes
                .get(*candidate)
                .is_some_and(|n| n.dependencies.contains(urn))
        })
    }
}
