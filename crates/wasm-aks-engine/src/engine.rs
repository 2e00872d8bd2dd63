//! Preview, apply and destroy passes
//!
//! Nodes are driven concurrently on the calling task. A node starts once
//! every node it depends on has finished, so independent branches overlap
//! and only declared edges serialize work. The first error aborts the pass:
//! in-flight nodes are dropped and nothing is rolled back.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Instant;

use futures::channel::oneshot;
use futures::future::{try_join_all, FutureExt, Shared};
use serde::Serialize;
use tracing::{info, info_span, Instrument};
use wasm_aks_common::secret::REDACTED;
use wasm_aks_common::{Error, Result};

use crate::node::{Node, Removal};
use crate::stack::{Export, StackParts};
use crate::{ApplySequence, ResourceGraph, Stack, Urn};

type Done = Shared<oneshot::Receiver<()>>;

/// One entry of a preview
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    /// Node identity
    pub urn: String,
    /// Sequence group the node belongs to
    pub group: usize,
    /// Nodes that must exist first
    pub dependencies: Vec<String>,
    /// Literal properties; computed values are shown as placeholders
    pub properties: serde_json::Value,
}

/// Offline plan of what `up` would ensure
#[derive(Debug, Clone, Serialize)]
pub struct Plan {
    /// Stack name
    pub stack: String,
    /// Steps in sequence order
    pub steps: Vec<PlanStep>,
    /// Names of the exports, secret ones flagged
    pub exports: Vec<(String, bool)>,
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Previewing stack {}:", self.stack)?;
        for step in &self.steps {
            writeln!(f, "  + [{}] {}", step.group, step.urn)?;
            for dep in &step.dependencies {
                writeln!(f, "        after {}", dep)?;
            }
        }
        writeln!(f, "Outputs:")?;
        for (name, secret) in &self.exports {
            if *secret {
                writeln!(f, "  {}: {}", name, REDACTED)?;
            } else {
                writeln!(f, "  {}: {}", name, crate::COMPUTED)?;
            }
        }
        Ok(())
    }
}

/// An exported value
#[derive(Clone, PartialEq, Eq)]
pub struct ExportedValue {
    value: String,
    secret: bool,
}

impl ExportedValue {
    /// A resolved export
    pub fn new(value: impl Into<String>, secret: bool) -> Self {
        Self {
            value: value.into(),
            secret,
        }
    }

    /// Whether the value is sensitive
    pub fn is_secret(&self) -> bool {
        self.secret
    }

    /// Plaintext value
    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Display for ExportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secret {
            f.write_str(REDACTED)
        } else {
            f.write_str(&self.value)
        }
    }
}

impl fmt::Debug for ExportedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ExportedValue({})", self)
    }
}

/// Result of a successful `up`
#[derive(Debug)]
pub struct UpSummary {
    /// Nodes ensured, in registration order
    pub applied: Vec<Urn>,
    /// Exports by name
    pub exports: BTreeMap<String, ExportedValue>,
}

/// Result of a successful `destroy`
#[derive(Debug, Default)]
pub struct DestroySummary {
    /// Nodes deleted, in registration order
    pub deleted: Vec<Urn>,
    /// Nodes that exist and are left in place
    pub retained: Vec<Urn>,
    /// Nodes that did not exist
    pub absent: Vec<Urn>,
}

/// Runs one pass over a declared stack
pub struct Engine {
    stack: String,
    nodes: Vec<Box<dyn Node>>,
    graph: ResourceGraph,
    exports: Vec<Export>,
    sequence: ApplySequence,
}

impl Engine {
    /// Take ownership of a fully declared stack
    pub fn new(stack: Stack) -> Result<Self> {
        let StackParts {
            name,
            nodes,
            graph,
            exports,
        } = stack.into_parts();
        let sequence = ApplySequence::from_graph(&graph)?;

        Ok(Self {
            stack: name,
            nodes,
            graph,
            exports,
            sequence,
        })
    }

    /// Describe what `up` would do without calling any provider
    pub fn preview(&self) -> Plan {
        let described: HashMap<&Urn, serde_json::Value> = self
            .nodes
            .iter()
            .map(|n| (n.urn(), n.describe()))
            .collect();

        let steps = self
            .sequence
            .groups()
            .iter()
            .enumerate()
            .flat_map(|(group, urns)| urns.iter().map(move |urn| (group, urn)))
            .map(|(group, urn)| PlanStep {
                urn: urn.to_string(),
                group,
                dependencies: self.graph.dependencies(urn).map(Urn::to_string).collect(),
                properties: described
                    .get(urn)
                    .cloned()
                    .unwrap_or(serde_json::Value::Null),
            })
            .collect();

        Plan {
            stack: self.stack.clone(),
            steps,
            exports: self
                .exports
                .iter()
                .map(|e| (e.name.clone(), e.value.is_secret()))
                .collect(),
        }
    }

    /// Ensure every node, then resolve the exports
    pub async fn up(mut self) -> Result<UpSummary> {
        let span = info_span!("up", stack = %self.stack);
        async move {
            let started = Instant::now();
            info!(resources = self.graph.len(), "Applying stack");

            let applied = run_forward(&mut self.nodes, &self.graph, Pass::Apply)
                .await?
                .into_iter()
                .map(|(urn, _)| urn)
                .collect();

            let mut exports = BTreeMap::new();
            for export in &self.exports {
                let value = export.value.resolve().await?;
                exports.insert(
                    export.name.clone(),
                    ExportedValue {
                        value,
                        secret: export.value.is_secret(),
                    },
                );
            }

            info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stack applied"
            );
            Ok(UpSummary { applied, exports })
        }
        .instrument(span)
        .await
    }

    /// Delete every node that exists, dependents first
    pub async fn destroy(mut self) -> Result<DestroySummary> {
        let span = info_span!("destroy", stack = %self.stack);
        async move {
            let started = Instant::now();
            info!(resources = self.graph.len(), "Refreshing stack before destroy");

            let present: HashMap<Urn, bool> =
                run_forward(&mut self.nodes, &self.graph, Pass::Refresh)
                    .await?
                    .into_iter()
                    .collect();

            info!(
                present = present.values().filter(|p| **p).count(),
                "Deleting resources"
            );

            let deleted = run_reverse(&mut self.nodes, &self.graph).await?;

            let mut summary = DestroySummary::default();
            for (urn, removal) in deleted {
                match removal {
                    Removal::Deleted => summary.deleted.push(urn),
                    Removal::Retained => summary.retained.push(urn),
                    Removal::Absent => summary.absent.push(urn),
                }
            }

            info!(
                deleted = summary.deleted.len(),
                retained = summary.retained.len(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Stack destroyed"
            );
            Ok(summary)
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Clone, Copy)]
enum Pass {
    Apply,
    Refresh,
}

/// Completion channels, one per node
fn completion_channels(
    graph: &ResourceGraph,
) -> (HashMap<Urn, oneshot::Sender<()>>, HashMap<Urn, Done>) {
    let mut senders = HashMap::new();
    let mut waiters = HashMap::new();
    for urn in graph.urns() {
        let (tx, rx) = oneshot::channel();
        senders.insert(urn.clone(), tx);
        waiters.insert(urn.clone(), rx.shared());
    }
    (senders, waiters)
}

async fn wait_for(urn: &Urn, prerequisites: Vec<Done>) -> Result<()> {
    for done in prerequisites {
        done.await.map_err(|_| {
            Error::internal_with_context(urn.to_string(), "a prerequisite did not complete")
        })?;
    }
    Ok(())
}

/// Run `pass` on every node once all of its dependencies have finished
async fn run_forward(
    nodes: &mut [Box<dyn Node>],
    graph: &ResourceGraph,
    pass: Pass,
) -> Result<Vec<(Urn, bool)>> {
    let (mut senders, waiters) = completion_channels(graph);

    let tasks = nodes.iter_mut().map(|node| {
        let urn = node.urn().clone();
        let prerequisites: Vec<Done> = graph
            .dependencies(&urn)
            .filter_map(|d| waiters.get(d).cloned())
            .collect();
        let done = senders.remove(&urn);

        async move {
            wait_for(&urn, prerequisites).await?;

            let started = Instant::now();
            info!(urn = %urn, ?pass, "Processing resource");
            let outcome = match pass {
                Pass::Apply => node.apply().await.map(|_| true)?,
                Pass::Refresh => node.refresh().await?,
            };
            info!(
                urn = %urn,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Resource done"
            );

            if let Some(done) = done {
                let _ = done.send(());
            }
            Ok::<_, Error>((urn, outcome))
        }
    });

    try_join_all(tasks).await
}

/// Delete every node once all of its dependents have been deleted
async fn run_reverse(
    nodes: &mut [Box<dyn Node>],
    graph: &ResourceGraph,
) -> Result<Vec<(Urn, Removal)>> {
    let (mut senders, waiters) = completion_channels(graph);

    let tasks = nodes.iter_mut().map(|node| {
        let urn = node.urn().clone();
        let prerequisites: Vec<Done> = graph
            .dependents(&urn)
            .filter_map(|d| waiters.get(d).cloned())
            .collect();
        let done = senders.remove(&urn);

        async move {
            wait_for(&urn, prerequisites).await?;

            let removal = node.delete().await?;
            match removal {
                Removal::Deleted => info!(urn = %urn, "Deleted resource"),
                Removal::Retained => info!(urn = %urn, "Retained resource"),
                Removal::Absent => {}
            }

            if let Some(done) = done {
                let _ = done.send(());
            }
            Ok::<_, Error>((urn, removal))
        }
    });

    try_join_all(tasks).await
}
