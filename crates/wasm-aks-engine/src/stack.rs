//! Declaration context
//!
//! A [`Stack`] is passed by reference to every node constructor during one
//! declaration pass. It owns the nodes, the dependency graph and the
//! exports; [`crate::Engine::new`] consumes it.

use std::collections::BTreeSet;

use futures::channel::oneshot;
use futures::FutureExt;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;
use wasm_aks_common::{Error, Result, Secret};

use crate::node::{Node, TypedNode};
use crate::{Output, Resource, ResourceGraph, ResourceOptions, Urn};

/// Handle returned by [`Stack::register`]
#[derive(Debug)]
pub struct Registered<S: Clone> {
    /// Identity of the node
    pub urn: Urn,
    /// State published once the node exists
    pub state: Output<S>,
}

/// A value that can be exported at the end of an apply
pub trait ExportValue: Clone + Send + Sync + 'static {
    /// Whether the type itself is sensitive
    const SECRET: bool = false;

    /// Plaintext rendering of the value
    fn export_string(&self) -> String;
}

impl ExportValue for String {
    fn export_string(&self) -> String {
        self.clone()
    }
}

impl ExportValue for Secret<String> {
    const SECRET: bool = true;

    fn export_string(&self) -> String {
        self.expose().clone()
    }
}

pub(crate) struct Export {
    pub(crate) name: String,
    pub(crate) value: Output<String>,
}

#[derive(Default)]
struct StackInner {
    nodes: Vec<Box<dyn Node>>,
    graph: ResourceGraph,
    exports: Vec<Export>,
}

/// One declaration pass
pub struct Stack {
    name: String,
    inner: Mutex<StackInner>,
}

pub(crate) struct StackParts {
    pub(crate) name: String,
    pub(crate) nodes: Vec<Box<dyn Node>>,
    pub(crate) graph: ResourceGraph,
    pub(crate) exports: Vec<Export>,
}

impl Stack {
    /// Start a declaration pass for the named stack
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(StackInner::default()),
        }
    }

    /// Stack name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a node
    ///
    /// `inputs` are the nodes behind the outputs the resource consumes;
    /// `opts.depends_on` adds edges no value flows through. Every dependency
    /// must already be registered.
    pub fn register<R: Resource>(
        &self,
        name: &str,
        resource: R,
        inputs: BTreeSet<Urn>,
        opts: ResourceOptions,
    ) -> Result<Registered<R::State>> {
        let urn = Urn::new(&self.name, R::TYPE_TOKEN, name);

        let mut dependencies = inputs;
        dependencies.extend(opts.depends_on);

        let (tx, rx) = oneshot::channel();
        {
            let mut inner = self.inner.lock();
            inner.graph.insert(urn.clone(), dependencies.clone())?;
            inner
                .nodes
                .push(Box::new(TypedNode::new(urn.clone(), resource, tx)));
        }

        debug!(
            urn = %urn,
            dependencies = dependencies.len(),
            "Registered resource"
        );

        let urn_text = urn.to_string();
        let published = rx
            .map(move |received| match received {
                Ok(result) => result,
                Err(_) => Err(Arc::new(Error::internal_with_context(
                    urn_text,
                    "resource was not processed in this pass",
                ))),
            })
            .boxed()
            .shared();

        Ok(Registered {
            state: Output::from_shared(BTreeSet::from([urn.clone()]), published),
            urn,
        })
    }

    /// Export a value under `name` once apply completes
    ///
    /// The export is secret if the output is marked secret or the value type
    /// is itself sensitive.
    pub fn export<T: ExportValue>(&self, name: &str, output: Output<T>) {
        let secret = output.is_secret() || T::SECRET;
        let mut value = output.apply(|v| Ok(v.export_string()));
        if secret {
            value = value.secret();
        }

        self.inner.lock().exports.push(Export {
            name: name.to_string(),
            value,
        });
    }

    /// Snapshot of the dependency graph declared so far
    pub fn graph(&self) -> ResourceGraph {
        self.inner.lock().graph.clone()
    }

    /// Names of the declared exports and whether each is secret
    pub fn exports(&self) -> Vec<(String, bool)> {
        self.inner
            .lock()
            .exports
            .iter()
            .map(|e| (e.name.clone(), e.value.is_secret()))
            .collect()
    }

    pub(crate) fn into_parts(self) -> StackParts {
        let inner = self.inner.into_inner();
        StackParts {
            name: self.name,
            nodes: inner.nodes,
            graph: inner.graph,
            exports: inner.exports,
        }
    }
}
