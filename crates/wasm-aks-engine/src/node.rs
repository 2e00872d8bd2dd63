//! Type-erased graph nodes
//!
//! A [`TypedNode`] owns one resource and the sending half of the channel its
//! [`crate::Output`] consumers wait on. Whatever the lifecycle call yields is
//! published exactly once.

use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;
use tracing::debug;
use wasm_aks_common::{Error, Result};

use crate::output::SharedResult;
use crate::{Deletion, Resource, Urn};

#[async_trait]
pub(crate) trait Node: Send {
    fn urn(&self) -> &Urn;

    fn describe(&self) -> serde_json::Value;

    /// Ensure desired state and publish the resulting state
    async fn apply(&mut self) -> Result<()>;

    /// Observe current state and publish it; `Ok(false)` if absent
    async fn refresh(&mut self) -> Result<bool>;

    /// Delete if refresh found the node
    async fn delete(&mut self) -> Result<Removal>;
}

/// Outcome of a destroy pass for one node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    Deleted,
    Retained,
    Absent,
}

pub(crate) struct TypedNode<R: Resource> {
    urn: Urn,
    resource: R,
    publish: Option<oneshot::Sender<SharedResult<R::State>>>,
    state: Option<R::State>,
}

impl<R: Resource> TypedNode<R> {
    pub(crate) fn new(
        urn: Urn,
        resource: R,
        publish: oneshot::Sender<SharedResult<R::State>>,
    ) -> Self {
        Self {
            urn,
            resource,
            publish: Some(publish),
            state: None,
        }
    }

    fn publish(&mut self, result: SharedResult<R::State>) {
        if let Some(tx) = self.publish.take() {
            // Nobody listening is fine: not every state is consumed.
            let _ = tx.send(result);
        }
    }

    fn publish_absent(&mut self) {
        let absent = Arc::new(Error::Absent {
            urn: self.urn.to_string(),
        });
        self.publish(Err(absent));
    }

    fn fail(&mut self, err: Error) -> Error {
        let shared = Arc::new(err);
        self.publish(Err(shared.clone()));
        Error::resource(self.urn.to_string(), shared)
    }
}

#[async_trait]
impl<R: Resource> Node for TypedNode<R> {
    fn urn(&self) -> &Urn {
        &self.urn
    }

    fn describe(&self) -> serde_json::Value {
        self.resource.describe()
    }

    async fn apply(&mut self) -> Result<()> {
        match self.resource.create_or_update(&self.urn).await {
            Ok(state) => {
                self.publish(Ok(state.clone()));
                self.state = Some(state);
                Ok(())
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn refresh(&mut self) -> Result<bool> {
        match self.resource.read(&self.urn).await {
            Ok(Some(state)) => {
                self.publish(Ok(state.clone()));
                self.state = Some(state);
                Ok(true)
            }
            Ok(None) => {
                self.publish_absent();
                Ok(false)
            }
            Err(e) if e.is_absent() => {
                debug!(urn = %self.urn, error = %e, "Upstream absent, treating node as absent");
                self.publish_absent();
                Ok(false)
            }
            Err(e) => Err(self.fail(e)),
        }
    }

    async fn delete(&mut self) -> Result<Removal> {
        let Some(state) = self.state.take() else {
            return Ok(Removal::Absent);
        };

        match self.resource.delete(&self.urn, &state).await {
            Ok(Deletion::Deleted) => Ok(Removal::Deleted),
            Ok(Deletion::Retained) => Ok(Removal::Retained),
            Err(e) if e.is_absent() => Ok(Removal::Absent),
            Err(e) => Err(Error::resource(self.urn.to_string(), Arc::new(e))),
        }
    }
}
