//! The contract every declared node implements

use async_trait::async_trait;
use wasm_aks_common::Result;

use crate::Urn;

/// A desired-state node
///
/// Implementations capture their inputs as [`crate::Output`] values and
/// resolve them inside the lifecycle calls, which is what makes a node wait
/// for the nodes it reads from.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Observed state published to consumers once the node exists
    type State: Clone + Send + Sync + 'static;

    /// Type token used in URNs (e.g., "azure:resources:ResourceGroup")
    const TYPE_TOKEN: &'static str;

    /// Literal properties for previews; unknown values render as
    /// [`crate::COMPUTED`]
    fn describe(&self) -> serde_json::Value;

    /// Ensure desired state: create, or update in place
    async fn create_or_update(&self, urn: &Urn) -> Result<Self::State>;

    /// Observe current state without changing it; `None` if absent
    async fn read(&self, urn: &Urn) -> Result<Option<Self::State>>;

    /// Delete the node, or report that destroy leaves it in place
    async fn delete(&self, urn: &Urn, state: &Self::State) -> Result<Deletion>;
}

/// What `delete` did with a node that existed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deletion {
    /// Removed from the provider
    Deleted,
    /// Still exists after destroy
    Retained,
}

/// Per-registration options
#[derive(Debug, Clone, Default)]
pub struct ResourceOptions {
    /// Nodes that must be created first even though no value flows from them
    pub depends_on: Vec<Urn>,
}

impl ResourceOptions {
    /// Add explicit dependencies
    pub fn depends_on<'a>(mut self, urns: impl IntoIterator<Item = &'a Urn>) -> Self {
        self.depends_on.extend(urns.into_iter().cloned());
        self
    }
}
