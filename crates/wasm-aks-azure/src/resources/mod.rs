//! Azure resources as engine nodes
//!
//! Each resource takes an `*Args` struct of literals and [`Output`]s,
//! registers itself on the [`wasm_aks_engine::Stack`] with the nodes behind
//! those outputs as dependencies, and returns a handle whose outputs resolve
//! once the resource exists.

use std::sync::Arc;

use wasm_aks_engine::Output;

use crate::api::AzureApi;

mod agent_pool;
mod managed_cluster;
mod registry;
mod resource_group;
mod role_assignment;

pub use agent_pool::{AgentPool, AgentPoolArgs, AgentPoolHandle};
pub use managed_cluster::{ManagedCluster, ManagedClusterArgs, ManagedClusterHandle};
pub use registry::{Registry, RegistryArgs, RegistryHandle};
pub use resource_group::{ResourceGroup, ResourceGroupArgs, ResourceGroupHandle};
pub use role_assignment::{role_assignment_name, RoleAssignment, RoleAssignmentArgs, RoleAssignmentHandle};

/// Azure provider settings shared by every Azure resource of a stack
#[derive(Clone)]
pub struct AzureProvider {
    api: Arc<dyn AzureApi>,
    location: String,
}

impl AzureProvider {
    /// Provider using `api`, placing resources in `location` unless told otherwise
    pub fn new(api: Arc<dyn AzureApi>, location: impl Into<String>) -> Self {
        Self {
            api,
            location: location.into(),
        }
    }

    /// The API resources are provisioned through
    pub fn api(&self) -> &Arc<dyn AzureApi> {
        &self.api
    }

    /// Default Azure region
    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn location_or_default(&self, location: Option<Output<String>>) -> Output<String> {
        location.unwrap_or_else(|| Output::known(self.location.clone()))
    }
}
