//! The Azure operations wasm-aks needs
//!
//! Resources and lookups talk to Azure only through [`AzureApi`], which keeps
//! them testable with mocks. [`crate::ArmAzure`] is the ARM-backed
//! implementation.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use wasm_aks_common::Result;

use crate::models::{
    AgentPoolSpec, AgentPoolState, ClusterCredential, ManagedClusterSpec, ManagedClusterState,
    RegistryCredentialsResult, RegistrySpec, RegistryState, ResourceGroupSpec, ResourceGroupState,
    RoleAssignmentSpec, RoleAssignmentState, RoleDefinition,
};

/// Idempotent ensure/get/delete for every Azure resource type, plus the
/// read-only credential and role lookups
///
/// `ensure_*` creates or updates in place and returns once the resource has
/// finished provisioning. `get_*` returns `None` for a missing resource.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait AzureApi: Send + Sync {
    /// Create or update a resource group
    async fn ensure_resource_group(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroupState>;

    /// Read a resource group
    async fn get_resource_group(&self, name: &str) -> Result<Option<ResourceGroupState>>;

    /// Delete a resource group and everything in it
    async fn delete_resource_group(&self, name: &str) -> Result<()>;

    /// Create or update a managed cluster
    async fn ensure_managed_cluster(
        &self,
        spec: &ManagedClusterSpec,
    ) -> Result<ManagedClusterState>;

    /// Read a managed cluster
    async fn get_managed_cluster(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<ManagedClusterState>>;

    /// Delete a managed cluster
    async fn delete_managed_cluster(&self, resource_group: &str, name: &str) -> Result<()>;

    /// Create or update an agent pool on an existing cluster
    async fn ensure_agent_pool(&self, spec: &AgentPoolSpec) -> Result<AgentPoolState>;

    /// Read an agent pool
    async fn get_agent_pool(
        &self,
        resource_group: &str,
        cluster: &str,
        name: &str,
    ) -> Result<Option<AgentPoolState>>;

    /// Delete an agent pool
    async fn delete_agent_pool(&self, resource_group: &str, cluster: &str, name: &str)
        -> Result<()>;

    /// Create or update a container registry
    async fn ensure_registry(&self, spec: &RegistrySpec) -> Result<RegistryState>;

    /// Read a container registry
    async fn get_registry(&self, resource_group: &str, name: &str)
        -> Result<Option<RegistryState>>;

    /// Delete a container registry
    async fn delete_registry(&self, resource_group: &str, name: &str) -> Result<()>;

    /// Create a role assignment (assignments are immutable once created)
    async fn ensure_role_assignment(
        &self,
        spec: &RoleAssignmentSpec,
    ) -> Result<RoleAssignmentState>;

    /// Read a role assignment
    async fn get_role_assignment(
        &self,
        scope: &str,
        name: &str,
    ) -> Result<Option<RoleAssignmentState>>;

    /// Delete a role assignment
    async fn delete_role_assignment(&self, scope: &str, name: &str) -> Result<()>;

    /// List the user kubeconfigs of a cluster (values are base64)
    async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster: &str,
    ) -> Result<Vec<ClusterCredential>>;

    /// List the admin credentials of a registry
    async fn list_registry_credentials(
        &self,
        resource_group: &str,
        registry: &str,
    ) -> Result<RegistryCredentialsResult>;

    /// Look up a built-in or custom role definition by GUID
    async fn lookup_role_definition(&self, role_definition_id: &str) -> Result<RoleDefinition>;
}
