//! Azure provider for wasm-aks
//!
//! Resource groups, AKS managed clusters and agent pools, container
//! registries and role assignments, declared as engine nodes and provisioned
//! through Azure Resource Manager. Credential lookups (cluster kubeconfig,
//! registry admin credentials, role definitions) are memoized secret outputs.

#![deny(missing_docs)]

pub mod api;
pub mod arm;
pub mod auth;
pub mod client;
pub mod lookups;
pub mod models;
pub mod resources;

pub use api::AzureApi;
pub use arm::ArmAzure;
pub use auth::TokenSource;
pub use client::ArmClient;
pub use lookups::{
    cluster_kubeconfig, registry_credentials, role_definition, RegistryCredentials,
    ACR_PULL_ROLE_DEFINITION_ID,
};
pub use resources::{
    AgentPool, AgentPoolArgs, AgentPoolHandle, AzureProvider, ManagedCluster, ManagedClusterArgs,
    ManagedClusterHandle, Registry, RegistryArgs, RegistryHandle, ResourceGroup,
    ResourceGroupArgs, ResourceGroupHandle, RoleAssignment, RoleAssignmentArgs,
    RoleAssignmentHandle,
};
