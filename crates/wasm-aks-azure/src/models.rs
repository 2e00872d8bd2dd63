//! Desired and observed state of the Azure resources wasm-aks manages
//!
//! Specs are fully resolved inputs handed to [`crate::AzureApi`]; states are
//! what ARM reports back. Enum values serialize to the exact strings ARM
//! expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key of the kubelet identity in a managed cluster's identity profile
pub const KUBELET_IDENTITY: &str = "kubeletidentity";

/// Managed identity type of a cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IdentityType {
    /// Identity created and owned by the cluster
    #[default]
    SystemAssigned,
    /// Identity supplied by the caller
    UserAssigned,
    /// No managed identity
    None,
}

/// Mode of an agent pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentPoolMode {
    /// Hosts critical system pods
    System,
    /// Hosts application pods
    User,
}

/// Node operating system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OsType {
    /// Linux nodes
    #[default]
    Linux,
    /// Windows nodes
    Windows,
}

/// Runtime the nodes of an agent pool run workloads with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkloadRuntime {
    /// Standard OCI containers
    #[default]
    #[serde(rename = "OCIContainer")]
    OciContainer,
    /// WebAssembly System Interface via containerd shims
    WasmWasi,
}

/// Container registry tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkuName {
    /// Basic tier
    Basic,
    /// Standard tier
    Standard,
    /// Premium tier
    Premium,
}

/// Kind of principal a role is assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrincipalType {
    /// Application or managed identity
    ServicePrincipal,
    /// Human user
    User,
    /// Group of principals
    Group,
}

/// Desired resource group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupSpec {
    /// Resource group name
    pub name: String,
    /// Azure region
    pub location: String,
}

/// Observed resource group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceGroupState {
    /// ARM resource ID
    pub id: String,
    /// Resource group name
    pub name: String,
    /// Azure region
    pub location: String,
}

/// A node pool declared inline on a managed cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPoolProfile {
    /// Pool name
    pub name: String,
    /// Pool mode
    pub mode: AgentPoolMode,
    /// OS disk size
    #[serde(rename = "osDiskSizeGB")]
    pub os_disk_size_gb: i32,
    /// Node operating system
    pub os_type: OsType,
    /// Node count
    pub count: i32,
    /// VM size of the nodes
    pub vm_size: String,
}

/// Desired managed cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedClusterSpec {
    /// Resource group holding the cluster
    pub resource_group: String,
    /// Cluster name
    pub name: String,
    /// Azure region
    pub location: String,
    /// Kubernetes version
    pub kubernetes_version: String,
    /// Managed identity type
    pub identity_type: IdentityType,
    /// DNS prefix of the API server
    pub dns_prefix: String,
    /// Inline node pools
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
}

/// An identity from a cluster's identity profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    /// ARM resource ID of the identity
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Client (application) ID
    #[serde(default)]
    pub client_id: Option<String>,
    /// Object ID used as principal in role assignments
    #[serde(default)]
    pub object_id: Option<String>,
}

/// Observed managed cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedClusterState {
    /// ARM resource ID
    pub id: String,
    /// Cluster name
    pub name: String,
    /// Resource group holding the cluster
    pub resource_group: String,
    /// Azure region
    pub location: String,
    /// Kubernetes version
    pub kubernetes_version: Option<String>,
    /// API server FQDN
    pub fqdn: Option<String>,
    /// Identities created for the cluster, keyed by role
    pub identity_profile: BTreeMap<String, UserAssignedIdentity>,
}

impl ManagedClusterState {
    /// The identity kubelets use to pull images
    pub fn kubelet_identity(&self) -> Option<&UserAssignedIdentity> {
        self.identity_profile.get(KUBELET_IDENTITY)
    }
}

/// Desired agent pool attached to an existing cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPoolSpec {
    /// Resource group holding the cluster
    pub resource_group: String,
    /// Name of the cluster the pool belongs to
    pub cluster: String,
    /// Pool name
    pub name: String,
    /// Workload runtime of the nodes
    pub workload_runtime: WorkloadRuntime,
    /// Node count
    pub count: i32,
    /// VM size of the nodes
    pub vm_size: String,
    /// Node operating system
    pub os_type: OsType,
}

/// Observed agent pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentPoolState {
    /// ARM resource ID
    pub id: String,
    /// Pool name
    pub name: String,
    /// Name of the cluster the pool belongs to
    pub cluster: String,
    /// Resource group holding the cluster
    pub resource_group: String,
    /// Workload runtime of the nodes
    pub workload_runtime: WorkloadRuntime,
    /// Node count
    pub count: i32,
}

/// Desired container registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrySpec {
    /// Resource group holding the registry
    pub resource_group: String,
    /// Registry name, also the login server prefix
    pub name: String,
    /// Azure region
    pub location: String,
    /// Registry tier
    pub sku: SkuName,
    /// Whether the admin user is enabled
    pub admin_user_enabled: bool,
}

/// Observed container registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryState {
    /// ARM resource ID
    pub id: String,
    /// Registry name
    pub name: String,
    /// Resource group holding the registry
    pub resource_group: String,
    /// Login server host (e.g. "myregistry.azurecr.io")
    pub login_server: String,
}

/// Desired role assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentSpec {
    /// Assignment name (a GUID)
    pub name: String,
    /// Scope the role applies to (an ARM resource ID)
    pub scope: String,
    /// Object ID of the principal
    pub principal_id: String,
    /// Kind of principal
    pub principal_type: PrincipalType,
    /// Fully qualified role definition ID
    pub role_definition_id: String,
}

/// Observed role assignment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentState {
    /// ARM resource ID
    pub id: String,
    /// Assignment name
    pub name: String,
    /// Scope the role applies to
    pub scope: String,
    /// Object ID of the principal
    pub principal_id: String,
    /// Fully qualified role definition ID
    pub role_definition_id: String,
}

/// A role definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    /// Fully qualified ID, as used in role assignments
    pub id: String,
    /// Definition GUID
    pub name: String,
    /// Display name (e.g. "AcrPull")
    pub role_name: Option<String>,
}

/// One entry of a cluster credential listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterCredential {
    /// Entry name (e.g. "clusterUser")
    pub name: String,
    /// Base64 encoded kubeconfig
    pub value: String,
}

/// Admin credentials of a container registry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryCredentialsResult {
    /// Admin user name
    pub username: Option<String>,
    /// Admin passwords (ARM keeps two)
    #[serde(default)]
    pub passwords: Vec<RegistryPassword>,
}

/// One registry admin password
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistryPassword {
    /// Password slot ("password" or "password2")
    pub name: Option<String>,
    /// Password value
    pub value: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_runtime_wire_names() {
        assert_eq!(
            serde_json::to_value(WorkloadRuntime::WasmWasi).unwrap(),
            "WasmWasi"
        );
        assert_eq!(
            serde_json::to_value(WorkloadRuntime::default()).unwrap(),
            "OCIContainer"
        );
    }

    #[test]
    fn test_profile_uses_arm_casing() {
        let profile = AgentPoolProfile {
            name: "agentpool".to_string(),
            mode: AgentPoolMode::System,
            os_disk_size_gb: 30,
            os_type: OsType::Linux,
            count: 1,
            vm_size: "Standard_B4ms".to_string(),
        };
        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["osDiskSizeGB"], 30);
        assert_eq!(value["vmSize"], "Standard_B4ms");
        assert_eq!(value["osType"], "Linux");
        assert_eq!(value["mode"], "System");
    }

    #[test]
    fn test_kubelet_identity_lookup() {
        let mut state = ManagedClusterState {
            id: "id".to_string(),
            name: "c".to_string(),
            resource_group: "rg".to_string(),
            location: "eastus".to_string(),
            kubernetes_version: None,
            fqdn: None,
            identity_profile: BTreeMap::new(),
        };
        assert!(state.kubelet_identity().is_none());

        state.identity_profile.insert(
            KUBELET_IDENTITY.to_string(),
            UserAssignedIdentity {
                object_id: Some("oid".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(
            state
                .kubelet_identity()
                .and_then(|i| i.object_id.as_deref()),
            Some("oid")
        );
    }
}
