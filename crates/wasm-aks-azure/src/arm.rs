//! [`AzureApi`] over Azure Resource Manager REST

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use wasm_aks_common::{Error, Result};

use crate::api::AzureApi;
use crate::client::{ArmClient, Provisioned};
use crate::models::{
    AgentPoolMode, AgentPoolProfile, AgentPoolSpec, AgentPoolState, ClusterCredential,
    IdentityType, ManagedClusterSpec, ManagedClusterState, OsType, PrincipalType,
    RegistryCredentialsResult, RegistrySpec, RegistryState, ResourceGroupSpec, ResourceGroupState,
    RoleAssignmentSpec, RoleAssignmentState, RoleDefinition, SkuName, UserAssignedIdentity,
    WorkloadRuntime,
};

/// `Microsoft.Resources` API version
pub const RESOURCES_API_VERSION: &str = "2022-09-01";
/// `Microsoft.ContainerService` API version
pub const CONTAINER_SERVICE_API_VERSION: &str = "2023-01-01";
/// `Microsoft.ContainerRegistry` API version
pub const CONTAINER_REGISTRY_API_VERSION: &str = "2023-01-01-preview";
/// `Microsoft.Authorization` API version
pub const AUTHORIZATION_API_VERSION: &str = "2022-04-01";

// =============================================================================
// Wire format
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Envelope<P> {
    #[serde(default, skip_serializing)]
    id: String,
    #[serde(default, skip_serializing)]
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity: Option<IdentityWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sku: Option<SkuWire>,
    properties: P,
}

impl<P> Envelope<P> {
    fn new(properties: P) -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            location: None,
            identity: None,
            sku: None,
            properties,
        }
    }

    fn located(mut self, location: &str) -> Self {
        self.location = Some(location.to_string());
        self
    }
}

impl<P: Provisioned> Provisioned for Envelope<P> {
    fn provisioning_state(&self) -> Option<&str> {
        self.properties.provisioning_state()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct IdentityWire {
    #[serde(rename = "type")]
    kind: IdentityType,
}

#[derive(Debug, Serialize, Deserialize)]
struct SkuWire {
    name: SkuName,
}

macro_rules! provisioned {
    ($($props:ty),*) => {
        $(impl Provisioned for $props {
            fn provisioning_state(&self) -> Option<&str> {
                self.provisioning_state.as_deref()
            }
        })*
    };
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceGroupProps {
    #[serde(default, skip_serializing)]
    provisioning_state: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ManagedClusterProps {
    #[serde(default, skip_serializing)]
    provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kubernetes_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dns_prefix: Option<String>,
    /// Only sent; the response carries many more fields per profile
    #[serde(default, skip_deserializing, skip_serializing_if = "Vec::is_empty")]
    agent_pool_profiles: Vec<AgentPoolProfile>,
    #[serde(default, skip_serializing)]
    identity_profile: BTreeMap<String, UserAssignedIdentity>,
    #[serde(default, skip_serializing)]
    fqdn: Option<String>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AgentPoolProps {
    #[serde(default, skip_serializing)]
    provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    count: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    vm_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    os_type: Option<OsType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mode: Option<AgentPoolMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    workload_runtime: Option<WorkloadRuntime>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegistryProps {
    #[serde(default, skip_serializing)]
    provisioning_state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    admin_user_enabled: Option<bool>,
    #[serde(default, skip_serializing)]
    login_server: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignmentProps {
    role_definition_id: String,
    principal_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    principal_type: Option<PrincipalType>,
    #[serde(default, skip_serializing)]
    scope: Option<String>,
}

impl Provisioned for RoleAssignmentProps {
    fn provisioning_state(&self) -> Option<&str> {
        None
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleDefinitionProps {
    #[serde(default)]
    role_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CredentialResults {
    #[serde(default)]
    kubeconfigs: Vec<ClusterCredential>,
}

provisioned!(ResourceGroupProps, ManagedClusterProps, AgentPoolProps, RegistryProps);

// =============================================================================
// Conversions
// =============================================================================

fn resource_group_body(spec: &ResourceGroupSpec) -> Envelope<ResourceGroupProps> {
    Envelope::new(ResourceGroupProps::default()).located(&spec.location)
}

fn resource_group_state(env: Envelope<ResourceGroupProps>) -> ResourceGroupState {
    ResourceGroupState {
        id: env.id,
        name: env.name,
        location: env.location.unwrap_or_default(),
    }
}

fn managed_cluster_body(spec: &ManagedClusterSpec) -> Envelope<ManagedClusterProps> {
    let mut body = Envelope::new(ManagedClusterProps {
        kubernetes_version: Some(spec.kubernetes_version.clone()),
        dns_prefix: Some(spec.dns_prefix.clone()),
        agent_pool_profiles: spec.agent_pool_profiles.clone(),
        ..Default::default()
    })
    .located(&spec.location);
    body.identity = Some(IdentityWire {
        kind: spec.identity_type,
    });
    body
}

fn managed_cluster_state(
    resource_group: &str,
    env: Envelope<ManagedClusterProps>,
) -> ManagedClusterState {
    ManagedClusterState {
        id: env.id,
        name: env.name,
        resource_group: resource_group.to_string(),
        location: env.location.unwrap_or_default(),
        kubernetes_version: env.properties.kubernetes_version,
        fqdn: env.properties.fqdn,
        identity_profile: env.properties.identity_profile,
    }
}

fn agent_pool_body(spec: &AgentPoolSpec) -> Envelope<AgentPoolProps> {
    Envelope::new(AgentPoolProps {
        count: Some(spec.count),
        vm_size: Some(spec.vm_size.clone()),
        os_type: Some(spec.os_type),
        workload_runtime: Some(spec.workload_runtime),
        ..Default::default()
    })
}

fn agent_pool_state(
    resource_group: &str,
    cluster: &str,
    env: Envelope<AgentPoolProps>,
) -> AgentPoolState {
    AgentPoolState {
        id: env.id,
        name: env.name,
        cluster: cluster.to_string(),
        resource_group: resource_group.to_string(),
        workload_runtime: env.properties.workload_runtime.unwrap_or_default(),
        count: env.properties.count.unwrap_or_default(),
    }
}

fn registry_body(spec: &RegistrySpec) -> Envelope<RegistryProps> {
    let mut body = Envelope::new(RegistryProps {
        admin_user_enabled: Some(spec.admin_user_enabled),
        ..Default::default()
    })
    .located(&spec.location);
    body.sku = Some(SkuWire { name: spec.sku });
    body
}

fn registry_state(resource_group: &str, env: Envelope<RegistryProps>) -> RegistryState {
    let login_server = env
        .properties
        .login_server
        .unwrap_or_else(|| format!("{}.azurecr.io", env.name.to_lowercase()));
    RegistryState {
        id: env.id,
        name: env.name,
        resource_group: resource_group.to_string(),
        login_server,
    }
}

fn role_assignment_body(spec: &RoleAssignmentSpec) -> Envelope<RoleAssignmentProps> {
    Envelope::new(RoleAssignmentProps {
        role_definition_id: spec.role_definition_id.clone(),
        principal_id: spec.principal_id.clone(),
        principal_type: Some(spec.principal_type),
        scope: None,
    })
}

fn role_assignment_state(scope: &str, env: Envelope<RoleAssignmentProps>) -> RoleAssignmentState {
    RoleAssignmentState {
        id: env.id,
        name: env.name,
        scope: env.properties.scope.unwrap_or_else(|| scope.to_string()),
        principal_id: env.properties.principal_id,
        role_definition_id: env.properties.role_definition_id,
    }
}

// =============================================================================
// ArmAzure
// =============================================================================

/// [`AzureApi`] backed by an [`ArmClient`]
#[derive(Clone)]
pub struct ArmAzure {
    client: ArmClient,
}

impl ArmAzure {
    /// Wrap an authenticated client
    pub fn new(client: ArmClient) -> Self {
        Self { client }
    }

    fn cluster_path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.ContainerService/managedClusters/{}",
            self.client.resource_group_path(resource_group),
            name
        )
    }

    fn agent_pool_path(&self, resource_group: &str, cluster: &str, name: &str) -> String {
        format!("{}/agentPools/{}", self.cluster_path(resource_group, cluster), name)
    }

    fn registry_path(&self, resource_group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.ContainerRegistry/registries/{}",
            self.client.resource_group_path(resource_group),
            name
        )
    }

    fn role_assignment_path(scope: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/roleAssignments/{}",
            scope.trim_end_matches('/'),
            name
        )
    }

    fn role_definition_path(&self, id: &str) -> String {
        format!(
            "{}/providers/Microsoft.Authorization/roleDefinitions/{}",
            self.client.subscription_path(),
            id
        )
    }
}

#[async_trait]
impl AzureApi for ArmAzure {
    async fn ensure_resource_group(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroupState> {
        let path = self.client.resource_group_path(&spec.name);
        let env = self
            .client
            .put_and_wait(&path, RESOURCES_API_VERSION, &resource_group_body(spec))
            .await?;
        Ok(resource_group_state(env))
    }

    async fn get_resource_group(&self, name: &str) -> Result<Option<ResourceGroupState>> {
        let path = self.client.resource_group_path(name);
        let env = self.client.get(&path, RESOURCES_API_VERSION).await?;
        Ok(env.map(resource_group_state))
    }

    async fn delete_resource_group(&self, name: &str) -> Result<()> {
        let path = self.client.resource_group_path(name);
        self.client
            .delete_and_wait::<Envelope<ResourceGroupProps>>(&path, RESOURCES_API_VERSION)
            .await
    }

    async fn ensure_managed_cluster(
        &self,
        spec: &ManagedClusterSpec,
    ) -> Result<ManagedClusterState> {
        let path = self.cluster_path(&spec.resource_group, &spec.name);
        info!(cluster = %spec.name, version = %spec.kubernetes_version, "Ensuring managed cluster");
        let env = self
            .client
            .put_and_wait(&path, CONTAINER_SERVICE_API_VERSION, &managed_cluster_body(spec))
            .await?;
        Ok(managed_cluster_state(&spec.resource_group, env))
    }

    async fn get_managed_cluster(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<ManagedClusterState>> {
        let path = self.cluster_path(resource_group, name);
        let env = self.client.get(&path, CONTAINER_SERVICE_API_VERSION).await?;
        Ok(env.map(|e| managed_cluster_state(resource_group, e)))
    }

    async fn delete_managed_cluster(&self, resource_group: &str, name: &str) -> Result<()> {
        let path = self.cluster_path(resource_group, name);
        self.client
            .delete_and_wait::<Envelope<ManagedClusterProps>>(&path, CONTAINER_SERVICE_API_VERSION)
            .await
    }

    async fn ensure_agent_pool(&self, spec: &AgentPoolSpec) -> Result<AgentPoolState> {
        let path = self.agent_pool_path(&spec.resource_group, &spec.cluster, &spec.name);
        info!(
            pool = %spec.name,
            cluster = %spec.cluster,
            runtime = ?spec.workload_runtime,
            "Ensuring agent pool"
        );
        let env = self
            .client
            .put_and_wait(&path, CONTAINER_SERVICE_API_VERSION, &agent_pool_body(spec))
            .await?;
        Ok(agent_pool_state(&spec.resource_group, &spec.cluster, env))
    }

    async fn get_agent_pool(
        &self,
        resource_group: &str,
        cluster: &str,
        name: &str,
    ) -> Result<Option<AgentPoolState>> {
        let path = self.agent_pool_path(resource_group, cluster, name);
        let env = self.client.get(&path, CONTAINER_SERVICE_API_VERSION).await?;
        Ok(env.map(|e| agent_pool_state(resource_group, cluster, e)))
    }

    async fn delete_agent_pool(
        &self,
        resource_group: &str,
        cluster: &str,
        name: &str,
    ) -> Result<()> {
        let path = self.agent_pool_path(resource_group, cluster, name);
        self.client
            .delete_and_wait::<Envelope<AgentPoolProps>>(&path, CONTAINER_SERVICE_API_VERSION)
            .await
    }

    async fn ensure_registry(&self, spec: &RegistrySpec) -> Result<RegistryState> {
        let path = self.registry_path(&spec.resource_group, &spec.name);
        let env = self
            .client
            .put_and_wait(&path, CONTAINER_REGISTRY_API_VERSION, &registry_body(spec))
            .await?;
        Ok(registry_state(&spec.resource_group, env))
    }

    async fn get_registry(
        &self,
        resource_group: &str,
        name: &str,
    ) -> Result<Option<RegistryState>> {
        let path = self.registry_path(resource_group, name);
        let env = self.client.get(&path, CONTAINER_REGISTRY_API_VERSION).await?;
        Ok(env.map(|e| registry_state(resource_group, e)))
    }

    async fn delete_registry(&self, resource_group: &str, name: &str) -> Result<()> {
        let path = self.registry_path(resource_group, name);
        self.client
            .delete_and_wait::<Envelope<RegistryProps>>(&path, CONTAINER_REGISTRY_API_VERSION)
            .await
    }

    async fn ensure_role_assignment(
        &self,
        spec: &RoleAssignmentSpec,
    ) -> Result<RoleAssignmentState> {
        let path = Self::role_assignment_path(&spec.scope, &spec.name);
        let env = self
            .client
            .put_and_wait(&path, AUTHORIZATION_API_VERSION, &role_assignment_body(spec))
            .await?;
        Ok(role_assignment_state(&spec.scope, env))
    }

    async fn get_role_assignment(
        &self,
        scope: &str,
        name: &str,
    ) -> Result<Option<RoleAssignmentState>> {
        let path = Self::role_assignment_path(scope, name);
        let env = self.client.get(&path, AUTHORIZATION_API_VERSION).await?;
        Ok(env.map(|e| role_assignment_state(scope, e)))
    }

    async fn delete_role_assignment(&self, scope: &str, name: &str) -> Result<()> {
        let path = Self::role_assignment_path(scope, name);
        self.client.delete(&path, AUTHORIZATION_API_VERSION).await?;
        Ok(())
    }

    async fn list_cluster_user_credentials(
        &self,
        resource_group: &str,
        cluster: &str,
    ) -> Result<Vec<ClusterCredential>> {
        let path = format!(
            "{}/listClusterUserCredential",
            self.cluster_path(resource_group, cluster)
        );
        let results: CredentialResults = self
            .client
            .post(&path, CONTAINER_SERVICE_API_VERSION)
            .await?;
        Ok(results.kubeconfigs)
    }

    async fn list_registry_credentials(
        &self,
        resource_group: &str,
        registry: &str,
    ) -> Result<RegistryCredentialsResult> {
        let path = format!(
            "{}/listCredentials",
            self.registry_path(resource_group, registry)
        );
        self.client.post(&path, CONTAINER_REGISTRY_API_VERSION).await
    }

    async fn lookup_role_definition(&self, role_definition_id: &str) -> Result<RoleDefinition> {
        let path = self.role_definition_path(role_definition_id);
        let env: Option<Envelope<RoleDefinitionProps>> =
            self.client.get(&path, AUTHORIZATION_API_VERSION).await?;

        let env = env.ok_or_else(|| {
            Error::lookup(
                "role definition",
                format!("{} not found at {}", role_definition_id, path),
            )
        })?;

        Ok(RoleDefinition {
            id: env.id,
            name: env.name,
            role_name: env.properties.role_name,
        })
    }
}
