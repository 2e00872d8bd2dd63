use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use wasm_aks_common::{Error, Result};
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::AzureProvider;
use crate::api::AzureApi;
use crate::models::{
    AgentPoolProfile, IdentityType, ManagedClusterSpec, ManagedClusterState, KUBELET_IDENTITY,
};

/// Inputs of a managed cluster
pub struct ManagedClusterArgs {
    /// Resource group holding the cluster
    pub resource_group_name: Output<String>,
    /// Cluster name
    pub resource_name: Output<String>,
    /// Azure region; the provider's location if omitted
    pub location: Option<Output<String>>,
    /// Kubernetes version
    pub kubernetes_version: String,
    /// Managed identity type
    pub identity_type: IdentityType,
    /// DNS prefix of the API server
    pub dns_prefix: String,
    /// Inline node pools
    pub agent_pool_profiles: Vec<AgentPoolProfile>,
}

/// An AKS managed cluster
pub struct ManagedCluster {
    api: Arc<dyn AzureApi>,
    resource_group: Output<String>,
    name: Output<String>,
    location: Output<String>,
    kubernetes_version: String,
    identity_type: IdentityType,
    dns_prefix: String,
    agent_pool_profiles: Vec<AgentPoolProfile>,
}

/// Outputs of a declared managed cluster
#[derive(Debug, Clone)]
pub struct ManagedClusterHandle {
    /// Node identity
    pub urn: Urn,
    /// Cluster name
    pub name: Output<String>,
    /// Resource group holding the cluster
    pub resource_group_name: Output<String>,
    /// Full observed state
    pub state: Output<ManagedClusterState>,
}

impl ManagedClusterHandle {
    /// Object ID of the kubelet identity, the principal that pulls images
    pub fn kubelet_object_id(&self) -> Output<String> {
        self.state.apply(|s| {
            s.kubelet_identity()
                .and_then(|i| i.object_id.clone())
                .ok_or_else(|| {
                    Error::lookup(
                        KUBELET_IDENTITY,
                        format!("cluster {} has no kubelet identity object id", s.name),
                    )
                })
        })
    }
}

impl ManagedCluster {
    /// Declare a managed cluster on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: ManagedClusterArgs,
        provider: &AzureProvider,
        opts: ResourceOptions,
    ) -> Result<ManagedClusterHandle> {
        let location = provider.location_or_default(args.location);
        let inputs = dependencies([
            args.resource_group_name.dependencies(),
            args.resource_name.dependencies(),
            location.dependencies(),
        ]);

        let resource = Self {
            api: provider.api().clone(),
            resource_group: args.resource_group_name,
            name: args.resource_name,
            location,
            kubernetes_version: args.kubernetes_version,
            identity_type: args.identity_type,
            dns_prefix: args.dns_prefix,
            agent_pool_profiles: args.agent_pool_profiles,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(ManagedClusterHandle {
            name: registered.state.apply(|s| Ok(s.name)),
            resource_group_name: registered.state.apply(|s| Ok(s.resource_group)),
            state: registered.state,
            urn: registered.urn,
        })
    }

    async fn spec(&self) -> Result<ManagedClusterSpec> {
        Ok(ManagedClusterSpec {
            resource_group: self.resource_group.resolve().await?,
            name: self.name.resolve().await?,
            location: self.location.resolve().await?,
            kubernetes_version: self.kubernetes_version.clone(),
            identity_type: self.identity_type,
            dns_prefix: self.dns_prefix.clone(),
            agent_pool_profiles: self.agent_pool_profiles.clone(),
        })
    }
}

#[async_trait]
impl Resource for ManagedCluster {
    type State = ManagedClusterState;
    const TYPE_TOKEN: &'static str = "azure:containerservice:ManagedCluster";

    fn describe(&self) -> serde_json::Value {
        json!({
            "resourceGroupName": self.resource_group.describe(),
            "resourceName": self.name.describe(),
            "location": self.location.describe(),
            "kubernetesVersion": self.kubernetes_version,
            "identity": { "type": self.identity_type },
            "dnsPrefix": self.dns_prefix,
            "agentPoolProfiles": self.agent_pool_profiles,
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<ManagedClusterState> {
        let spec = self.spec().await?;
        info!(
            urn = %urn,
            cluster = %spec.name,
            resource_group = %spec.resource_group,
            pools = spec.agent_pool_profiles.len(),
            "Ensuring managed cluster"
        );
        self.api.ensure_managed_cluster(&spec).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<ManagedClusterState>> {
        let resource_group = self.resource_group.resolve().await?;
        let name = self.name.resolve().await?;
        self.api.get_managed_cluster(&resource_group, &name).await
    }

    async fn delete(&self, urn: &Urn, state: &ManagedClusterState) -> Result<Deletion> {
        info!(urn = %urn, cluster = %state.name, "Deleting managed cluster");
        self.api
            .delete_managed_cluster(&state.resource_group, &state.name)
            .await?;
        Ok(Deletion::Deleted)
    }
}
