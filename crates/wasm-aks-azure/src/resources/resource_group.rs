use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::AzureProvider;
use crate::api::AzureApi;
use crate::models::{ResourceGroupSpec, ResourceGroupState};

/// Inputs of a resource group
pub struct ResourceGroupArgs {
    /// Resource group name
    pub resource_group_name: Output<String>,
    /// Azure region; the provider's location if omitted
    pub location: Option<Output<String>>,
}

/// A resource group
pub struct ResourceGroup {
    api: Arc<dyn AzureApi>,
    name: Output<String>,
    location: Output<String>,
}

/// Outputs of a declared resource group
#[derive(Debug, Clone)]
pub struct ResourceGroupHandle {
    /// Node identity
    pub urn: Urn,
    /// Resource group name
    pub name: Output<String>,
    /// Azure region
    pub location: Output<String>,
    /// ARM resource ID
    pub id: Output<String>,
}

impl ResourceGroup {
    /// Declare a resource group on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: ResourceGroupArgs,
        provider: &AzureProvider,
        opts: ResourceOptions,
    ) -> Result<ResourceGroupHandle> {
        let location = provider.location_or_default(args.location);
        let inputs = dependencies([args.resource_group_name.dependencies(), location.dependencies()]);

        let resource = Self {
            api: provider.api().clone(),
            name: args.resource_group_name,
            location,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(ResourceGroupHandle {
            name: registered.state.apply(|s| Ok(s.name)),
            location: registered.state.apply(|s| Ok(s.location)),
            id: registered.state.apply(|s| Ok(s.id)),
            urn: registered.urn,
        })
    }

    async fn spec(&self) -> Result<ResourceGroupSpec> {
        Ok(ResourceGroupSpec {
            name: self.name.resolve().await?,
            location: self.location.resolve().await?,
        })
    }
}

#[async_trait]
impl Resource for ResourceGroup {
    type State = ResourceGroupState;
    const TYPE_TOKEN: &'static str = "azure:resources:ResourceGroup";

    fn describe(&self) -> serde_json::Value {
        json!({
            "resourceGroupName": self.name.describe(),
            "location": self.location.describe(),
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<ResourceGroupState> {
        let spec = self.spec().await?;
        info!(urn = %urn, resource_group = %spec.name, location = %spec.location, "Ensuring resource group");
        self.api.ensure_resource_group(&spec).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<ResourceGroupState>> {
        let name = self.name.resolve().await?;
        self.api.get_resource_group(&name).await
    }

    async fn delete(&self, urn: &Urn, state: &ResourceGroupState) -> Result<Deletion> {
        info!(urn = %urn, resource_group = %state.name, "Deleting resource group");
        self.api.delete_resource_group(&state.name).await?;
        Ok(Deletion::Deleted)
    }
}
