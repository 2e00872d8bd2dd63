use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::AzureProvider;
use crate::api::AzureApi;
use crate::models::{RegistrySpec, RegistryState, SkuName};

/// Inputs of a container registry
pub struct RegistryArgs {
    /// Resource group holding the registry
    pub resource_group_name: Output<String>,
    /// Registry name
    pub registry_name: Output<String>,
    /// Azure region; the provider's location if omitted
    pub location: Option<Output<String>>,
    /// Registry tier
    pub sku: SkuName,
    /// Whether the admin user is enabled
    pub admin_user_enabled: bool,
}

/// An Azure container registry
pub struct Registry {
    api: Arc<dyn AzureApi>,
    resource_group: Output<String>,
    name: Output<String>,
    location: Output<String>,
    sku: SkuName,
    admin_user_enabled: bool,
}

/// Outputs of a declared container registry
#[derive(Debug, Clone)]
pub struct RegistryHandle {
    /// Node identity
    pub urn: Urn,
    /// Registry name
    pub name: Output<String>,
    /// ARM resource ID, the scope of role assignments on the registry
    pub id: Output<String>,
    /// Login server host
    pub login_server: Output<String>,
    /// Resource group holding the registry
    pub resource_group_name: Output<String>,
}

impl Registry {
    /// Declare a container registry on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: RegistryArgs,
        provider: &AzureProvider,
        opts: ResourceOptions,
    ) -> Result<RegistryHandle> {
        let location = provider.location_or_default(args.location);
        let inputs = dependencies([
            args.resource_group_name.dependencies(),
            args.registry_name.dependencies(),
            location.dependencies(),
        ]);

        let resource = Self {
            api: provider.api().clone(),
            resource_group: args.resource_group_name,
            name: args.registry_name,
            location,
            sku: args.sku,
            admin_user_enabled: args.admin_user_enabled,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(RegistryHandle {
            name: registered.state.apply(|s| Ok(s.name)),
            id: registered.state.apply(|s| Ok(s.id)),
            login_server: registered.state.apply(|s| Ok(s.login_server)),
            resource_group_name: registered.state.apply(|s| Ok(s.resource_group)),
            urn: registered.urn,
        })
    }

    async fn spec(&self) -> Result<RegistrySpec> {
        Ok(RegistrySpec {
            resource_group: self.resource_group.resolve().await?,
            name: self.name.resolve().await?,
            location: self.location.resolve().await?,
            sku: self.sku,
            admin_user_enabled: self.admin_user_enabled,
        })
    }
}

#[async_trait]
impl Resource for Registry {
    type State = RegistryState;
    const TYPE_TOKEN: &'static str = "azure:containerregistry:Registry";

    fn describe(&self) -> serde_json::Value {
        json!({
            "resourceGroupName": self.resource_group.describe(),
            "registryName": self.name.describe(),
            "location": self.location.describe(),
            "sku": { "name": self.sku },
            "adminUserEnabled": self.admin_user_enabled,
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<RegistryState> {
        let spec = self.spec().await?;
        info!(
            urn = %urn,
            registry = %spec.name,
            sku = ?spec.sku,
            admin_user_enabled = spec.admin_user_enabled,
            "Ensuring container registry"
        );
        self.api.ensure_registry(&spec).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<RegistryState>> {
        let resource_group = self.resource_group.resolve().await?;
        let name = self.name.resolve().await?;
        self.api.get_registry(&resource_group, &name).await
    }

    async fn delete(&self, urn: &Urn, state: &RegistryState) -> Result<Deletion> {
        info!(urn = %urn, registry = %state.name, "Deleting container registry");
        self.api
            .delete_registry(&state.resource_group, &state.name)
            .await?;
        Ok(Deletion::Deleted)
    }
}
