use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use wasm_aks_common::{Result, Secret};
use wasm_aks_engine::{Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use crate::client::{KubeApi, KubeConnector};

/// Inputs of a Kubernetes provider
pub struct ProviderArgs {
    /// Kubeconfig of the target cluster; the only source of connection
    /// settings
    pub kubeconfig: Output<Secret<String>>,
}

/// A Kubernetes API handle bound to one cluster
pub struct Provider {
    connector: Arc<dyn KubeConnector>,
    kubeconfig: Output<Secret<String>>,
}

/// Outputs of a declared provider
#[derive(Clone)]
pub struct ProviderHandle {
    /// Node identity
    pub urn: Urn,
    /// API handle, available once the provider node has been created
    pub api: Output<Arc<dyn KubeApi>>,
}

impl Provider {
    /// Declare a provider on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: ProviderArgs,
        connector: Arc<dyn KubeConnector>,
        opts: ResourceOptions,
    ) -> Result<ProviderHandle> {
        let inputs = args.kubeconfig.dependencies().clone();
        let resource = Self {
            connector,
            kubeconfig: args.kubeconfig,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(ProviderHandle {
            api: registered.state,
            urn: registered.urn,
        })
    }

    async fn connect(&self) -> Result<Arc<dyn KubeApi>> {
        let kubeconfig = self.kubeconfig.resolve().await?;
        self.connector.connect(&kubeconfig).await
    }
}

#[async_trait]
impl Resource for Provider {
    type State = Arc<dyn KubeApi>;
    const TYPE_TOKEN: &'static str = "pulumi:providers:kubernetes";

    fn describe(&self) -> serde_json::Value {
        json!({
            "kubeconfig": self.kubeconfig.describe(),
            "enableServerSideApply": true,
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<Arc<dyn KubeApi>> {
        info!(urn = %urn, "Configuring Kubernetes provider");
        self.connect().await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<Arc<dyn KubeApi>>> {
        Ok(Some(self.connect().await?))
    }

    async fn delete(&self, _urn: &Urn, _state: &Arc<dyn KubeApi>) -> Result<Deletion> {
        Ok(Deletion::Deleted)
    }
}
