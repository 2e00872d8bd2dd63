//! Engine-level settings
//!
//! These choose where the stack lands (subscription, default region), not
//! what it contains. Every one can come from a flag or its environment
//! variable:
//! - `AZURE_SUBSCRIPTION_ID`, else the Azure CLI's active account
//! - `AZURE_LOCATION`, default `eastus`
//! - `AZURE_ACCESS_TOKEN`, else tokens from the Azure CLI
//! - `AZURE_ARM_ENDPOINT`, default the public cloud

use std::sync::Arc;

use clap::Args;
use tracing::debug;

use wasm_aks_azure::auth::{default_subscription, TokenSource};
use wasm_aks_azure::{ArmAzure, ArmClient, AzureProvider};
use wasm_aks_image::DockerCli;
use wasm_aks_kubernetes::KubeRsConnector;
use wasm_aks_topology::Providers;

use crate::{Error, Result};

/// Region used when none is configured
pub const DEFAULT_LOCATION: &str = "eastus";

/// Subscription placeholder for passes that never reach Azure
const OFFLINE_SUBSCRIPTION: &str = "00000000-0000-0000-0000-000000000000";

/// Where and how the stack is provisioned
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Azure subscription (defaults to the Azure CLI's active account)
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID", global = true)]
    pub subscription_id: Option<String>,

    /// Region for resources that do not name one
    #[arg(long, env = "AZURE_LOCATION", default_value = DEFAULT_LOCATION, global = true)]
    pub location: String,

    /// ARM endpoint (sovereign clouds, test servers)
    #[arg(long, env = "AZURE_ARM_ENDPOINT", global = true)]
    pub arm_endpoint: Option<String>,

    /// docker executable used to build and push the image
    #[arg(long, env = "WASM_AKS_DOCKER", default_value = "docker", global = true)]
    pub docker: String,
}

impl Settings {
    /// Providers that talk to Azure, docker and the new cluster
    pub async fn providers(&self) -> Result<Providers> {
        let subscription = match &self.subscription_id {
            Some(id) if !id.trim().is_empty() => id.trim().to_string(),
            _ => default_subscription().await?,
        };
        self.build(subscription)
    }

    /// Providers for passes that only declare the stack
    ///
    /// Nothing is resolved from the environment beyond what the flags carry;
    /// a preview never calls any of them.
    pub fn offline_providers(&self) -> Result<Providers> {
        let subscription = self
            .subscription_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| OFFLINE_SUBSCRIPTION.to_string());
        self.build(subscription)
    }

    fn build(&self, subscription: String) -> Result<Providers> {
        if self.location.trim().is_empty() {
            return Err(Error::config("location must not be empty"));
        }
        debug!(
            subscription = %subscription,
            location = %self.location,
            "Configuring providers"
        );

        let tokens = TokenSource::from_env();
        let client = match &self.arm_endpoint {
            Some(endpoint) => ArmClient::with_endpoint(endpoint.as_str(), subscription, tokens)?,
            None => ArmClient::new(subscription, tokens)?,
        };

        Ok(Providers {
            azure: AzureProvider::new(Arc::new(ArmAzure::new(client)), self.location.as_str()),
            images: Arc::new(DockerCli::with_program(self.docker.as_str())),
            kube: Arc::new(KubeRsConnector::default()),
        })
    }
}
