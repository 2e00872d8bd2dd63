//! Derived credential and role lookups
//!
//! Each lookup is an [`Output`]: it runs once, when first awaited during an
//! apply, and every consumer shares the result. Credentials are secret.

use std::collections::BTreeSet;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tracing::{debug, info};
use wasm_aks_common::{Error, Result, Secret};
use wasm_aks_engine::Output;

use crate::models::ClusterCredential;
use crate::resources::AzureProvider;

/// Built-in role allowing image pulls from a container registry (AcrPull)
pub const ACR_PULL_ROLE_DEFINITION_ID: &str = "7f951dda-4ed3-4680-a7ca-43fe172d538d";

/// Admin credentials of a registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    /// Admin user name
    pub username: String,
    /// First admin password
    pub password: Secret<String>,
}

/// Decode the first kubeconfig of a credential listing
pub fn decode_kubeconfig(credentials: &[ClusterCredential]) -> Result<Secret<String>> {
    let first = credentials
        .first()
        .ok_or_else(|| Error::lookup("kubeconfig", "cluster returned no kubeconfigs"))?;

    let bytes = STANDARD
        .decode(first.value.trim())
        .map_err(|e| Error::decode("kubeconfig", format!("invalid base64: {}", e)))?;
    let text = String::from_utf8(bytes)
        .map_err(|e| Error::decode("kubeconfig", format!("not utf-8: {}", e)))?;

    let parsed: serde_yaml::Value = serde_yaml::from_str(&text)
        .map_err(|e| Error::decode("kubeconfig", format!("not yaml: {}", e)))?;
    if parsed.get("clusters").is_none() {
        return Err(Error::decode("kubeconfig", "document has no clusters"));
    }

    Ok(Secret::new(text))
}

/// Kubeconfig of a managed cluster, from its user credentials
pub fn cluster_kubeconfig(
    provider: &AzureProvider,
    resource_group: &Output<String>,
    cluster: &Output<String>,
) -> Output<Secret<String>> {
    let api = provider.api().clone();
    resource_group
        .all(cluster)
        .apply_async(move |(resource_group, cluster)| async move {
            info!(cluster = %cluster, "Fetching cluster user credentials");
            let credentials = api
                .list_cluster_user_credentials(&resource_group, &cluster)
                .await?;
            decode_kubeconfig(&credentials)
        })
        .secret()
}

/// Admin credentials of a container registry
pub fn registry_credentials(
    provider: &AzureProvider,
    resource_group: &Output<String>,
    registry: &Output<String>,
) -> Output<RegistryCredentials> {
    let api = provider.api().clone();
    resource_group
        .all(registry)
        .apply_async(move |(resource_group, registry)| async move {
            info!(registry = %registry, "Fetching registry admin credentials");
            let result = api
                .list_registry_credentials(&resource_group, &registry)
                .await?;

            let username = result.username.ok_or_else(|| {
                Error::lookup(
                    "registry credentials",
                    format!("{} returned no admin username", registry),
                )
            })?;
            let password = result
                .passwords
                .into_iter()
                .next()
                .and_then(|p| p.value)
                .ok_or_else(|| {
                    Error::lookup(
                        "registry credentials",
                        format!("{} returned no admin password", registry),
                    )
                })?;

            Ok(RegistryCredentials {
                username,
                password: Secret::new(password),
            })
        })
        .secret()
}

/// A role definition looked up by GUID at subscription scope
pub fn role_definition(provider: &AzureProvider, role_definition_id: &str) -> Output<String> {
    let api = provider.api().clone();
    let id = role_definition_id.to_string();
    Output::from_future(BTreeSet::new(), async move {
        let definition = api.lookup_role_definition(&id).await?;
        debug!(
            id = %definition.id,
            role = definition.role_name.as_deref().unwrap_or_default(),
            "Resolved role definition"
        );
        Ok(definition.id)
    })
}
