//! Cluster access bound to an explicit kubeconfig
//!
//! Clients are only ever built from kubeconfig text handed to
//! [`KubeConnector::connect`]; nothing here infers the operator's local
//! context.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::{Namespace, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
#[cfg(test)]
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use wasm_aks_common::{Error, Result, Secret, FIELD_MANAGER};

use crate::objects::{KubeObject, ObjectKind, ObjectRef};

/// Connect timeout for clients built from a kubeconfig
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Read timeout for clients built from a kubeconfig
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations on the objects wasm-aks manages
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeApi: Send + Sync {
    /// Server-side apply `object`; returns what the API server stored
    async fn apply(&self, object: &KubeObject) -> Result<KubeObject>;

    /// Current state of an object, `None` if it does not exist
    async fn get(&self, target: &ObjectRef) -> Result<Option<KubeObject>>;

    /// Delete an object; deleting a missing object succeeds
    async fn delete(&self, target: &ObjectRef) -> Result<()>;
}

/// Builds [`KubeApi`] handles from kubeconfig text
#[cfg_attr(test, automock)]
#[async_trait]
pub trait KubeConnector: Send + Sync {
    /// Connect using only the given kubeconfig
    async fn connect(&self, kubeconfig: &Secret<String>) -> Result<Arc<dyn KubeApi>>;
}

/// [`KubeConnector`] backed by kube-rs
#[derive(Debug, Clone)]
pub struct KubeRsConnector {
    connect_timeout: Duration,
    read_timeout: Duration,
}

impl Default for KubeRsConnector {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl KubeRsConnector {
    async fn config(&self, kubeconfig: &Secret<String>) -> Result<Config> {
        let parsed = Kubeconfig::from_yaml(kubeconfig.expose())
            .map_err(|e| Error::decode("kubeconfig", e.to_string()))?;

        let mut config = Config::from_custom_kubeconfig(parsed, &KubeConfigOptions::default())
            .await
            .map_err(|e| {
                Error::internal_with_context(
                    "connect",
                    format!("failed to load kubeconfig: {}", e),
                )
            })?;
        config.connect_timeout = Some(self.connect_timeout);
        config.read_timeout = Some(self.read_timeout);
        Ok(config)
    }
}

#[async_trait]
impl KubeConnector for KubeRsConnector {
    async fn connect(&self, kubeconfig: &Secret<String>) -> Result<Arc<dyn KubeApi>> {
        let config = self.config(kubeconfig).await?;
        info!(cluster_url = %config.cluster_url, "Connecting to cluster");
        let client = Client::try_from(config)?;
        Ok(Arc::new(KubeRsApi { client }))
    }
}

/// [`KubeApi`] over a kube-rs client
#[derive(Clone)]
pub struct KubeRsApi {
    client: Client,
}

impl KubeRsApi {
    /// Wrap an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn namespaced<K>(&self, target: &ObjectRef) -> Result<Api<K>>
    where
        K: kube::Resource<Scope = NamespaceResourceScope>,
        <K as kube::Resource>::DynamicType: Default,
    {
        let namespace = target.namespace.as_deref().ok_or_else(|| {
            Error::validation_for_field(
                target.to_string(),
                "metadata.namespace",
                "namespaced object has no namespace",
            )
        })?;
        Ok(Api::namespaced(self.client.clone(), namespace))
    }
}

async fn apply_typed<K>(api: Api<K>, name: &str, object: &K) -> Result<K>
where
    K: Clone + DeserializeOwned + Serialize + Debug,
{
    let params = PatchParams::apply(FIELD_MANAGER).force();
    Ok(api.patch(name, &params, &Patch::Apply(object)).await?)
}

async fn delete_typed<K>(api: Api<K>, name: &str) -> Result<()>
where
    K: Clone + DeserializeOwned + Debug,
{
    match api.delete(name, &DeleteParams::default()).await {
        Ok(_) => Ok(()),
        Err(kube::Error::Api(e)) if e.code == 404 => {
            debug!(name = %name, "Object already gone");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl KubeApi for KubeRsApi {
    async fn apply(&self, object: &KubeObject) -> Result<KubeObject> {
        let target = object.object_ref();
        debug!(object = %target, "Applying");

        let applied = match object {
            KubeObject::Namespace(ns) => KubeObject::Namespace(
                apply_typed(Api::<Namespace>::all(self.client.clone()), &target.name, ns).await?,
            ),
            KubeObject::Deployment(deploy) => KubeObject::Deployment(
                apply_typed(self.namespaced::<Deployment>(&target)?, &target.name, deploy).await?,
            ),
            KubeObject::Service(svc) => KubeObject::Service(
                apply_typed(self.namespaced::<Service>(&target)?, &target.name, svc).await?,
            ),
        };
        Ok(applied)
    }

    async fn get(&self, target: &ObjectRef) -> Result<Option<KubeObject>> {
        let found = match target.kind {
            ObjectKind::Namespace => Api::<Namespace>::all(self.client.clone())
                .get_opt(&target.name)
                .await?
                .map(KubeObject::Namespace),
            ObjectKind::Deployment => self
                .namespaced::<Deployment>(target)?
                .get_opt(&target.name)
                .await?
                .map(KubeObject::Deployment),
            ObjectKind::Service => self
                .namespaced::<Service>(target)?
                .get_opt(&target.name)
                .await?
                .map(KubeObject::Service),
        };
        Ok(found)
    }

    async fn delete(&self, target: &ObjectRef) -> Result<()> {
        debug!(object = %target, "Deleting");
        match target.kind {
            ObjectKind::Namespace => {
                delete_typed(Api::<Namespace>::all(self.client.clone()), &target.name).await
            }
            ObjectKind::Deployment => {
                delete_typed(self.namespaced::<Deployment>(target)?, &target.name).await
            }
            ObjectKind::Service => {
                delete_typed(self.namespaced::<Service>(target)?, &target.name).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_kubeconfig() {
        let connector = KubeRsConnector::default();
        let err = connector
            .config(&Secret::new("clusters: [unterminated".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[tokio::test]
    async fn test_connect_requires_a_current_context() {
        // no current-context: there is nothing to fall back to
        let kubeconfig = "apiVersion: v1\nkind: Config\nclusters: []\ncontexts: []\nusers: []\n";
        let connector = KubeRsConnector::default();
        let err = connector
            .config(&Secret::new(kubeconfig.to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        assert!(err.to_string().contains("kubeconfig"));
    }

    #[tokio::test]
    async fn test_config_uses_cluster_from_kubeconfig() {
        let kubeconfig = r#"
apiVersion: v1
kind: Config
current-context: wasm-aks-cluster
clusters:
- name: wasm-aks-cluster
  cluster:
    server: https://wasm-aks-cluster-dns.hcp.eastus.azmk8s.io:443
contexts:
- name: wasm-aks-cluster
  context:
    cluster: wasm-aks-cluster
    user: clusterUser
users:
- name: clusterUser
  user:
    token: abc
"#;
        let config = KubeRsConnector::default()
            .config(&Secret::new(kubeconfig.to_string()))
            .await
            .unwrap();
        assert_eq!(
            config.cluster_url.host(),
            Some("wasm-aks-cluster-dns.hcp.eastus.azmk8s.io")
        );
        assert_eq!(config.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
        assert_eq!(config.read_timeout, Some(DEFAULT_READ_TIMEOUT));
    }
}
