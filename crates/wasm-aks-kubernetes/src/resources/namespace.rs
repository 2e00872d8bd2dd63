use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::json;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::{apply_and_await, delete_object, ProviderHandle};
use crate::client::KubeApi;
use crate::labels::ObjectAnnotations;
use crate::objects::{KubeObject, ObjectKind, ObjectRef};

/// Inputs of a namespace
pub struct NamespaceArgs {
    /// metadata.name
    pub name: String,
}

/// A Kubernetes namespace
pub struct Namespace {
    api: Output<Arc<dyn KubeApi>>,
    name: String,
}

/// Outputs of a declared namespace
#[derive(Debug, Clone)]
pub struct NamespaceHandle {
    /// Node identity
    pub urn: Urn,
    /// Namespace name, available once the namespace exists
    pub name: Output<String>,
}

impl Namespace {
    /// Declare a namespace on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: NamespaceArgs,
        provider: &ProviderHandle,
        opts: ResourceOptions,
    ) -> Result<NamespaceHandle> {
        let inputs = dependencies([provider.api.dependencies()]);
        let resource = Self {
            api: provider.api.clone(),
            name: args.name,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(NamespaceHandle {
            name: registered.state.apply(|s| Ok(s.name().to_string())),
            urn: registered.urn,
        })
    }

    fn object(&self) -> KubeObject {
        KubeObject::Namespace(corev1::Namespace {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            kind: ObjectKind::Namespace,
            name: self.name.clone(),
            namespace: None,
        }
    }
}

#[async_trait]
impl Resource for Namespace {
    type State = KubeObject;
    const TYPE_TOKEN: &'static str = "kubernetes:core/v1:Namespace";

    fn describe(&self) -> serde_json::Value {
        json!({ "metadata": { "name": self.name } })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<KubeObject> {
        let api = self.api.resolve().await?;
        apply_and_await(&api, urn, self.object(), ObjectAnnotations::default()).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<KubeObject>> {
        let api = self.api.resolve().await?;
        api.get(&self.object_ref()).await
    }

    async fn delete(&self, urn: &Urn, state: &KubeObject) -> Result<Deletion> {
        let api = self.api.resolve().await?;
        delete_object(&api, urn, &state.object_ref()).await?;
        Ok(Deletion::Deleted)
    }
}
