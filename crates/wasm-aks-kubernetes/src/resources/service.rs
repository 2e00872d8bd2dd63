use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use serde::Serialize;
use serde_json::json;
use tracing::info;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::{apply_and_await, delete_object, ProviderHandle};
use crate::client::KubeApi;
use crate::labels::{AppLabels, ObjectAnnotations};
use crate::objects::{KubeObject, ObjectKind, ObjectRef};

/// How a service is exposed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ServiceType {
    /// Cluster-internal virtual IP
    ClusterIP,
    /// A port on every node
    NodePort,
    /// An external load balancer
    LoadBalancer,
}

impl ServiceType {
    fn as_str(self) -> &'static str {
        match self {
            Self::ClusterIP => "ClusterIP",
            Self::NodePort => "NodePort",
            Self::LoadBalancer => "LoadBalancer",
        }
    }
}

/// Transport protocol of a port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP
    Tcp,
    /// UDP
    Udp,
}

impl Protocol {
    fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "TCP",
            Self::Udp => "UDP",
        }
    }
}

/// A port a service exposes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePortArgs {
    /// Port name
    pub name: String,
    /// Transport protocol
    pub protocol: Protocol,
    /// Port the service listens on
    pub port: i32,
    /// Container port traffic is forwarded to
    pub target_port: i32,
}

/// Inputs of a service
pub struct ServiceArgs {
    /// metadata.name
    pub name: String,
    /// Namespace; taking it from a namespace handle orders the two
    pub namespace: Output<String>,
    /// Annotations
    pub annotations: ObjectAnnotations,
    /// Exposure type
    pub service_type: ServiceType,
    /// Exposed ports
    pub ports: Vec<ServicePortArgs>,
    /// Pods to route to; take this from [`super::DeploymentHandle::selector`]
    pub selector: Output<Arc<AppLabels>>,
}

/// A Kubernetes service
pub struct Service {
    api: Output<Arc<dyn KubeApi>>,
    name: String,
    namespace: Output<String>,
    annotations: ObjectAnnotations,
    service_type: ServiceType,
    ports: Vec<ServicePortArgs>,
    selector: Output<Arc<AppLabels>>,
}

/// Outputs of a declared service
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    /// Node identity
    pub urn: Urn,
    /// Service name, available once applied
    pub name: Output<String>,
    /// Selector the service was applied with
    pub selector: Output<Arc<AppLabels>>,
}

impl Service {
    /// Declare a service on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: ServiceArgs,
        provider: &ProviderHandle,
        opts: ResourceOptions,
    ) -> Result<ServiceHandle> {
        let inputs = dependencies([
            provider.api.dependencies(),
            args.namespace.dependencies(),
            args.selector.dependencies(),
        ]);

        let resource = Self {
            api: provider.api.clone(),
            name: args.name,
            namespace: args.namespace,
            annotations: args.annotations,
            service_type: args.service_type,
            ports: args.ports,
            selector: args.selector.clone(),
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        let selector = args.selector;
        Ok(ServiceHandle {
            name: registered.state.apply(|s| Ok(s.name().to_string())),
            selector: registered
                .state
                .apply_async(move |_| async move { selector.resolve().await }),
            urn: registered.urn,
        })
    }

    async fn object(&self) -> Result<KubeObject> {
        let namespace = self.namespace.resolve().await?;
        let selector = self.selector.resolve().await?;

        let ports = self
            .ports
            .iter()
            .map(|p| corev1::ServicePort {
                name: Some(p.name.clone()),
                protocol: Some(p.protocol.as_str().to_string()),
                port: p.port,
                target_port: Some(IntOrString::Int(p.target_port)),
                ..Default::default()
            })
            .collect();

        Ok(KubeObject::Service(corev1::Service {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace),
                annotations: self.annotations.to_map(),
                ..Default::default()
            },
            spec: Some(corev1::ServiceSpec {
                type_: Some(self.service_type.as_str().to_string()),
                ports: Some(ports),
                selector: Some(selector.to_map()),
                ..Default::default()
            }),
            status: None,
        }))
    }

    async fn object_ref(&self) -> Result<ObjectRef> {
        Ok(ObjectRef {
            kind: ObjectKind::Service,
            name: self.name.clone(),
            namespace: Some(self.namespace.resolve().await?),
        })
    }
}

#[async_trait]
impl Resource for Service {
    type State = KubeObject;
    const TYPE_TOKEN: &'static str = "kubernetes:core/v1:Service";

    fn describe(&self) -> serde_json::Value {
        let ports: Vec<_> = self
            .ports
            .iter()
            .map(|p| {
                json!({
                    "name": p.name,
                    "protocol": p.protocol,
                    "port": p.port,
                    "targetPort": p.target_port,
                })
            })
            .collect();
        let selector = match self.selector.known_value() {
            Some(labels) => json!(labels.to_map()),
            None => json!(wasm_aks_engine::COMPUTED),
        };

        json!({
            "metadata": {
                "name": self.name,
                "namespace": self.namespace.describe(),
                "annotations": self.annotations.to_map(),
            },
            "spec": {
                "type": self.service_type,
                "ports": ports,
                "selector": selector,
            },
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<KubeObject> {
        let api = self.api.resolve().await?;
        let object = self.object().await?;
        info!(
            urn = %urn,
            service = %object.object_ref(),
            service_type = self.service_type.as_str(),
            "Applying service"
        );
        apply_and_await(&api, urn, object, self.annotations).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<KubeObject>> {
        let api = self.api.resolve().await?;
        api.get(&self.object_ref().await?).await
    }

    async fn delete(&self, urn: &Urn, state: &KubeObject) -> Result<Deletion> {
        let api = self.api.resolve().await?;
        delete_object(&api, urn, &state.object_ref()).await?;
        Ok(Deletion::Deleted)
    }
}
