use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use serde_json::json;
use tracing::info;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::{apply_and_await, delete_object, ProviderHandle};
use crate::client::KubeApi;
use crate::labels::{AppLabels, ObjectAnnotations};
use crate::objects::{KubeObject, ObjectKind, ObjectRef};

/// CPU and memory quantities (e.g. "10m", "64Mi")
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceQuantities {
    /// CPU quantity
    pub cpu: String,
    /// Memory quantity
    pub memory: String,
}

impl ResourceQuantities {
    fn to_map(&self) -> BTreeMap<String, Quantity> {
        BTreeMap::from([
            ("cpu".to_string(), Quantity(self.cpu.clone())),
            ("memory".to_string(), Quantity(self.memory.clone())),
        ])
    }
}

/// Requests and limits of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeResources {
    /// Scheduling requests
    pub requests: ResourceQuantities,
    /// Hard limits
    pub limits: ResourceQuantities,
}

/// A container of the pod template
pub struct ContainerArgs {
    /// Container name
    pub name: String,
    /// Image reference; usually the output of a pushed image
    pub image: Output<String>,
    /// Entrypoint override
    pub command: Vec<String>,
    /// Requests and limits
    pub resources: ComputeResources,
}

/// Inputs of a deployment
pub struct DeploymentArgs {
    /// metadata.name
    pub name: String,
    /// Namespace; taking it from a namespace handle orders the two
    pub namespace: Output<String>,
    /// Annotations
    pub annotations: ObjectAnnotations,
    /// Selector labels, also stamped on the pod template
    pub selector: Arc<AppLabels>,
    /// Desired replicas
    pub replicas: i32,
    /// Runtime class the pods run under
    pub runtime_class_name: String,
    /// Pod containers
    pub containers: Vec<ContainerArgs>,
}

/// A Kubernetes deployment
pub struct Deployment {
    api: Output<Arc<dyn KubeApi>>,
    name: String,
    namespace: Output<String>,
    annotations: ObjectAnnotations,
    selector: Arc<AppLabels>,
    replicas: i32,
    runtime_class_name: String,
    containers: Vec<ContainerArgs>,
}

/// Outputs of a declared deployment
#[derive(Debug, Clone)]
pub struct DeploymentHandle {
    /// Node identity
    pub urn: Urn,
    /// Deployment name, available once applied
    pub name: Output<String>,
    /// The selector the deployment was applied with
    ///
    /// This is the same `Arc` passed in [`DeploymentArgs::selector`];
    /// consumers that select the deployment's pods should take it from here.
    pub selector: Output<Arc<AppLabels>>,
}

impl Deployment {
    /// Declare a deployment on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: DeploymentArgs,
        provider: &ProviderHandle,
        opts: ResourceOptions,
    ) -> Result<DeploymentHandle> {
        let inputs = dependencies(
            [provider.api.dependencies(), args.namespace.dependencies()]
                .into_iter()
                .chain(args.containers.iter().map(|c| c.image.dependencies())),
        );

        let selector = args.selector.clone();
        let resource = Self {
            api: provider.api.clone(),
            name: args.name,
            namespace: args.namespace,
            annotations: args.annotations,
            selector: args.selector,
            replicas: args.replicas,
            runtime_class_name: args.runtime_class_name,
            containers: args.containers,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(DeploymentHandle {
            name: registered.state.apply(|s| Ok(s.name().to_string())),
            selector: registered.state.apply(move |_| Ok(selector)),
            urn: registered.urn,
        })
    }

    async fn object(&self) -> Result<KubeObject> {
        let namespace = self.namespace.resolve().await?;
        let mut containers = Vec::with_capacity(self.containers.len());
        for container in &self.containers {
            containers.push(corev1::Container {
                name: container.name.clone(),
                image: Some(container.image.resolve().await?),
                command: Some(container.command.clone()),
                resources: Some(corev1::ResourceRequirements {
                    requests: Some(container.resources.requests.to_map()),
                    limits: Some(container.resources.limits.to_map()),
                    ..Default::default()
                }),
                ..Default::default()
            });
        }

        let labels = self.selector.to_map();
        Ok(KubeObject::Deployment(appsv1::Deployment {
            metadata: ObjectMeta {
                name: Some(self.name.clone()),
                namespace: Some(namespace),
                annotations: self.annotations.to_map(),
                ..Default::default()
            },
            spec: Some(appsv1::DeploymentSpec {
                replicas: Some(self.replicas),
                selector: LabelSelector {
                    match_labels: Some(labels.clone()),
                    ..Default::default()
                },
                template: corev1::PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(labels),
                        ..Default::default()
                    }),
                    spec: Some(corev1::PodSpec {
                        runtime_class_name: Some(self.runtime_class_name.clone()),
                        containers,
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            status: None,
        }))
    }

    async fn object_ref(&self) -> Result<ObjectRef> {
        Ok(ObjectRef {
            kind: ObjectKind::Deployment,
            name: self.name.clone(),
            namespace: Some(self.namespace.resolve().await?),
        })
    }
}

#[async_trait]
impl Resource for Deployment {
    type State = KubeObject;
    const TYPE_TOKEN: &'static str = "kubernetes:apps/v1:Deployment";

    fn describe(&self) -> serde_json::Value {
        let containers: Vec<_> = self
            .containers
            .iter()
            .map(|c| {
                json!({
                    "name": c.name,
                    "image": c.image.describe(),
                    "command": c.command,
                    "resources": {
                        "requests": { "cpu": c.resources.requests.cpu, "memory": c.resources.requests.memory },
                        "limits": { "cpu": c.resources.limits.cpu, "memory": c.resources.limits.memory },
                    },
                })
            })
            .collect();

        json!({
            "metadata": {
                "name": self.name,
                "namespace": self.namespace.describe(),
                "annotations": self.annotations.to_map(),
            },
            "spec": {
                "replicas": self.replicas,
                "selector": { "matchLabels": self.selector.to_map() },
                "template": {
                    "metadata": { "labels": self.selector.to_map() },
                    "spec": {
                        "runtimeClassName": self.runtime_class_name,
                        "containers": containers,
                    },
                },
            },
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<KubeObject> {
        let api = self.api.resolve().await?;
        let object = self.object().await?;
        info!(
            urn = %urn,
            deployment = %object.object_ref(),
            runtime_class = %self.runtime_class_name,
            replicas = self.replicas,
            "Applying deployment"
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

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::client::MockKubeApi;
    use crate::resources::testing::with_available;

    fn container(image: Output<String>) -> ContainerArgs {
        ContainerArgs {
            name: "wasm-demo".to_string(),
            image,
            command: vec!["/".to_string()],
            resources: ComputeResources {
                requests: ResourceQuantities {
                    cpu: "10m".to_string(),
                    memory: "10Mi".to_string(),
                },
                limits: ResourceQuantities {
                    cpu: "500m".to_string(),
                    memory: "64Mi".to_string(),
                },
            },
        }
    }

    fn deployment(api: MockKubeApi, annotations: ObjectAnnotations) -> Deployment {
        Deployment {
            api: Output::known(Arc::new(api) as Arc<dyn KubeApi>),
            name: "wasm-demo".to_string(),
            namespace: "wasm-demo".into(),
            annotations,
            selector: Arc::new(AppLabels::new("wasm-demo")),
            replicas: 1,
            runtime_class_name: "wasmtime-spin-v1".to_string(),
            containers: vec![container(
                "wasmaksregistry.azurecr.io/aks-wasm-spin-demo:latest".into(),
            )],
        }
    }

    #[tokio::test]
    async fn test_rendered_deployment() {
        let object = deployment(MockKubeApi::new(), ObjectAnnotations::skip_await())
            .object()
            .await
            .unwrap();
        let KubeObject::Deployment(deploy) = object else {
            panic!("expected a deployment");
        };

        let annotations = deploy.metadata.annotations.unwrap();
        assert_eq!(
            annotations.get(crate::labels::SKIP_AWAIT_ANNOTATION).map(String::as_str),
            Some("true")
        );

        let spec = deploy.spec.unwrap();
        assert_eq!(spec.replicas, Some(1));
        let template_labels = spec.template.metadata.unwrap().labels.unwrap();
        assert_eq!(spec.selector.match_labels.unwrap(), template_labels);

        let pod = spec.template.spec.unwrap();
        assert_eq!(pod.runtime_class_name.as_deref(), Some("wasmtime-spin-v1"));
        let c = &pod.containers[0];
        assert_eq!(c.command.as_deref(), Some(&["/".to_string()][..]));
        let resources = c.resources.as_ref().unwrap();
        assert_eq!(
            resources.limits.as_ref().unwrap().get("memory"),
            Some(&Quantity("64Mi".to_string()))
        );
        assert_eq!(
            resources.requests.as_ref().unwrap().get("cpu"),
            Some(&Quantity("10m".to_string()))
        );
    }

    #[tokio::test]
    async fn test_skip_await_returns_after_apply() {
        let mut api = MockKubeApi::new();
        api.expect_apply().times(1).returning(|o| Ok(o.clone()));
        api.expect_get().never();

        let deploy = deployment(api, ObjectAnnotations::skip_await());
        let urn = Urn::new("dev", Deployment::TYPE_TOKEN, "wasm-aks-deployment");
        let state = deploy.create_or_update(&urn).await.unwrap();
        assert!(!state.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_waits_for_available_replicas() {
        let polls = Arc::new(AtomicU32::new(0));
        let p = polls.clone();

        let mut api = MockKubeApi::new();
        api.expect_apply().times(1).returning(|o| Ok(o.clone()));
        api.expect_get()
            .withf(|target| target.to_string() == "Deployment wasm-demo/wasm-demo")
            .returning(move |_| {
                let n = p.fetch_add(1, Ordering::SeqCst);
                let applied = KubeObject::Deployment(appsv1::Deployment {
                    metadata: ObjectMeta {
                        name: Some("wasm-demo".to_string()),
                        namespace: Some("wasm-demo".to_string()),
                        ..Default::default()
                    },
                    spec: Some(appsv1::DeploymentSpec {
                        replicas: Some(1),
                        ..Default::default()
                    }),
                    status: None,
                });
                Ok(Some(with_available(&applied, if n < 2 { 0 } else { 1 })))
            });

        let deploy = deployment(api, ObjectAnnotations::default());
        let urn = Urn::new("dev", Deployment::TYPE_TOKEN, "wasm-aks-deployment");
        let state = deploy.create_or_update(&urn).await.unwrap();
        assert!(state.is_ready());
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_declare_depends_on_image_and_namespace() {
        let stack = Stack::new("dev");
        let image_urn = Urn::new("dev", "docker:index:Image", "wasm-spin-demo-image");
        let image: Output<String> =
            Output::from_future(BTreeSet::from([image_urn]), async { Ok("img".to_string()) });

        let provider = ProviderHandle {
            urn: Urn::new("dev", "pulumi:providers:kubernetes", "p"),
            api: Output::known(Arc::new(MockKubeApi::new()) as Arc<dyn KubeApi>),
        };
        let result = Deployment::declare(
            &stack,
            "wasm-aks-deployment",
            DeploymentArgs {
                name: "wasm-demo".to_string(),
                namespace: "wasm-demo".into(),
                annotations: ObjectAnnotations::default(),
                selector: Arc::new(AppLabels::new("wasm-demo")),
                replicas: 1,
                runtime_class_name: "wasmtime-spin-v1".to_string(),
                containers: vec![container(image)],
            },
            &provider,
            ResourceOptions::default(),
        );

        // the image node was never declared on this stack
        let err = result.unwrap_err();
        assert!(err.to_string().contains("wasm-spin-demo-image"));
    }

    #[test]
    fn test_selector_follows_the_deployment() {
        let stack = Stack::new("dev");
        let selector = Arc::new(AppLabels::new("wasm-demo"));
        let provider = ProviderHandle {
            urn: Urn::new("dev", "pulumi:providers:kubernetes", "p"),
            api: Output::known(Arc::new(MockKubeApi::new()) as Arc<dyn KubeApi>),
        };
        let handle = Deployment::declare(
            &stack,
            "wasm-aks-deployment",
            DeploymentArgs {
                name: "wasm-demo".to_string(),
                namespace: "wasm-demo".into(),
                annotations: ObjectAnnotations::skip_await(),
                selector: selector.clone(),
                replicas: 1,
                runtime_class_name: "wasmtime-spin-v1".to_string(),
                containers: vec![],
            },
            &provider,
            ResourceOptions::default(),
        )
        .unwrap();

        assert!(handle.selector.dependencies().contains(&handle.urn));
        assert!(stack.graph().contains(&handle.urn));
    }
}
