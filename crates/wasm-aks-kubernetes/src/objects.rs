//! The Kubernetes objects wasm-aks manages

use std::fmt;

use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use serde::Serialize;

/// Kind of a managed object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ObjectKind {
    /// core/v1 Namespace
    Namespace,
    /// apps/v1 Deployment
    Deployment,
    /// core/v1 Service
    Service,
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Namespace => "Namespace",
            Self::Deployment => "Deployment",
            Self::Service => "Service",
        };
        f.write_str(kind)
    }
}

/// Address of an object in the cluster
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Object kind
    pub kind: ObjectKind,
    /// metadata.name
    pub name: String,
    /// metadata.namespace, for namespaced kinds
    pub namespace: Option<String>,
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A managed object, as applied or as observed
#[derive(Debug, Clone, PartialEq)]
pub enum KubeObject {
    /// A namespace
    Namespace(corev1::Namespace),
    /// A deployment
    Deployment(appsv1::Deployment),
    /// A service
    Service(corev1::Service),
}

impl KubeObject {
    /// Kind of this object
    pub fn kind(&self) -> ObjectKind {
        match self {
            Self::Namespace(_) => ObjectKind::Namespace,
            Self::Deployment(_) => ObjectKind::Deployment,
            Self::Service(_) => ObjectKind::Service,
        }
    }

    fn metadata(&self) -> &k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta {
        match self {
            Self::Namespace(o) => &o.metadata,
            Self::Deployment(o) => &o.metadata,
            Self::Service(o) => &o.metadata,
        }
    }

    /// metadata.name
    pub fn name(&self) -> &str {
        self.metadata().name.as_deref().unwrap_or_default()
    }

    /// metadata.namespace
    pub fn namespace(&self) -> Option<&str> {
        self.metadata().namespace.as_deref()
    }

    /// Address of this object
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            kind: self.kind(),
            name: self.name().to_string(),
            namespace: self.namespace().map(str::to_string),
        }
    }

    /// Whether the cluster reports the object as usable
    ///
    /// * Namespace: phase is `Active` (or not reported yet)
    /// * Deployment: the controller has observed the current generation and
    ///   the desired number of replicas is available
    /// * Service: a `LoadBalancer` service has an ingress address; other
    ///   types are ready once they exist
    pub fn is_ready(&self) -> bool {
        match self {
            Self::Namespace(ns) => ns
                .status
                .as_ref()
                .and_then(|s| s.phase.as_deref())
                .map_or(true, |phase| phase == "Active"),
            Self::Deployment(deploy) => deployment_ready(deploy),
            Self::Service(svc) => service_ready(svc),
        }
    }
}

fn deployment_ready(deploy: &appsv1::Deployment) -> bool {
    let Some(status) = deploy.status.as_ref() else {
        return false;
    };

    let generation = deploy.metadata.generation.unwrap_or(0);
    if status.observed_generation.unwrap_or(0) < generation {
        return false;
    }

    let desired = deploy
        .spec
        .as_ref()
        .and_then(|s| s.replicas)
        .unwrap_or(1);
    status.available_replicas.unwrap_or(0) >= desired
}

fn service_ready(svc: &corev1::Service) -> bool {
    let is_load_balancer = svc
        .spec
        .as_ref()
        .and_then(|s| s.type_.as_deref())
        == Some("LoadBalancer");
    if !is_load_balancer {
        return true;
    }

    svc.status
        .as_ref()
        .and_then(|s| s.load_balancer.as_ref())
        .and_then(|lb| lb.ingress.as_ref())
        .is_some_and(|ingress| !ingress.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    fn meta(name: &str, namespace: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: namespace.map(str::to_string),
            generation: Some(2),
            ..Default::default()
        }
    }

    fn deployment(observed: i64, available: i32) -> KubeObject {
        KubeObject::Deployment(appsv1::Deployment {
            metadata: meta("wasm-demo", Some("wasm-demo")),
            spec: Some(appsv1::DeploymentSpec {
                replicas: Some(1),
                ..Default::default()
            }),
            status: Some(appsv1::DeploymentStatus {
                observed_generation: Some(observed),
                available_replicas: Some(available),
                ..Default::default()
            }),
        })
    }

    fn load_balancer(ingress: Option<Vec<corev1::LoadBalancerIngress>>) -> KubeObject {
        KubeObject::Service(corev1::Service {
            metadata: meta("wasm-demo", Some("wasm-demo")),
            spec: Some(corev1::ServiceSpec {
                type_: Some("LoadBalancer".to_string()),
                ..Default::default()
            }),
            status: Some(corev1::ServiceStatus {
                load_balancer: Some(corev1::LoadBalancerStatus { ingress }),
                ..Default::default()
            }),
        })
    }

    #[test]
    fn test_object_ref_display() {
        let ns = KubeObject::Namespace(corev1::Namespace {
            metadata: meta("wasm-demo", None),
            ..Default::default()
        });
        assert_eq!(ns.object_ref().to_string(), "Namespace wasm-demo");
        assert_eq!(
            deployment(2, 1).object_ref().to_string(),
            "Deployment wasm-demo/wasm-demo"
        );
        assert_eq!(ns.object_ref().namespace, None);
    }

    #[test]
    fn test_deployment_readiness() {
        assert!(deployment(2, 1).is_ready());
        // stale status from the previous generation
        assert!(!deployment(1, 1).is_ready());
        assert!(!deployment(2, 0).is_ready());

        let no_status = KubeObject::Deployment(appsv1::Deployment {
            metadata: meta("wasm-demo", Some("wasm-demo")),
            ..Default::default()
        });
        assert!(!no_status.is_ready());
    }

    #[test]
    fn test_load_balancer_needs_ingress() {
        assert!(!load_balancer(None).is_ready());
        assert!(!load_balancer(Some(vec![])).is_ready());
        assert!(load_balancer(Some(vec![corev1::LoadBalancerIngress {
            ip: Some("20.0.0.1".to_string()),
            ..Default::default()
        }]))
        .is_ready());

        let cluster_ip = KubeObject::Service(corev1::Service {
            metadata: meta("internal", Some("wasm-demo")),
            ..Default::default()
        });
        assert!(cluster_ip.is_ready());
    }

    #[test]
    fn test_namespace_readiness() {
        let terminating = KubeObject::Namespace(corev1::Namespace {
            metadata: meta("wasm-demo", None),
            status: Some(corev1::NamespaceStatus {
                phase: Some("Terminating".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        assert!(!terminating.is_ready());
    }
}
