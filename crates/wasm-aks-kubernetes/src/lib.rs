//! Kubernetes provider for wasm-aks
//!
//! A [`Provider`] node turns a cluster's kubeconfig into an API handle;
//! namespaces, deployments and services are server-side applied through
//! that handle and, unless annotated with skip-await, waited on until the
//! cluster reports them ready.

#![deny(missing_docs)]

pub mod client;
pub mod labels;
pub mod objects;
pub mod resources;

pub use client::{KubeApi, KubeConnector, KubeRsApi, KubeRsConnector};
pub use labels::{AppLabels, ObjectAnnotations, SKIP_AWAIT_ANNOTATION};
pub use objects::{KubeObject, ObjectKind, ObjectRef};
pub use resources::{
    ComputeResources, ContainerArgs, Deployment, DeploymentArgs, DeploymentHandle, Namespace,
    NamespaceArgs, NamespaceHandle, Protocol, Provider, ProviderArgs, ProviderHandle,
    ResourceQuantities, Service, ServiceArgs, ServiceHandle, ServicePortArgs, ServiceType,
};
