//! Kubernetes objects as engine nodes
//!
//! Every object is applied through the API handle published by a
//! [`Provider`] node, so it depends on that provider and, through it, on the
//! cluster whose kubeconfig the provider was built from.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, trace};
use wasm_aks_common::poll::poll_until;
use wasm_aks_common::Result;
use wasm_aks_engine::Urn;

use crate::client::KubeApi;
use crate::labels::ObjectAnnotations;
use crate::objects::{KubeObject, ObjectRef};

mod deployment;
mod namespace;
mod provider;
mod service;

pub use deployment::{
    ComputeResources, ContainerArgs, Deployment, DeploymentArgs, DeploymentHandle,
    ResourceQuantities,
};
pub use namespace::{Namespace, NamespaceArgs, NamespaceHandle};
pub use provider::{Provider, ProviderArgs, ProviderHandle};
pub use service::{Protocol, Service, ServiceArgs, ServiceHandle, ServicePortArgs, ServiceType};

/// How long an applied object may take to become ready
pub const READY_TIMEOUT: Duration = Duration::from_secs(600);
/// How often readiness is re-checked
pub const READY_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Apply `object` and, unless skip-await is set, wait until it is ready
pub(crate) async fn apply_and_await(
    api: &Arc<dyn KubeApi>,
    urn: &Urn,
    object: KubeObject,
    annotations: ObjectAnnotations,
) -> Result<KubeObject> {
    let applied = api.apply(&object).await?;
    let target = applied.object_ref();

    if annotations.skip_await {
        debug!(urn = %urn, object = %target, "Applied, skipping readiness wait");
        return Ok(applied);
    }
    if applied.is_ready() {
        return Ok(applied);
    }

    info!(urn = %urn, object = %target, "Waiting for object to become ready");
    let timeout_msg = format!("Timeout waiting for {} to become ready", target);
    let api = api.clone();
    poll_until(READY_TIMEOUT, READY_POLL_INTERVAL, timeout_msg, move || {
        let api = api.clone();
        let target = target.clone();
        async move {
            match api.get(&target).await? {
                Some(current) if current.is_ready() => Ok(Some(current)),
                Some(_) => Ok(None),
                None => {
                    trace!(object = %target, "Not found yet");
                    Ok(None)
                }
            }
        }
    })
    .await
}

/// Delete an object, tolerating that it is already gone
pub(crate) async fn delete_object(api: &Arc<dyn KubeApi>, urn: &Urn, target: &ObjectRef) -> Result<()> {
    info!(urn = %urn, object = %target, "Deleting");
    api.delete(target).await
}
