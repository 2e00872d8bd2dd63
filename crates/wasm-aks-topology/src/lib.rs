//! The wasm-aks topology
//!
//! One declaration pass over a [`Stack`]: a resource group, an AKS cluster
//! with a WASI node pool, a container registry the kubelet identity may pull
//! from, the Spin demo image pushed into it, and the namespace, deployment
//! and service running that image under the `wasmtime-spin-v1` runtime class.
//!
//! Nothing is provisioned here; [`wasm_aks_engine::Engine`] does that.

#![deny(missing_docs)]

use std::sync::Arc;

use tracing::debug;
use wasm_aks_azure::models::PrincipalType;
use wasm_aks_azure::{
    cluster_kubeconfig, registry_credentials, role_definition, AgentPool, AgentPoolArgs,
    AgentPoolHandle, AzureProvider, ManagedCluster, ManagedClusterArgs, ManagedClusterHandle,
    Registry, RegistryArgs, RegistryHandle, ResourceGroup, ResourceGroupArgs,
    ResourceGroupHandle, RoleAssignment, RoleAssignmentArgs, RoleAssignmentHandle,
};
use wasm_aks_common::{Result, Secret};
use wasm_aks_engine::{Output, ResourceOptions, Stack};
use wasm_aks_image::{DockerBuild, Image, ImageArgs, ImageBuilder, ImageHandle, RegistryLogin};
use wasm_aks_kubernetes::{
    AppLabels, ContainerArgs, Deployment, DeploymentArgs, DeploymentHandle, KubeConnector,
    Namespace, NamespaceArgs, NamespaceHandle, ObjectAnnotations, Provider, ProviderArgs,
    ProviderHandle, Service, ServiceArgs, ServiceHandle, ServicePortArgs,
};

pub mod config;

pub use config::TopologyConfig;

/// Export: name of the resource group
pub const EXPORT_RESOURCE_GROUP_NAME: &str = "resourceGroupName";
/// Export: name of the cluster
pub const EXPORT_CLUSTER_NAME: &str = "wasmClusterName";
/// Export: name of the WASI agent pool
pub const EXPORT_AGENT_POOL_NAME: &str = "wasmAgentPoolName";
/// Export: the cluster kubeconfig (secret)
pub const EXPORT_KUBECONFIG: &str = "kubeconfig";

/// Backends the topology's nodes provision through
#[derive(Clone)]
pub struct Providers {
    /// Azure Resource Manager
    pub azure: AzureProvider,
    /// Image build and push
    pub images: Arc<dyn ImageBuilder>,
    /// Builds Kubernetes clients from the new cluster's kubeconfig
    pub kube: Arc<dyn KubeConnector>,
}

/// Handles of every declared node
pub struct Topology {
    /// Resource group
    pub resource_group: ResourceGroupHandle,
    /// Managed cluster
    pub cluster: ManagedClusterHandle,
    /// WASI agent pool
    pub agent_pool: AgentPoolHandle,
    /// Container registry
    pub registry: RegistryHandle,
    /// AcrPull for the kubelet identity on the registry
    pub role_assignment: RoleAssignmentHandle,
    /// Application image
    pub image: ImageHandle,
    /// Kubernetes provider bound to the cluster's kubeconfig
    pub kube_provider: ProviderHandle,
    /// Application namespace
    pub namespace: NamespaceHandle,
    /// Application deployment
    pub deployment: DeploymentHandle,
    /// Load balancer in front of the deployment
    pub service: ServiceHandle,
    /// Cluster kubeconfig, also exported
    pub kubeconfig: Output<Secret<String>>,
    /// Labels selecting the application's pods
    pub app_labels: Arc<AppLabels>,
}

/// Declare the whole topology on `stack`
pub fn declare(stack: &Stack, providers: &Providers, config: &TopologyConfig) -> Result<Topology> {
    let names = &config.names;
    let azure = &providers.azure;

    let resource_group = ResourceGroup::declare(
        stack,
        &names.resource_group,
        ResourceGroupArgs {
            resource_group_name: config.resource_group_name.as_str().into(),
            location: None,
        },
        azure,
        ResourceOptions::default(),
    )?;

    let cluster = ManagedCluster::declare(
        stack,
        &names.cluster,
        ManagedClusterArgs {
            resource_group_name: resource_group.name.clone(),
            resource_name: config.cluster.name.as_str().into(),
            location: None,
            kubernetes_version: config.cluster.kubernetes_version.clone(),
            identity_type: Default::default(),
            dns_prefix: config.cluster.dns_prefix.clone(),
            agent_pool_profiles: vec![config.cluster.system_pool.clone()],
        },
        azure,
        ResourceOptions::default(),
    )?;

    let agent_pool = AgentPool::declare(
        stack,
        &names.agent_pool,
        AgentPoolArgs {
            agent_pool_name: config.wasm_pool.name.as_str().into(),
            resource_group_name: resource_group.name.clone(),
            resource_name: cluster.name.clone(),
            workload_runtime: Some(config.wasm_pool.workload_runtime),
            count: config.wasm_pool.count,
            vm_size: config.wasm_pool.vm_size.clone(),
            os_type: config.wasm_pool.os_type,
        },
        azure,
        ResourceOptions::default(),
    )?;

    let kubeconfig = cluster_kubeconfig(azure, &resource_group.name, &cluster.name);

    stack.export(EXPORT_RESOURCE_GROUP_NAME, resource_group.name.clone());
    stack.export(EXPORT_CLUSTER_NAME, cluster.name.clone());
    stack.export(EXPORT_AGENT_POOL_NAME, agent_pool.name.clone());
    stack.export(EXPORT_KUBECONFIG, kubeconfig.clone());

    let registry = Registry::declare(
        stack,
        &names.registry,
        RegistryArgs {
            resource_group_name: resource_group.name.clone(),
            registry_name: config.registry.name.as_str().into(),
            location: Some(resource_group.location.clone()),
            sku: config.registry.sku,
            admin_user_enabled: config.registry.admin_user_enabled,
        },
        azure,
        ResourceOptions::default(),
    )?;

    let credentials = registry_credentials(azure, &resource_group.name, &registry.name);
    let pull_role = role_definition(azure, &config.pull_role_definition_id);

    // cluster, pool and registry must all exist before anything uses them
    let infrastructure = [&cluster.urn, &agent_pool.urn, &registry.urn];

    let role_assignment = RoleAssignment::declare(
        stack,
        &names.role_assignment,
        RoleAssignmentArgs {
            principal_id: cluster.kubelet_object_id(),
            principal_type: PrincipalType::ServicePrincipal,
            role_definition_id: pull_role,
            scope: registry.id.clone(),
        },
        azure,
        ResourceOptions::default().depends_on(infrastructure),
    )?;

    let image_config = config.image.clone();
    let image = Image::declare(
        stack,
        &names.image,
        ImageArgs {
            image_name: registry
                .name
                .apply(move |registry| Ok(image_config.reference(&registry))),
            build: DockerBuild {
                context: config.image.context.clone(),
                dockerfile: config.image.dockerfile.clone(),
                platform: config.image.platform.clone(),
                builder_version: config.image.builder_version,
            },
            registry: RegistryLogin {
                server: registry
                    .name
                    .apply(|registry| Ok(config::login_server(&registry))),
                username: credentials.apply(|c| Ok(c.username)),
                password: credentials.apply(|c| Ok(c.password)),
            },
        },
        providers.images.clone(),
        ResourceOptions::default().depends_on(infrastructure),
    )?;

    let kube_provider = Provider::declare(
        stack,
        &names.kube_provider,
        ProviderArgs {
            kubeconfig: kubeconfig.clone(),
        },
        providers.kube.clone(),
        ResourceOptions::default().depends_on(infrastructure),
    )?;

    let workload = &config.workload;
    let annotations = ObjectAnnotations {
        skip_await: workload.skip_await,
    };

    let namespace = Namespace::declare(
        stack,
        &names.namespace,
        NamespaceArgs {
            name: workload.namespace.clone(),
        },
        &kube_provider,
        ResourceOptions::default().depends_on([&image.urn]),
    )?;

    let app_labels = Arc::new(AppLabels::new(workload.app.clone()));
    let deployment = Deployment::declare(
        stack,
        &names.deployment,
        DeploymentArgs {
            name: workload.app.clone(),
            namespace: namespace.name.clone(),
            annotations,
            selector: app_labels.clone(),
            replicas: workload.replicas,
            runtime_class_name: workload.runtime_class_name.clone(),
            containers: vec![ContainerArgs {
                name: workload.app.clone(),
                image: image.image_name.clone(),
                command: workload.command.clone(),
                resources: workload.resources.clone(),
            }],
        },
        &kube_provider,
        ResourceOptions::default().depends_on(infrastructure.into_iter().chain([&image.urn])),
    )?;

    let service = Service::declare(
        stack,
        &names.service,
        ServiceArgs {
            name: workload.app.clone(),
            namespace: namespace.name.clone(),
            annotations,
            service_type: workload.service_type,
            ports: vec![ServicePortArgs {
                name: workload.port_name.clone(),
                protocol: workload.protocol,
                port: workload.port,
                target_port: workload.target_port,
            }],
            selector: deployment.selector.clone(),
        },
        &kube_provider,
        ResourceOptions::default().depends_on([&image.urn]),
    )?;

    debug!(
        stack = %stack.name(),
        resources = stack.graph().len(),
        "Declared topology"
    );

    Ok(Topology {
        resource_group,
        cluster,
        agent_pool,
        registry,
        role_assignment,
        image,
        kube_provider,
        namespace,
        deployment,
        service,
        kubeconfig,
        app_labels,
    })
}

#[cfg(test)]
mod tests;
