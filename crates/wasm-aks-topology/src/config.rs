//! Literal inputs of the topology
//!
//! Everything the topology declares is fixed here. Engine settings such as
//! the subscription or default region are not topology inputs and live in
//! the CLI.

use std::path::PathBuf;

use wasm_aks_azure::models::{AgentPoolMode, AgentPoolProfile, OsType, SkuName, WorkloadRuntime};
use wasm_aks_image::BuilderVersion;
use wasm_aks_kubernetes::{ComputeResources, Protocol, ResourceQuantities, ServiceType};

/// Logical node names, as they appear in URNs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeNames {
    /// Resource group node
    pub resource_group: String,
    /// Managed cluster node
    pub cluster: String,
    /// WASI agent pool node
    pub agent_pool: String,
    /// Registry node
    pub registry: String,
    /// AcrPull role assignment node
    pub role_assignment: String,
    /// Image node
    pub image: String,
    /// Kubernetes provider node
    pub kube_provider: String,
    /// Namespace node
    pub namespace: String,
    /// Deployment node
    pub deployment: String,
    /// Service node
    pub service: String,
}

impl Default for NodeNames {
    fn default() -> Self {
        Self {
            resource_group: "wasm-aks-rg".to_string(),
            cluster: "wasm-aks-cluster".to_string(),
            agent_pool: "wasm-aks-agentpool".to_string(),
            registry: "wasm-aks-registry".to_string(),
            role_assignment: "wasm-aks-role-assignment".to_string(),
            image: "wasm-spin-demo-image".to_string(),
            kube_provider: "wasm-aks-provider".to_string(),
            namespace: "wasm-aks-namespace".to_string(),
            deployment: "wasm-aks-deployment".to_string(),
            service: "wasm-aks-service".to_string(),
        }
    }
}

/// The WASI-capable node pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WasmPoolConfig {
    /// Pool name
    pub name: String,
    /// Workload runtime of the pool's nodes
    pub workload_runtime: WorkloadRuntime,
    /// Node count
    pub count: i32,
    /// VM size
    pub vm_size: String,
    /// Node OS
    pub os_type: OsType,
}

/// The cluster and its system pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Cluster name
    pub name: String,
    /// Kubernetes version
    pub kubernetes_version: String,
    /// API server DNS prefix
    pub dns_prefix: String,
    /// Inline system pool
    pub system_pool: AgentPoolProfile,
}

/// The container registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Registry name; also the first label of its login server
    pub name: String,
    /// Tier
    pub sku: SkuName,
    /// Whether the admin user (used to push the image) is enabled
    pub admin_user_enabled: bool,
}

/// The application image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageConfig {
    /// Repository inside the registry
    pub repository: String,
    /// Tag
    pub tag: String,
    /// Build context; an external checkout of the Spin app, not shipped here
    pub context: PathBuf,
    /// Dockerfile path
    pub dockerfile: PathBuf,
    /// Target platform
    pub platform: String,
    /// Docker builder
    pub builder_version: BuilderVersion,
}

/// The application workload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkloadConfig {
    /// Namespace
    pub namespace: String,
    /// Name of the deployment, its container and service, and the `app` label
    pub app: String,
    /// Replicas
    pub replicas: i32,
    /// Runtime class running the WASI workload
    pub runtime_class_name: String,
    /// Container entrypoint
    pub command: Vec<String>,
    /// Container requests and limits
    pub resources: ComputeResources,
    /// Whether applies return without waiting for readiness
    pub skip_await: bool,
    /// Service exposure
    pub service_type: ServiceType,
    /// Service port name
    pub port_name: String,
    /// Service port protocol
    pub protocol: Protocol,
    /// External port
    pub port: i32,
    /// Container port
    pub target_port: i32,
}

/// Every literal the topology declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyConfig {
    /// Logical node names
    pub names: NodeNames,
    /// Resource group name
    pub resource_group_name: String,
    /// Cluster
    pub cluster: ClusterConfig,
    /// WASI pool
    pub wasm_pool: WasmPoolConfig,
    /// Registry
    pub registry: RegistryConfig,
    /// GUID of the role granted to the kubelet identity on the registry
    pub pull_role_definition_id: String,
    /// Image
    pub image: ImageConfig,
    /// Kubernetes workload
    pub workload: WorkloadConfig,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            names: NodeNames::default(),
            resource_group_name: "wasm-aks-rg".to_string(),
            cluster: ClusterConfig {
                name: "wasm-aks-cluster".to_string(),
                kubernetes_version: "1.25.5".to_string(),
                dns_prefix: "wasm-aks-cluster".to_string(),
                system_pool: AgentPoolProfile {
                    name: "agentpool".to_string(),
                    mode: AgentPoolMode::System,
                    os_disk_size_gb: 30,
                    os_type: OsType::Linux,
                    count: 1,
                    vm_size: "Standard_B4ms".to_string(),
                },
            },
            wasm_pool: WasmPoolConfig {
                name: "wasmpool".to_string(),
                workload_runtime: WorkloadRuntime::WasmWasi,
                count: 1,
                vm_size: "Standard_B4ms".to_string(),
                os_type: OsType::Linux,
            },
            registry: RegistryConfig {
                name: "wasmaksregistry".to_string(),
                sku: SkuName::Standard,
                admin_user_enabled: true,
            },
            pull_role_definition_id: wasm_aks_azure::ACR_PULL_ROLE_DEFINITION_ID.to_string(),
            image: ImageConfig {
                repository: "aks-wasm-spin-demo".to_string(),
                tag: "latest".to_string(),
                context: PathBuf::from("aks-spin-demo"),
                dockerfile: PathBuf::from("aks-spin-demo/Dockerfile"),
                platform: "linux/amd64".to_string(),
                builder_version: BuilderVersion::BuilderBuildKit,
            },
            workload: WorkloadConfig {
                namespace: "wasm-demo".to_string(),
                app: "wasm-demo".to_string(),
                replicas: 1,
                runtime_class_name: "wasmtime-spin-v1".to_string(),
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
                skip_await: true,
                service_type: ServiceType::LoadBalancer,
                port_name: "http".to_string(),
                protocol: Protocol::Tcp,
                port: 8080,
                target_port: 80,
            },
        }
    }
}

impl ImageConfig {
    /// Fully qualified image reference in registry `registry`
    pub fn reference(&self, registry: &str) -> String {
        format!("{}/{}:{}", login_server(registry), self.repository, self.tag)
    }
}

/// Login server host of an Azure container registry
pub fn login_server(registry: &str) -> String {
    format!("{}.azurecr.io", registry)
}
