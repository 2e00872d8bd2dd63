use super::*;

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use mockall::mock;
use wasm_aks_azure::models::{
    AgentPoolSpec, AgentPoolState, ClusterCredential, ManagedClusterSpec, ManagedClusterState,
    RegistryCredentialsResult, RegistryPassword, RegistrySpec, RegistryState, ResourceGroupSpec,
    ResourceGroupState, RoleAssignmentSpec, RoleAssignmentState, RoleDefinition,
    UserAssignedIdentity, WorkloadRuntime, KUBELET_IDENTITY,
};
use wasm_aks_azure::AzureApi;
use wasm_aks_common::Error;
use wasm_aks_engine::{Engine, Urn};
use wasm_aks_image::{ImageRequest, PushedImage};
use k8s_openapi::api::apps::v1 as appsv1;
use k8s_openapi::api::core::v1 as corev1;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use wasm_aks_kubernetes::{KubeApi, KubeObject, ObjectKind, ObjectRef};

// Local mocks: the automock-generated ones only exist inside their own
// crates' test builds
mock! {
    pub Azure {}

    #[async_trait::async_trait]
    impl AzureApi for Azure {
        async fn ensure_resource_group(&self, spec: &ResourceGroupSpec) -> Result<ResourceGroupState>;
        async fn get_resource_group(&self, name: &str) -> Result<Option<ResourceGroupState>>;
        async fn delete_resource_group(&self, name: &str) -> Result<()>;
        async fn ensure_managed_cluster(&self, spec: &ManagedClusterSpec) -> Result<ManagedClusterState>;
        async fn get_managed_cluster(&self, resource_group: &str, name: &str) -> Result<Option<ManagedClusterState>>;
        async fn delete_managed_cluster(&self, resource_group: &str, name: &str) -> Result<()>;
        async fn ensure_agent_pool(&self, spec: &AgentPoolSpec) -> Result<AgentPoolState>;
        async fn get_agent_pool(&self, resource_group: &str, cluster: &str, name: &str) -> Result<Option<AgentPoolState>>;
        async fn delete_agent_pool(&self, resource_group: &str, cluster: &str, name: &str) -> Result<()>;
        async fn ensure_registry(&self, spec: &RegistrySpec) -> Result<RegistryState>;
        async fn get_registry(&self, resource_group: &str, name: &str) -> Result<Option<RegistryState>>;
        async fn delete_registry(&self, resource_group: &str, name: &str) -> Result<()>;
        async fn ensure_role_assignment(&self, spec: &RoleAssignmentSpec) -> Result<RoleAssignmentState>;
        async fn get_role_assignment(&self, scope: &str, name: &str) -> Result<Option<RoleAssignmentState>>;
        async fn delete_role_assignment(&self, scope: &str, name: &str) -> Result<()>;
        async fn list_cluster_user_credentials(&self, resource_group: &str, cluster: &str) -> Result<Vec<ClusterCredential>>;
        async fn list_registry_credentials(&self, resource_group: &str, registry: &str) -> Result<RegistryCredentialsResult>;
        async fn lookup_role_definition(&self, role_definition_id: &str) -> Result<RoleDefinition>;
    }
}

mock! {
    pub Builder {}

    #[async_trait::async_trait]
    impl ImageBuilder for Builder {
        async fn build_and_push(&self, request: &ImageRequest) -> Result<PushedImage>;
    }
}

mock! {
    pub Connector {}

    #[async_trait::async_trait]
    impl KubeConnector for Connector {
        async fn connect(&self, kubeconfig: &Secret<String>) -> Result<Arc<dyn KubeApi>>;
    }
}

mock! {
    pub Kube {}

    #[async_trait::async_trait]
    impl KubeApi for Kube {
        async fn apply(&self, object: &KubeObject) -> Result<KubeObject>;
        async fn get(&self, target: &ObjectRef) -> Result<Option<KubeObject>>;
        async fn delete(&self, target: &ObjectRef) -> Result<()>;
    }
}

const KUBECONFIG: &str = "apiVersion: v1\nkind: Config\ncurrent-context: wasm-aks-cluster\nclusters:\n- name: wasm-aks-cluster\n  cluster:\n    server: https://wasm-aks-cluster-dns.hcp.eastus.azmk8s.io:443\n";
const OTHER_KUBECONFIG: &str = "apiVersion: v1\nkind: Config\nclusters:\n- name: elsewhere\n  cluster:\n    server: https://elsewhere\n";
const KUBELET_OBJECT_ID: &str = "00000000-0000-0000-0000-00000000c0de";
const SUBSCRIPTION: &str = "/subscriptions/00000000-0000-0000-0000-000000000000";

/// Everything the fakes were asked to do
#[derive(Default)]
struct Recorded {
    /// Resource group named by every call that takes one
    resource_groups: Mutex<Vec<String>>,
    agent_pools: Mutex<Vec<AgentPoolSpec>>,
    role_assignments: Mutex<Vec<RoleAssignmentSpec>>,
    registry_lookups: Mutex<Vec<String>>,
    kubeconfig_lookups: AtomicU32,
    image_requests: Mutex<Vec<ImageRequest>>,
    connections: Mutex<Vec<String>>,
    applied: Mutex<Vec<KubeObject>>,
}

impl Recorded {
    fn resource_group(&self, name: &str) {
        self.resource_groups.lock().unwrap().push(name.to_string());
    }
}

/// What the Azure fakes answer with
struct AzureAnswers {
    /// User credentials listed for the cluster, in order
    kubeconfigs: Vec<String>,
    /// Whether the built-in role definition exists
    role_definition_exists: bool,
}

impl Default for AzureAnswers {
    fn default() -> Self {
        Self {
            kubeconfigs: vec![STANDARD.encode(KUBECONFIG), STANDARD.encode(OTHER_KUBECONFIG)],
            role_definition_exists: true,
        }
    }
}

fn azure(recorded: &Arc<Recorded>) -> MockAzure {
    azure_with(recorded, AzureAnswers::default())
}

/// Fakes for every Azure call a successful apply makes
fn azure_with(recorded: &Arc<Recorded>, answers: AzureAnswers) -> MockAzure {
    let AzureAnswers {
        kubeconfigs,
        role_definition_exists,
    } = answers;
    let mut api = MockAzure::new();

    let r = recorded.clone();
    api.expect_ensure_resource_group().returning(move |spec| {
        r.resource_group(&spec.name);
        Ok(ResourceGroupState {
            id: format!("{SUBSCRIPTION}/resourceGroups/{}", spec.name),
            name: spec.name.clone(),
            location: spec.location.clone(),
        })
    });

    let r = recorded.clone();
    api.expect_ensure_managed_cluster().returning(move |spec| {
        r.resource_group(&spec.resource_group);
        Ok(ManagedClusterState {
            id: format!(
                "{SUBSCRIPTION}/resourceGroups/{}/providers/Microsoft.ContainerService/managedClusters/{}",
                spec.resource_group, spec.name
            ),
            name: spec.name.clone(),
            resource_group: spec.resource_group.clone(),
            location: spec.location.clone(),
            kubernetes_version: Some(spec.kubernetes_version.clone()),
            fqdn: Some("wasm-aks-cluster-dns.hcp.eastus.azmk8s.io".to_string()),
            identity_profile: BTreeMap::from([
                (
                    KUBELET_IDENTITY.to_string(),
                    UserAssignedIdentity {
                        resource_id: None,
                        client_id: Some("kubelet-client".to_string()),
                        object_id: Some(KUBELET_OBJECT_ID.to_string()),
                    },
                ),
                (
                    "ingressapplicationgateway".to_string(),
                    UserAssignedIdentity {
                        resource_id: None,
                        client_id: None,
                        object_id: Some("not-the-kubelet".to_string()),
                    },
                ),
            ]),
        })
    });

    let r = recorded.clone();
    api.expect_ensure_agent_pool().returning(move |spec| {
        r.resource_group(&spec.resource_group);
        r.agent_pools.lock().unwrap().push(spec.clone());
        Ok(AgentPoolState {
            id: format!("{}/agentPools/{}", spec.cluster, spec.name),
            name: spec.name.clone(),
            cluster: spec.cluster.clone(),
            resource_group: spec.resource_group.clone(),
            workload_runtime: spec.workload_runtime,
            count: spec.count,
        })
    });

    let r = recorded.clone();
    api.expect_ensure_registry().returning(move |spec| {
        r.resource_group(&spec.resource_group);
        Ok(RegistryState {
            id: format!(
                "{SUBSCRIPTION}/resourceGroups/{}/providers/Microsoft.ContainerRegistry/registries/{}",
                spec.resource_group, spec.name
            ),
            name: spec.name.clone(),
            resource_group: spec.resource_group.clone(),
            login_server: format!("{}.azurecr.io", spec.name),
        })
    });

    let r = recorded.clone();
    api.expect_ensure_role_assignment().returning(move |spec| {
        r.role_assignments.lock().unwrap().push(spec.clone());
        Ok(RoleAssignmentState {
            id: format!(
                "{}/providers/Microsoft.Authorization/roleAssignments/{}",
                spec.scope, spec.name
            ),
            name: spec.name.clone(),
            scope: spec.scope.clone(),
            principal_id: spec.principal_id.clone(),
            role_definition_id: spec.role_definition_id.clone(),
        })
    });

    let r = recorded.clone();
    api.expect_list_cluster_user_credentials()
        .returning(move |resource_group, cluster| {
            r.resource_group(resource_group);
            r.kubeconfig_lookups.fetch_add(1, Ordering::SeqCst);
            assert_eq!(cluster, "wasm-aks-cluster");
            Ok(kubeconfigs
                .iter()
                .enumerate()
                .map(|(i, value)| ClusterCredential {
                    name: format!("clusterUser{i}"),
                    value: value.clone(),
                })
                .collect())
        });

    let r = recorded.clone();
    api.expect_list_registry_credentials()
        .returning(move |resource_group, registry| {
            r.resource_group(resource_group);
            r.registry_lookups.lock().unwrap().push(registry.to_string());
            Ok(RegistryCredentialsResult {
                username: Some(format!("{registry}-admin")),
                passwords: vec![
                    RegistryPassword {
                        name: Some("password".to_string()),
                        value: Some(format!("{registry}-pw1")),
                    },
                    RegistryPassword {
                        name: Some("password2".to_string()),
                        value: Some(format!("{registry}-pw2")),
                    },
                ],
            })
        });

    api.expect_lookup_role_definition().returning(move |id| {
        if !role_definition_exists {
            return Err(Error::lookup(
                "role definition",
                format!("{id} not found at subscription scope"),
            ));
        }
        Ok(RoleDefinition {
            id: format!("{SUBSCRIPTION}/providers/Microsoft.Authorization/roleDefinitions/{id}"),
            name: id.to_string(),
            role_name: Some("AcrPull".to_string()),
        })
    });

    api
}

fn builder(recorded: &Arc<Recorded>) -> MockBuilder {
    let mut builder = MockBuilder::new();
    let r = recorded.clone();
    builder.expect_build_and_push().returning(move |request| {
        r.image_requests.lock().unwrap().push(request.clone());
        Ok(PushedImage {
            image_name: request.image_name.clone(),
            repo_digest: Some(format!("{}@sha256:feed", request.image_name)),
        })
    });
    builder
}

fn connector(recorded: &Arc<Recorded>) -> MockConnector {
    let mut connector = MockConnector::new();
    let r = recorded.clone();
    connector.expect_connect().returning(move |kubeconfig| {
        r.connections
            .lock()
            .unwrap()
            .push(kubeconfig.expose().clone());

        let mut kube = MockKube::new();
        let applied = r.clone();
        kube.expect_apply().returning(move |object| {
            applied.applied.lock().unwrap().push(object.clone());
            Ok(object.clone())
        });
        Ok(Arc::new(kube) as Arc<dyn KubeApi>)
    });
    connector
}

fn providers(azure: MockAzure, builder: MockBuilder, connector: MockConnector) -> Providers {
    Providers {
        azure: AzureProvider::new(Arc::new(azure), "eastus"),
        images: Arc::new(builder),
        kube: Arc::new(connector),
    }
}

fn faked(recorded: &Arc<Recorded>) -> Providers {
    providers(azure(recorded), builder(recorded), connector(recorded))
}

/// Providers that panic on any call
fn offline() -> Providers {
    providers(MockAzure::new(), MockBuilder::new(), MockConnector::new())
}

// =============================================================================
// Declaration shape
// =============================================================================

#[test]
fn test_declares_every_node() {
    let stack = Stack::new("dev");
    let topology = declare(&stack, &offline(), &TopologyConfig::default()).unwrap();

    let graph = stack.graph();
    assert_eq!(graph.len(), 10);
    for urn in [
        &topology.resource_group.urn,
        &topology.cluster.urn,
        &topology.agent_pool.urn,
        &topology.registry.urn,
        &topology.role_assignment.urn,
        &topology.image.urn,
        &topology.kube_provider.urn,
        &topology.namespace.urn,
        &topology.deployment.urn,
        &topology.service.urn,
    ] {
        assert!(graph.contains(urn), "{urn} not declared");
    }
    assert_eq!(
        topology.agent_pool.urn.to_string(),
        "urn:wasm-aks:dev::azure:containerservice:AgentPool::wasm-aks-agentpool"
    );
}

#[test]
fn test_exports() {
    let stack = Stack::new("dev");
    declare(&stack, &offline(), &TopologyConfig::default()).unwrap();

    assert_eq!(
        stack.exports(),
        vec![
            (EXPORT_RESOURCE_GROUP_NAME.to_string(), false),
            (EXPORT_CLUSTER_NAME.to_string(), false),
            (EXPORT_AGENT_POOL_NAME.to_string(), false),
            (EXPORT_KUBECONFIG.to_string(), true),
        ]
    );
}

#[test]
fn test_kubernetes_objects_wait_for_provider_infrastructure_and_image() {
    let stack = Stack::new("dev");
    let t = declare(&stack, &offline(), &TopologyConfig::default()).unwrap();
    let graph = stack.graph();

    for infra in [&t.cluster.urn, &t.agent_pool.urn, &t.registry.urn] {
        assert!(graph.has_edge(infra, &t.kube_provider.urn));
        assert!(graph.has_edge(infra, &t.role_assignment.urn));
        assert!(graph.has_edge(infra, &t.image.urn));
    }

    for object in [&t.namespace.urn, &t.deployment.urn, &t.service.urn] {
        assert!(graph.has_edge(&t.kube_provider.urn, object));
        assert!(graph.has_edge(&t.image.urn, object));
        for infra in [&t.cluster.urn, &t.agent_pool.urn, &t.registry.urn] {
            assert!(graph.depends_on(object, infra));
        }
    }

    // namespace before its objects, deployment before the service selecting it
    assert!(graph.has_edge(&t.namespace.urn, &t.deployment.urn));
    assert!(graph.has_edge(&t.namespace.urn, &t.service.urn));
    assert!(graph.has_edge(&t.deployment.urn, &t.service.urn));

    let plan = Engine::new(stack).unwrap().preview();
    let group = |urn: &Urn| {
        plan.steps
            .iter()
            .find(|step| step.urn == urn.to_string())
            .map(|step| step.group)
            .unwrap()
    };
    assert!(group(&t.kube_provider.urn) > group(&t.agent_pool.urn));
    assert!(group(&t.namespace.urn) > group(&t.kube_provider.urn));
    assert!(group(&t.service.urn) > group(&t.deployment.urn));
}

#[test]
fn test_role_assignment_waits_for_cluster_pool_and_registry() {
    let stack = Stack::new("dev");
    let t = declare(&stack, &offline(), &TopologyConfig::default()).unwrap();
    let graph = stack.graph();

    assert!(graph.has_edge(&t.cluster.urn, &t.role_assignment.urn));
    assert!(graph.has_edge(&t.agent_pool.urn, &t.role_assignment.urn));
    assert!(graph.has_edge(&t.registry.urn, &t.role_assignment.urn));
    assert!(!graph.depends_on(&t.role_assignment.urn, &t.image.urn));
}

#[test]
fn test_preview_is_offline_and_redacts_kubeconfig() {
    let stack = Stack::new("dev");
    declare(&stack, &offline(), &TopologyConfig::default()).unwrap();

    let plan = Engine::new(stack).unwrap().preview();
    assert_eq!(plan.steps.len(), 10);
    assert_eq!(plan.steps[0].group, 0);

    let pool = plan
        .steps
        .iter()
        .find(|s| s.urn.ends_with("::wasm-aks-agentpool"))
        .unwrap();
    assert_eq!(pool.properties["workloadRuntime"], "WasmWasi");

    let provider = plan
        .steps
        .iter()
        .find(|s| s.urn.ends_with("::wasm-aks-provider"))
        .unwrap();
    assert_eq!(provider.properties["kubeconfig"], "[secret]");

    let rendered = plan.to_string();
    assert!(rendered.contains("kubeconfig"));
    assert!(!rendered.contains("apiVersion"));
}

// =============================================================================
// Apply
// =============================================================================

#[tokio::test]
async fn test_every_resource_group_reference_is_the_root_group() {
    let recorded = Arc::new(Recorded::default());
    let stack = Stack::new("dev");
    let config = TopologyConfig::default();
    declare(&stack, &faked(&recorded), &config).unwrap();

    Engine::new(stack).unwrap().up().await.unwrap();

    let groups = recorded.resource_groups.lock().unwrap().clone();
    // group, cluster, pool, registry, kubeconfig and registry credentials
    assert_eq!(groups.len(), 6);
    assert!(groups.iter().all(|g| g == &config.resource_group_name));
}

#[tokio::test]
async fn test_agent_pool_runs_wasi() {
    let recorded = Arc::new(Recorded::default());
    let stack = Stack::new("dev");
    declare(&stack, &faked(&recorded), &TopologyConfig::default()).unwrap();

    Engine::new(stack).unwrap().up().await.unwrap();

    let pools = recorded.agent_pools.lock().unwrap().clone();
    assert_eq!(pools.len(), 1);
    assert_eq!(pools[0].name, "wasmpool");
    assert_eq!(pools[0].workload_runtime, WorkloadRuntime::WasmWasi);
    // leaving the runtime out gives plain containers
    assert_ne!(WorkloadRuntime::default(), pools[0].workload_runtime);
}

#[tokio::test]
async fn test_deployment_and_service_share_the_selector() {
    let recorded = Arc::new(Recorded::default());
    let stack = Stack::new("dev");
    let t = declare(&stack, &faked(&recorded), &TopologyConfig::default()).unwrap();

    Engine::new(stack).unwrap().up().await.unwrap();

    let deployment_selector = t.deployment.selector.resolve().await.unwrap();
    let service_selector = t.service.selector.resolve().await.unwrap();
    assert!(Arc::ptr_eq(&deployment_selector, &t.app_labels));
    assert!(Arc::ptr_eq(&service_selector, &deployment_selector));

    let applied = recorded.applied.lock().unwrap().clone();
    let kinds: Vec<_> = applied.iter().map(KubeObject::kind).collect();
    assert_eq!(
        kinds,
        vec![ObjectKind::Namespace, ObjectKind::Deployment, ObjectKind::Service]
    );

    let KubeObject::Deployment(deploy) = &applied[1] else {
        panic!("expected a deployment");
    };
    let KubeObject::Service(svc) = &applied[2] else {
        panic!("expected a service");
    };
    let deploy_spec = deploy.spec.as_ref().unwrap();
    let svc_spec = svc.spec.as_ref().unwrap();
    assert_eq!(
        deploy_spec.selector.match_labels.as_ref(),
        svc_spec.selector.as_ref()
    );

    let pod = deploy_spec.template.spec.as_ref().unwrap();
    assert_eq!(pod.runtime_class_name.as_deref(), Some("wasmtime-spin-v1"));
    assert_eq!(
        pod.containers[0].image.as_deref(),
        Some("wasmaksregistry.azurecr.io/aks-wasm-spin-demo:latest")
    );
    let port = &svc_spec.ports.as_ref().unwrap()[0];
    assert_eq!(svc_spec.type_.as_deref(), Some("LoadBalancer"));
    assert_eq!((port.port, port.name.as_deref()), (8080, Some("http")));
}

#[tokio::test]
async fn test_role_assignment_uses_kubelet_identity() {
    let recorded = Arc::new(Recorded::default());
    let stack = Stack::new("dev");
    let config = TopologyConfig::default();
    declare(&stack, &faked(&recorded), &config).unwrap();

    Engine::new(stack).unwrap().up().await.unwrap();

    let assignments = recorded.role_assignments.lock().unwrap().clone();
    assert_eq!(assignments.len(), 1);
    let assignment = &assignments[0];
    assert_eq!(assignment.principal_id, KUBELET_OBJECT_ID);
    assert_eq!(assignment.principal_type, PrincipalType::ServicePrincipal);
    assert!(assignment
        .role_definition_id
        .ends_with(&config.pull_role_definition_id));
    assert!(assignment
        .scope
        .ends_with("/registries/wasmaksregistry"));
}

#[tokio::test]
async fn test_kubeconfig_export_is_first_credential_and_secret() {
    let recorded = Arc::new(Recorded::default());
    let stack = Stack::new("dev");
    declare(&stack, &faked(&recorded), &TopologyConfig::default()).unwrap();

    let summary = Engine::new(stack).unwrap().up().await.unwrap();

    let kubeconfig = &summary.exports[EXPORT_KUBECONFIG];
    assert!(kubeconfig.is_secret());
    assert_eq!(kubeconfig.expose(), KUBECONFIG);
    assert!(!format!("{:?}", summary).contains("current-context"));

    assert_eq!(summary.exports[EXPORT_RESOURCE_GROUP_NAME].expose(), "wasm-aks-rg");
    assert_eq!(summary.exports[EXPORT_CLUSTER_NAME].expose(), "wasm-aks-cluster");
    assert_eq!(summary.exports[EXPORT_AGENT_POOL_NAME].expose(), "wasmpool");

    // one lookup feeds both the provider and the export
    assert_eq!(recorded.kubeconfig_lookups.load(Ordering::SeqCst), 1);
    assert_eq!(
        recorded.connections.lock().unwrap().clone(),
        vec![KUBECONFIG.to_string()]
    );
}

#[tokio::test]
async fn test_image_pushes_with_registry_admin_credentials() {
    let recorded = Arc::new(Recorded::default());
    let stack = Stack::new("dev");
    declare(&stack, &faked(&recorded), &TopologyConfig::default()).unwrap();

    Engine::new(stack).unwrap().up().await.unwrap();

    assert_eq!(
        recorded.registry_lookups.lock().unwrap().clone(),
        vec!["wasmaksregistry".to_string()]
    );

    let requests = recorded.image_requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    let auth = &requests[0].registry;
    assert_eq!(auth.server, "wasmaksregistry.azurecr.io");
    assert_eq!(auth.username, "wasmaksregistry-admin");
    assert_eq!(auth.password.expose(), "wasmaksregistry-pw1");
    assert_eq!(requests[0].platform, "linux/amd64");
}

// =============================================================================
// Failures
// =============================================================================

#[tokio::test]
async fn test_failed_agent_pool_stops_everything_downstream() {
    let recorded = Arc::new(Recorded::default());
    let mut api = MockAzure::new();

    api.expect_ensure_resource_group().returning(|spec| {
        Ok(ResourceGroupState {
            id: format!("{SUBSCRIPTION}/resourceGroups/{}", spec.name),
            name: spec.name.clone(),
            location: spec.location.clone(),
        })
    });
    api.expect_ensure_managed_cluster().returning(|spec| {
        Ok(ManagedClusterState {
            id: "/c".to_string(),
            name: spec.name.clone(),
            resource_group: spec.resource_group.clone(),
            location: spec.location.clone(),
            kubernetes_version: None,
            fqdn: None,
            identity_profile: BTreeMap::new(),
        })
    });
    api.expect_ensure_agent_pool().returning(|_| {
        Err(Error::provider_status(
            "azure",
            "agentPools/wasmpool",
            400,
            "WorkloadRuntime WasmWasi is not supported in this region",
        ))
    });
    // independent branches may or may not have started before the failure
    api.expect_ensure_registry().times(0..=1).returning(|spec| {
        Ok(RegistryState {
            id: "/r".to_string(),
            name: spec.name.clone(),
            resource_group: spec.resource_group.clone(),
            login_server: format!("{}.azurecr.io", spec.name),
        })
    });
    api.expect_ensure_role_assignment().never();
    api.expect_list_cluster_user_credentials().never();

    let mut images = MockBuilder::new();
    images.expect_build_and_push().never();
    let mut kube = MockConnector::new();
    kube.expect_connect().never();

    let stack = Stack::new("dev");
    let t = declare(&stack, &providers(api, images, kube), &TopologyConfig::default()).unwrap();

    let err = Engine::new(stack).unwrap().up().await.unwrap_err();
    assert_eq!(err.urn(), Some(t.agent_pool.urn.to_string().as_str()));
    assert!(err.to_string().contains("WasmWasi is not supported"));
    assert!(recorded.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_undecodable_kubeconfig_blocks_kubernetes_objects() {
    let recorded = Arc::new(Recorded::default());
    let api = azure_with(
        &recorded,
        AzureAnswers {
            kubeconfigs: vec!["%%% not base64 %%%".to_string()],
            ..Default::default()
        },
    );
    let mut kube = MockConnector::new();
    kube.expect_connect().never();

    let stack = Stack::new("dev");
    let t = declare(
        &stack,
        &providers(api, builder(&recorded), kube),
        &TopologyConfig::default(),
    )
    .unwrap();

    let err = Engine::new(stack).unwrap().up().await.unwrap_err();
    assert_eq!(err.urn(), Some(t.kube_provider.urn.to_string().as_str()));
    assert!(matches!(err.root(), Error::Decode { .. }));
    assert!(recorded.applied.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_role_definition_blocks_role_assignment() {
    let recorded = Arc::new(Recorded::default());
    let api = azure_with(
        &recorded,
        AzureAnswers {
            role_definition_exists: false,
            ..Default::default()
        },
    );

    let stack = Stack::new("dev");
    let t = declare(
        &stack,
        &providers(api, builder(&recorded), connector(&recorded)),
        &TopologyConfig::default(),
    )
    .unwrap();

    let err = Engine::new(stack).unwrap().up().await.unwrap_err();
    assert_eq!(err.urn(), Some(t.role_assignment.urn.to_string().as_str()));
    assert!(matches!(err.root(), Error::Lookup { .. }));
    assert!(recorded.role_assignments.lock().unwrap().is_empty());
}

// =============================================================================
// Destroy
// =============================================================================

#[tokio::test]
async fn test_destroy_of_missing_stack_deletes_nothing() {
    let mut api = MockAzure::new();
    // everything else hangs off the group's outputs and is absent with it
    api.expect_get_resource_group().times(1).returning(|_| Ok(None));

    let mut kube = MockConnector::new();
    kube.expect_connect().never();

    let stack = Stack::new("dev");
    declare(
        &stack,
        &providers(api, MockBuilder::new(), kube),
        &TopologyConfig::default(),
    )
    .unwrap();

    let summary = Engine::new(stack).unwrap().destroy().await.unwrap();
    assert!(summary.deleted.is_empty());
    assert!(summary.retained.is_empty());
    assert_eq!(summary.absent.len(), 10);
}

/// An observed object at `target`
fn observed(target: &ObjectRef) -> KubeObject {
    let metadata = ObjectMeta {
        name: Some(target.name.clone()),
        namespace: target.namespace.clone(),
        ..Default::default()
    };
    match target.kind {
        ObjectKind::Namespace => KubeObject::Namespace(corev1::Namespace {
            metadata,
            ..Default::default()
        }),
        ObjectKind::Deployment => KubeObject::Deployment(appsv1::Deployment {
            metadata,
            ..Default::default()
        }),
        ObjectKind::Service => KubeObject::Service(corev1::Service {
            metadata,
            ..Default::default()
        }),
    }
}

#[tokio::test]
async fn test_destroy_deletes_dependents_first() {
    let recorded = Arc::new(Recorded::default());
    let deleted = Arc::new(Mutex::new(Vec::<String>::new()));

    // existing resources read back exactly as an apply would have left them
    let mut api = azure(&recorded);
    api.expect_get_resource_group().returning(|name| {
        Ok(Some(ResourceGroupState {
            id: format!("{SUBSCRIPTION}/resourceGroups/{name}"),
            name: name.to_string(),
            location: "eastus".to_string(),
        }))
    });
    api.expect_get_managed_cluster().returning(|rg, name| {
        Ok(Some(ManagedClusterState {
            id: format!("{SUBSCRIPTION}/resourceGroups/{rg}/providers/Microsoft.ContainerService/managedClusters/{name}"),
            name: name.to_string(),
            resource_group: rg.to_string(),
            location: "eastus".to_string(),
            kubernetes_version: Some("1.25.5".to_string()),
            fqdn: None,
            identity_profile: BTreeMap::from([(
                KUBELET_IDENTITY.to_string(),
                UserAssignedIdentity {
                    resource_id: None,
                    client_id: None,
                    object_id: Some(KUBELET_OBJECT_ID.to_string()),
                },
            )]),
        }))
    });
    api.expect_get_agent_pool().returning(|rg, cluster, name| {
        Ok(Some(AgentPoolState {
            id: format!("{cluster}/agentPools/{name}"),
            name: name.to_string(),
            cluster: cluster.to_string(),
            resource_group: rg.to_string(),
            workload_runtime: WorkloadRuntime::WasmWasi,
            count: 1,
        }))
    });
    api.expect_get_registry().returning(|rg, name| {
        Ok(Some(RegistryState {
            id: format!("{SUBSCRIPTION}/resourceGroups/{rg}/providers/Microsoft.ContainerRegistry/registries/{name}"),
            name: name.to_string(),
            resource_group: rg.to_string(),
            login_server: format!("{name}.azurecr.io"),
        }))
    });
    api.expect_get_role_assignment().returning(|scope, name| {
        Ok(Some(RoleAssignmentState {
            id: format!("{scope}/providers/Microsoft.Authorization/roleAssignments/{name}"),
            name: name.to_string(),
            scope: scope.to_string(),
            principal_id: KUBELET_OBJECT_ID.to_string(),
            role_definition_id: "acrpull".to_string(),
        }))
    });

    let d = deleted.clone();
    api.expect_delete_role_assignment().times(1).returning(move |_, _| {
        d.lock().unwrap().push("role-assignment".to_string());
        Ok(())
    });
    let d = deleted.clone();
    api.expect_delete_registry().times(1).returning(move |_, _| {
        d.lock().unwrap().push("registry".to_string());
        Ok(())
    });
    let d = deleted.clone();
    api.expect_delete_agent_pool().times(1).returning(move |_, _, _| {
        d.lock().unwrap().push("agent-pool".to_string());
        Ok(())
    });
    let d = deleted.clone();
    api.expect_delete_managed_cluster().times(1).returning(move |_, _| {
        d.lock().unwrap().push("cluster".to_string());
        Ok(())
    });
    let d = deleted.clone();
    api.expect_delete_resource_group().times(1).returning(move |_| {
        d.lock().unwrap().push("resource-group".to_string());
        Ok(())
    });

    let mut connector = MockConnector::new();
    let d = deleted.clone();
    connector.expect_connect().times(1).returning(move |_| {
        let mut kube = MockKube::new();
        kube.expect_get().returning(|target| Ok(Some(observed(target))));
        let d = d.clone();
        kube.expect_delete().returning(move |target| {
            d.lock().unwrap().push(target.kind.to_string());
            Ok(())
        });
        Ok(Arc::new(kube) as Arc<dyn KubeApi>)
    });

    let mut images = MockBuilder::new();
    images.expect_build_and_push().never();

    let stack = Stack::new("dev");
    declare(
        &stack,
        &providers(api, images, connector),
        &TopologyConfig::default(),
    )
    .unwrap();

    let summary = Engine::new(stack).unwrap().destroy().await.unwrap();
    assert_eq!(summary.deleted.len(), 9);
    assert!(summary.absent.is_empty());
    // the pushed image stays in the registry
    assert_eq!(summary.retained.len(), 1);
    assert_eq!(summary.retained[0].type_token(), "docker:index:Image");

    let order = deleted.lock().unwrap().clone();
    let position = |what: &str| order.iter().position(|e| e == what).unwrap();
    assert!(position("Service") < position("Deployment"));
    assert!(position("Deployment") < position("Namespace"));
    assert!(position("Namespace") < position("cluster"));
    assert!(position("role-assignment") < position("registry"));
    assert!(position("agent-pool") < position("cluster"));
    assert_eq!(order.last().map(String::as_str), Some("resource-group"));
}
