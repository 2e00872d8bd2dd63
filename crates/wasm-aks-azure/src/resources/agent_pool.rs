use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::AzureProvider;
use crate::api::AzureApi;
use crate::models::{AgentPoolSpec, AgentPoolState, OsType, WorkloadRuntime};

/// Inputs of an agent pool
pub struct AgentPoolArgs {
    /// Pool name
    pub agent_pool_name: Output<String>,
    /// Resource group holding the cluster
    pub resource_group_name: Output<String>,
    /// Name of the cluster the pool joins
    pub resource_name: Output<String>,
    /// Workload runtime; standard OCI containers if omitted
    pub workload_runtime: Option<WorkloadRuntime>,
    /// Node count
    pub count: i32,
    /// VM size of the nodes
    pub vm_size: String,
    /// Node operating system
    pub os_type: OsType,
}

/// A node pool attached to an existing managed cluster
pub struct AgentPool {
    api: Arc<dyn AzureApi>,
    name: Output<String>,
    resource_group: Output<String>,
    cluster: Output<String>,
    workload_runtime: WorkloadRuntime,
    count: i32,
    vm_size: String,
    os_type: OsType,
}

/// Outputs of a declared agent pool
#[derive(Debug, Clone)]
pub struct AgentPoolHandle {
    /// Node identity
    pub urn: Urn,
    /// Pool name
    pub name: Output<String>,
    /// Full observed state
    pub state: Output<AgentPoolState>,
}

impl AgentPool {
    /// Declare an agent pool on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: AgentPoolArgs,
        provider: &AzureProvider,
        opts: ResourceOptions,
    ) -> Result<AgentPoolHandle> {
        let inputs = dependencies([
            args.agent_pool_name.dependencies(),
            args.resource_group_name.dependencies(),
            args.resource_name.dependencies(),
        ]);

        let resource = Self {
            api: provider.api().clone(),
            name: args.agent_pool_name,
            resource_group: args.resource_group_name,
            cluster: args.resource_name,
            workload_runtime: args.workload_runtime.unwrap_or_default(),
            count: args.count,
            vm_size: args.vm_size,
            os_type: args.os_type,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(AgentPoolHandle {
            name: registered.state.apply(|s| Ok(s.name)),
            state: registered.state,
            urn: registered.urn,
        })
    }

    /// Workload runtime the pool is declared with
    pub fn workload_runtime(&self) -> WorkloadRuntime {
        self.workload_runtime
    }

    async fn spec(&self) -> Result<AgentPoolSpec> {
        Ok(AgentPoolSpec {
            resource_group: self.resource_group.resolve().await?,
            cluster: self.cluster.resolve().await?,
            name: self.name.resolve().await?,
            workload_runtime: self.workload_runtime,
            count: self.count,
            vm_size: self.vm_size.clone(),
            os_type: self.os_type,
        })
    }
}

#[async_trait]
impl Resource for AgentPool {
    type State = AgentPoolState;
    const TYPE_TOKEN: &'static str = "azure:containerservice:AgentPool";

    fn describe(&self) -> serde_json::Value {
        json!({
            "agentPoolName": self.name.describe(),
            "resourceGroupName": self.resource_group.describe(),
            "resourceName": self.cluster.describe(),
            "workloadRuntime": self.workload_runtime,
            "count": self.count,
            "vmSize": self.vm_size,
            "osType": self.os_type,
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<AgentPoolState> {
        let spec = self.spec().await?;
        info!(
            urn = %urn,
            pool = %spec.name,
            cluster = %spec.cluster,
            runtime = ?spec.workload_runtime,
            "Ensuring agent pool"
        );
        self.api.ensure_agent_pool(&spec).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<AgentPoolState>> {
        let resource_group = self.resource_group.resolve().await?;
        let cluster = self.cluster.resolve().await?;
        let name = self.name.resolve().await?;
        self.api
            .get_agent_pool(&resource_group, &cluster, &name)
            .await
    }

    async fn delete(&self, urn: &Urn, state: &AgentPoolState) -> Result<Deletion> {
        info!(urn = %urn, pool = %state.name, cluster = %state.cluster, "Deleting agent pool");
        self.api
            .delete_agent_pool(&state.resource_group, &state.cluster, &state.name)
            .await?;
        Ok(Deletion::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockAzureApi;

    fn pool(api: MockAzureApi, runtime: Option<WorkloadRuntime>) -> AgentPool {
        AgentPool {
            api: Arc::new(api),
            name: "wasmpool".into(),
            resource_group: "wasm-aks-rg".into(),
            cluster: "wasm-aks-cluster".into(),
            workload_runtime: runtime.unwrap_or_default(),
            count: 1,
            vm_size: "Standard_B4ms".to_string(),
            os_type: OsType::Linux,
        }
    }

    #[test]
    fn test_omitted_runtime_means_standard_containers() {
        let pool = pool(MockAzureApi::new(), None);
        assert_eq!(pool.workload_runtime(), WorkloadRuntime::OciContainer);
        assert_eq!(pool.describe()["workloadRuntime"], "OCIContainer");
    }

    #[tokio::test]
    async fn test_ensure_sends_wasi_runtime() {
        let mut api = MockAzureApi::new();
        api.expect_ensure_agent_pool()
            .withf(|spec| {
                spec.workload_runtime == WorkloadRuntime::WasmWasi
                    && spec.cluster == "wasm-aks-cluster"
                    && spec.name == "wasmpool"
            })
            .times(1)
            .returning(|spec| {
                Ok(AgentPoolState {
                    id: "/p".to_string(),
                    name: spec.name.clone(),
                    cluster: spec.cluster.clone(),
                    resource_group: spec.resource_group.clone(),
                    workload_runtime: spec.workload_runtime,
                    count: spec.count,
                })
            });

        let pool = pool(api, Some(WorkloadRuntime::WasmWasi));
        let urn = Urn::new("dev", AgentPool::TYPE_TOKEN, "wasm-aks-agentpool");
        let state = pool.create_or_update(&urn).await.unwrap();
        assert_eq!(state.workload_runtime, WorkloadRuntime::WasmWasi);
    }
}
