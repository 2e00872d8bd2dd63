use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;
use uuid::Uuid;
use wasm_aks_common::Result;
use wasm_aks_engine::{dependencies, Deletion, Output, Resource, ResourceOptions, Stack, Urn};

use super::AzureProvider;
use crate::api::AzureApi;
use crate::models::{PrincipalType, RoleAssignmentSpec, RoleAssignmentState};

/// Deterministic assignment name for a (scope, principal, role) triple
///
/// ARM requires a GUID name chosen by the caller; deriving it from the
/// assignment's content makes a repeated apply address the same assignment.
pub fn role_assignment_name(scope: &str, principal_id: &str, role_definition_id: &str) -> String {
    let key = format!(
        "{}|{}|{}",
        scope.to_lowercase(),
        principal_id.to_lowercase(),
        role_definition_id.to_lowercase()
    );
    Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes()).to_string()
}

/// Inputs of a role assignment
pub struct RoleAssignmentArgs {
    /// Object ID of the principal
    pub principal_id: Output<String>,
    /// Kind of principal
    pub principal_type: PrincipalType,
    /// Fully qualified role definition ID
    pub role_definition_id: Output<String>,
    /// ARM resource ID the role applies to
    pub scope: Output<String>,
}

/// A role assignment
pub struct RoleAssignment {
    api: Arc<dyn AzureApi>,
    principal_id: Output<String>,
    principal_type: PrincipalType,
    role_definition_id: Output<String>,
    scope: Output<String>,
}

/// Outputs of a declared role assignment
#[derive(Debug, Clone)]
pub struct RoleAssignmentHandle {
    /// Node identity
    pub urn: Urn,
    /// Assignment name
    pub name: Output<String>,
}

impl RoleAssignment {
    /// Declare a role assignment on `stack`
    pub fn declare(
        stack: &Stack,
        name: &str,
        args: RoleAssignmentArgs,
        provider: &AzureProvider,
        opts: ResourceOptions,
    ) -> Result<RoleAssignmentHandle> {
        let inputs = dependencies([
            args.principal_id.dependencies(),
            args.role_definition_id.dependencies(),
            args.scope.dependencies(),
        ]);

        let resource = Self {
            api: provider.api().clone(),
            principal_id: args.principal_id,
            principal_type: args.principal_type,
            role_definition_id: args.role_definition_id,
            scope: args.scope,
        };
        let registered = stack.register(name, resource, inputs, opts)?;

        Ok(RoleAssignmentHandle {
            name: registered.state.apply(|s| Ok(s.name)),
            urn: registered.urn,
        })
    }

    async fn spec(&self) -> Result<RoleAssignmentSpec> {
        let scope = self.scope.resolve().await?;
        let principal_id = self.principal_id.resolve().await?;
        let role_definition_id = self.role_definition_id.resolve().await?;

        Ok(RoleAssignmentSpec {
            name: role_assignment_name(&scope, &principal_id, &role_definition_id),
            scope,
            principal_id,
            principal_type: self.principal_type,
            role_definition_id,
        })
    }
}

#[async_trait]
impl Resource for RoleAssignment {
    type State = RoleAssignmentState;
    const TYPE_TOKEN: &'static str = "azure:authorization:RoleAssignment";

    fn describe(&self) -> serde_json::Value {
        json!({
            "principalId": self.principal_id.describe(),
            "principalType": self.principal_type,
            "roleDefinitionId": self.role_definition_id.describe(),
            "scope": self.scope.describe(),
        })
    }

    async fn create_or_update(&self, urn: &Urn) -> Result<RoleAssignmentState> {
        let spec = self.spec().await?;
        info!(
            urn = %urn,
            assignment = %spec.name,
            principal_type = ?spec.principal_type,
            scope = %spec.scope,
            "Ensuring role assignment"
        );
        self.api.ensure_role_assignment(&spec).await
    }

    async fn read(&self, _urn: &Urn) -> Result<Option<RoleAssignmentState>> {
        let spec = self.spec().await?;
        self.api.get_role_assignment(&spec.scope, &spec.name).await
    }

    async fn delete(&self, urn: &Urn, state: &RoleAssignmentState) -> Result<Deletion> {
        info!(urn = %urn, assignment = %state.name, "Deleting role assignment");
        self.api
            .delete_role_assignment(&state.scope, &state.name)
            .await?;
        Ok(Deletion::Deleted)
    }
}
