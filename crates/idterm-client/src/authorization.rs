use std::sync::Arc;

use async_trait::async_trait;
use idterm_config::Settings;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::Authorizer;
use crate::error::{parse_arm_error, ClientError};

const AUTHORIZATION_API_VERSION: &str = "2022-04-01";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentCreateParameters {
    /// Fully-qualified role definition id.
    pub role_definition_id: String,
    /// Object id of the principal receiving the role.
    pub principal_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleAssignmentRecord {
    /// Fully-qualified resource id of the assignment.
    pub id: String,
    /// Assignment name (the GUID chosen at creation).
    pub name: String,
    pub scope: String,
    pub role_definition_id: String,
    pub principal_id: String,
}

impl RoleAssignmentRecord {
    fn from_body(body: &Value, operation: &str) -> Result<Self, ClientError> {
        let field = |v: &Value| v.as_str().unwrap_or("").to_string();
        let record = Self {
            id:                 field(&body["id"]),
            name:               field(&body["name"]),
            scope:              field(&body["properties"]["scope"]),
            role_definition_id: field(&body["properties"]["roleDefinitionId"]),
            principal_id:       field(&body["properties"]["principalId"]),
        };
        if record.id.is_empty() || record.name.is_empty() {
            return Err(ClientError::Decode {
                operation: operation.to_string(),
                message: format!("role assignment without id/name: {}", body),
            });
        }
        Ok(record)
    }
}

/// Authorization (RBAC) operations used by the provisioner.
#[async_trait]
pub trait AuthorizationClient: Send + Sync {
    /// Create `assignment_name` under `scope`. The name must be a fresh GUID.
    async fn create_role_assignment(
        &self,
        scope: &str,
        assignment_name: &str,
        params: &RoleAssignmentCreateParameters,
    ) -> Result<RoleAssignmentRecord, ClientError>;

    /// Delete by fully-qualified assignment id; returns the deleted assignment.
    async fn delete_role_assignment_by_id(
        &self,
        role_assignment_id: &str,
    ) -> Result<RoleAssignmentRecord, ClientError>;
}

/// [`AuthorizationClient`] backed by ARM `Microsoft.Authorization/roleAssignments`.
pub struct ArmAuthorizationClient {
    base:       String,
    client:     reqwest::Client,
    authorizer: Arc<dyn Authorizer>,
}

impl ArmAuthorizationClient {
    pub fn new(settings: &Settings, authorizer: Arc<dyn Authorizer>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::Transport {
                operation: "build ARM client".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            base: settings.endpoints.management.clone(),
            client,
            authorizer,
        })
    }

    fn api_error(operation: &str, status: u16, body: &Value) -> ClientError {
        let (code, message) = parse_arm_error(body);
        ClientError::Api {
            operation: operation.to_string(),
            status,
            code,
            message,
        }
    }
}

#[async_trait]
impl AuthorizationClient for ArmAuthorizationClient {
    async fn create_role_assignment(
        &self,
        scope: &str,
        assignment_name: &str,
        params: &RoleAssignmentCreateParameters,
    ) -> Result<RoleAssignmentRecord, ClientError> {
        let op = "create role assignment";
        let token = self.authorizer.token().await?;
        let url = format!(
            "{}{}/providers/Microsoft.Authorization/roleAssignments/{}?api-version={}",
            self.base, scope, assignment_name, AUTHORIZATION_API_VERSION,
        );
        let body = json!({
            "properties": {
                "roleDefinitionId": params.role_definition_id,
                "principalId":      params.principal_id,
                "principalType":    "ServicePrincipal",
            }
        });
        debug!(url, "Azure ARM PUT");
        let resp = self
            .client
            .put(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::transport(op, e))?;

        let status = resp.status().as_u16();
        let body_val: Value = resp.json().await.unwrap_or(Value::Null);
        if !(200..300).contains(&status) {
            return Err(Self::api_error(op, status, &body_val));
        }
        RoleAssignmentRecord::from_body(&body_val, op)
    }

    async fn delete_role_assignment_by_id(
        &self,
        role_assignment_id: &str,
    ) -> Result<RoleAssignmentRecord, ClientError> {
        let op = "delete role assignment";
        let token = self.authorizer.token().await?;
        let url = format!(
            "{}{}?api-version={}",
            self.base, role_assignment_id, AUTHORIZATION_API_VERSION,
        );
        debug!(url, "Azure ARM DELETE");
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ClientError::transport(op, e))?;

        let status = resp.status().as_u16();
        // ARM answers 204 when there was nothing to delete.
        if status == 204 {
            return Err(ClientError::Api {
                operation: op.to_string(),
                status,
                code: "RoleAssignmentNotFound".into(),
                message: format!("no role assignment with id {}", role_assignment_id),
            });
        }
        let body_val: Value = resp.json().await.unwrap_or(Value::Null);
        if !(200..300).contains(&status) {
            return Err(Self::api_error(op, status, &body_val));
        }
        RoleAssignmentRecord::from_body(&body_val, op)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
