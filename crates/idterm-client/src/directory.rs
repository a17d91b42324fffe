use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use idterm_config::Settings;
use serde_json::{json, Value};
use tracing::debug;

use crate::auth::Authorizer;
use crate::error::{parse_graph_error, ClientError};

const GRAPH_API_VERSION: &str = "1.6";

// ── Request / response shapes ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationCreateParameters {
    pub display_name: String,
    pub available_to_other_tenants: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Application {
    /// Client id (`appId`).
    pub app_id: String,
    pub object_id: String,
    pub display_name: String,
}

/// A password credential carried on principal creation. Valid for `[start_date, end_date)`.
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    pub key_id: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub value: String,
}

impl std::fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("key_id", &self.key_id)
            .field("start_date", &self.start_date)
            .field("end_date", &self.end_date)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipalCreateParameters {
    pub app_id: String,
    pub account_enabled: bool,
    pub password_credentials: Vec<PasswordCredential>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServicePrincipalRecord {
    pub object_id: String,
    pub app_id: String,
}

// ── Contract ──────────────────────────────────────────────────────────────────

/// Directory (identity provider) operations used by the provisioner.
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn create_application(
        &self,
        params: &ApplicationCreateParameters,
    ) -> Result<Application, ClientError>;

    /// Not idempotent: deleting an unknown object id is an error.
    async fn delete_application(&self, object_id: &str) -> Result<(), ClientError>;

    async fn create_service_principal(
        &self,
        params: &ServicePrincipalCreateParameters,
    ) -> Result<ServicePrincipalRecord, ClientError>;

    async fn delete_service_principal(&self, object_id: &str) -> Result<(), ClientError>;
}

// ── AD Graph implementation ───────────────────────────────────────────────────

/// [`DirectoryClient`] backed by the Azure AD Graph REST API.
pub struct GraphDirectoryClient {
    tenant_id:  String,
    base:       String,
    client:     reqwest::Client,
    authorizer: Arc<dyn Authorizer>,
}

impl GraphDirectoryClient {
    pub fn new(settings: &Settings, authorizer: Arc<dyn Authorizer>) -> Result<Self, ClientError> {
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::Transport {
                operation: "build graph client".into(),
                message: e.to_string(),
            })?;
        Ok(Self {
            tenant_id: settings.tenant_id.clone(),
            base: settings.endpoints.graph.clone(),
            client,
            authorizer,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}?api-version={}",
            self.base, self.tenant_id, path, GRAPH_API_VERSION
        )
    }

    async fn graph_post(&self, operation: &str, path: &str, body: &Value) -> Result<Value, ClientError> {
        let token = self.authorizer.token().await?;
        let url = self.url(path);
        debug!(url, "AD Graph POST");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(body)
            .send()
            .await
            .map_err(|e| ClientError::transport(operation, e))?;

        let status = resp.status().as_u16();
        let body_val: Value = resp.json().await.unwrap_or(Value::Null);
        if !(200..300).contains(&status) {
            let (code, message) = parse_graph_error(&body_val);
            return Err(ClientError::Api {
                operation: operation.to_string(),
                status,
                code,
                message,
            });
        }
        Ok(body_val)
    }

    async fn graph_delete(&self, operation: &str, path: &str) -> Result<(), ClientError> {
        let token = self.authorizer.token().await?;
        let url = self.url(path);
        debug!(url, "AD Graph DELETE");
        let resp = self
            .client
            .delete(&url)
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| ClientError::transport(operation, e))?;

        let status = resp.status().as_u16();
        if (200..300).contains(&status) {
            return Ok(());
        }
        let body: Value = resp.json().await.unwrap_or(Value::Null);
        let (code, message) = parse_graph_error(&body);
        Err(ClientError::Api {
            operation: operation.to_string(),
            status,
            code,
            message,
        })
    }
}

fn required_str(body: &Value, key: &str, operation: &str) -> Result<String, ClientError> {
    body[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ClientError::Decode {
            operation: operation.to_string(),
            message: format!("missing '{}' in {}", key, body),
        })
}

fn graph_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl DirectoryClient for GraphDirectoryClient {
    async fn create_application(
        &self,
        params: &ApplicationCreateParameters,
    ) -> Result<Application, ClientError> {
        let op = "create application";
        let body = json!({
            "displayName": params.display_name,
            "availableToOtherTenants": params.available_to_other_tenants,
        });
        let resp = self.graph_post(op, "applications", &body).await?;
        Ok(Application {
            app_id: required_str(&resp, "appId", op)?,
            object_id: required_str(&resp, "objectId", op)?,
            display_name: resp["displayName"]
                .as_str()
                .unwrap_or(&params.display_name)
                .to_string(),
        })
    }

    async fn delete_application(&self, object_id: &str) -> Result<(), ClientError> {
        self.graph_delete("delete application", &format!("applications/{}", object_id))
            .await
    }

    async fn create_service_principal(
        &self,
        params: &ServicePrincipalCreateParameters,
    ) -> Result<ServicePrincipalRecord, ClientError> {
        let op = "create service principal";
        let credentials: Vec<Value> = params
            .password_credentials
            .iter()
            .map(|c| {
                json!({
                    "keyId":     c.key_id,
                    "startDate": graph_timestamp(&c.start_date),
                    "endDate":   graph_timestamp(&c.end_date),
                    "value":     c.value,
                })
            })
            .collect();
        let body = json!({
            "appId":               params.app_id,
            "accountEnabled":      params.account_enabled,
            "passwordCredentials": credentials,
            "tags":                params.tags,
        });
        let resp = self.graph_post(op, "servicePrincipals", &body).await?;
        Ok(ServicePrincipalRecord {
            object_id: required_str(&resp, "objectId", op)?,
            app_id: resp["appId"].as_str().unwrap_or(&params.app_id).to_string(),
        })
    }

    async fn delete_service_principal(&self, object_id: &str) -> Result<(), ClientError> {
        self.graph_delete(
            "delete service principal",
            &format!("servicePrincipals/{}", object_id),
        )
        .await
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
