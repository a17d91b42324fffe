use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

// ── Well-known identifiers ───────────────────────────────────────────────────

/// Built-in Azure "Reader" role definition GUID (same across all tenants).
pub const READER_ROLE_ID: &str = "acdd72a7-3385-48ef-bd42-f606fba81ae7";

// ── Scopes ────────────────────────────────────────────────────────────────────

/// `/subscriptions/{sub}/resourceGroups/{rg}`
pub fn resource_group_scope(subscription_id: &str, resource_group: &str) -> String {
    format!("/subscriptions/{}/resourceGroups/{}", subscription_id, resource_group)
}

/// Expand a role definition into its fully-qualified ARM id.
///
/// A bare GUID is placed under the subscription's
/// `Microsoft.Authorization/roleDefinitions` provider; anything that already
/// starts with `/` is returned unchanged.
pub fn role_definition_id(subscription_id: &str, role: &str) -> String {
    if role.starts_with('/') {
        return role.to_string();
    }
    format!(
        "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{}",
        subscription_id, role
    )
}

// ── Aggregate ─────────────────────────────────────────────────────────────────

/// An application registration together with its service principal and the
/// role assignment granted to it.
///
/// Created in memory by the caller with `display_name`, the principal's
/// `duration`/`tags` and the role assignment's `node_resource_group` filled in.
/// Every other field is populated by the provisioner as remote calls succeed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct App {
    #[serde(default)]
    pub client_id: String,
    pub display_name: String,
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub tenant_id: String,
    #[serde(default)]
    pub role_assignment: RoleAssignment,
    #[serde(default)]
    pub service_principal: ServicePrincipal,
}

impl App {
    pub fn new(
        display_name: impl Into<String>,
        duration: impl Into<String>,
        tags: Vec<String>,
        node_resource_group: impl Into<String>,
    ) -> Self {
        App {
            display_name: display_name.into(),
            role_assignment: RoleAssignment {
                node_resource_group: node_resource_group.into(),
                ..Default::default()
            },
            service_principal: ServicePrincipal {
                duration: duration.into(),
                tags,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// How far provisioning got, judged by which remote identifiers are set.
    pub fn phase(&self) -> ProvisionPhase {
        if !self.role_assignment.object_id.is_empty() {
            ProvisionPhase::RoleAssigned
        } else if !self.service_principal.object_id.is_empty() {
            ProvisionPhase::PrincipalCreated
        } else if !self.object_id.is_empty() {
            ProvisionPhase::ApplicationCreated
        } else {
            ProvisionPhase::Pending
        }
    }

    /// Object id of the application, or an error if it was never created.
    pub fn require_object_id(&self) -> Result<&str, DomainError> {
        non_empty(&self.object_id, "application object id")
    }

    /// Client (app) id of the application, or an error if it was never created.
    pub fn require_client_id(&self) -> Result<&str, DomainError> {
        non_empty(&self.client_id, "application client id")
    }
}

fn non_empty<'a>(value: &'a str, what: &'static str) -> Result<&'a str, DomainError> {
    if value.is_empty() {
        Err(DomainError::MissingIdentifier(what))
    } else {
        Ok(value)
    }
}

#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePrincipal {
    #[serde(default)]
    pub client_secret: String,
    #[serde(default)]
    pub client_secret_expiration: Option<DateTime<Utc>>,
    pub duration: String,
    #[serde(default)]
    pub object_id: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ServicePrincipal {
    pub fn require_object_id(&self) -> Result<&str, DomainError> {
        non_empty(&self.object_id, "service principal object id")
    }
}

// Keeps the secret out of logs and panic messages.
impl std::fmt::Debug for ServicePrincipal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = if self.client_secret.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("ServicePrincipal")
            .field("client_secret", &secret)
            .field("client_secret_expiration", &self.client_secret_expiration)
            .field("duration", &self.duration)
            .field("object_id", &self.object_id)
            .field("tags", &self.tags)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    /// Server-assigned assignment name (a GUID).
    #[serde(default)]
    pub name: String,
    pub node_resource_group: String,
    /// Fully-qualified ARM id of the assignment.
    #[serde(default)]
    pub object_id: String,
}

impl RoleAssignment {
    pub fn require_object_id(&self) -> Result<&str, DomainError> {
        non_empty(&self.object_id, "role assignment object id")
    }
}

// ── Phases ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionPhase {
    Pending,
    ApplicationCreated,
    PrincipalCreated,
    RoleAssigned,
}

impl std::fmt::Display for ProvisionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProvisionPhase::Pending => write!(f, "pending"),
            ProvisionPhase::ApplicationCreated => write!(f, "application_created"),
            ProvisionPhase::PrincipalCreated => write!(f, "principal_created"),
            ProvisionPhase::RoleAssigned => write!(f, "role_assigned"),
        }
    }
}
