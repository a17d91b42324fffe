use std::sync::Arc;

use chrono::Utc;
use idterm_client::{
    Application, ApplicationCreateParameters, ArmAuthorizationClient, AuthorizationClient,
    AuthorizerProvider, DirectoryClient, GraphDirectoryClient, PasswordCredential,
    RoleAssignmentCreateParameters, RoleAssignmentRecord, ServicePrincipalCreateParameters,
    ServicePrincipalRecord,
};
use idterm_config::Settings;
use idterm_domain::{credential_window, resource_group_scope, role_definition_id, App};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PartialProvision, ProvisionError};
use crate::retry::{classify, RetryPolicy};
use crate::secret::generate_secret;

/// Drives the application → service principal → role assignment lifecycle.
///
/// Each stage takes the aggregate by `&mut` and fills in the identifiers the
/// remote call returned, so whatever was created before a failure stays visible
/// to the caller. Calls are issued sequentially; every future is cancel-safe in
/// the sense that dropping it stops further remote calls.
pub struct Provisioner {
    settings:      Settings,
    retry:         RetryPolicy,
    directory:     Arc<dyn DirectoryClient>,
    authorization: Arc<dyn AuthorizationClient>,
}

impl Provisioner {
    pub fn new(
        settings: Settings,
        directory: Arc<dyn DirectoryClient>,
        authorization: Arc<dyn AuthorizationClient>,
    ) -> Self {
        let retry = RetryPolicy::from(&settings.retry);
        Self { settings, retry, directory, authorization }
    }

    /// Build a provisioner talking to AD Graph and ARM with authorizers from `provider`.
    pub fn from_provider(
        settings: Settings,
        provider: &dyn AuthorizerProvider,
    ) -> Result<Self, ProvisionError> {
        let graph = provider.graph_authorizer().map_err(ProvisionError::Client)?;
        let arm = provider
            .resource_management_authorizer()
            .map_err(ProvisionError::Client)?;
        let directory = GraphDirectoryClient::new(&settings, graph).map_err(ProvisionError::Client)?;
        let authorization =
            ArmAuthorizationClient::new(&settings, arm).map_err(ProvisionError::Client)?;
        Ok(Self::new(settings, Arc::new(directory), Arc::new(authorization)))
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Scope the role assignment for `app` is granted on.
    pub fn scope_for(&self, app: &App) -> String {
        resource_group_scope(
            &self.settings.subscription_id,
            &app.role_assignment.node_resource_group,
        )
    }

    // ── Application ───────────────────────────────────────────────────────────

    /// Register a single-tenant application named `app.display_name`.
    ///
    /// On success `client_id`, `object_id` and `tenant_id` are set; the tenant
    /// comes from settings, not from the response.
    pub async fn create_application(&self, app: &mut App) -> Result<Application, ProvisionError> {
        let params = ApplicationCreateParameters {
            display_name: app.display_name.clone(),
            available_to_other_tenants: false,
        };
        let created = self
            .directory
            .create_application(&params)
            .await
            .map_err(ProvisionError::Directory)?;

        app.client_id = created.app_id.clone();
        app.object_id = created.object_id.clone();
        app.tenant_id = self.settings.tenant_id.clone();
        info!(
            display_name = %app.display_name,
            client_id = %app.client_id,
            object_id = %app.object_id,
            "Application registered"
        );
        Ok(created)
    }

    /// Delete the application registration. Deleting twice is an error.
    pub async fn delete_application(&self, app: &App) -> Result<(), ProvisionError> {
        let object_id = app.require_object_id()?;
        self.directory
            .delete_application(object_id)
            .await
            .map_err(ProvisionError::Directory)?;
        info!(display_name = %app.display_name, object_id, "Application deleted");
        Ok(())
    }

    // ── Service principal ─────────────────────────────────────────────────────

    /// Create the service principal with a fresh secret valid for
    /// `app.service_principal.duration`, then grant the role assignment.
    ///
    /// The duration is parsed before anything remote happens; a bad value
    /// leaves `app` untouched. If the principal is created but the role
    /// assignment fails, the principal's identifiers stay on `app`.
    pub async fn create_service_principal(
        &self,
        app: &mut App,
    ) -> Result<ServicePrincipalRecord, ProvisionError> {
        let window = credential_window(Utc::now(), &app.service_principal.duration)?;
        let client_id = app.require_client_id()?.to_string();

        let secret = generate_secret();
        let params = ServicePrincipalCreateParameters {
            app_id: client_id.clone(),
            account_enabled: true,
            password_credentials: vec![PasswordCredential {
                key_id:     Uuid::new_v4().to_string(),
                start_date: window.start,
                end_date:   window.end,
                value:      secret.clone(),
            }],
            tags: app.service_principal.tags.clone(),
        };
        let created = self
            .directory
            .create_service_principal(&params)
            .await
            .map_err(ProvisionError::Directory)?;

        app.service_principal.client_secret = secret;
        app.service_principal.client_secret_expiration = Some(window.end);
        app.service_principal.object_id = created.object_id.clone();
        info!(
            client_id = %client_id,
            object_id = %created.object_id,
            expires = %window.end,
            "Service principal created"
        );

        self.create_role_assignment_with_retry(app).await?;
        Ok(created)
    }

    /// Delete the service principal on its own. Deleting the application
    /// removes it as well, so the normal teardown does not call this.
    pub async fn delete_service_principal(&self, app: &App) -> Result<(), ProvisionError> {
        let object_id = app.service_principal.require_object_id()?;
        self.directory
            .delete_service_principal(object_id)
            .await
            .map_err(ProvisionError::Directory)?;
        info!(display_name = %app.display_name, object_id, "Service principal deleted");
        Ok(())
    }

    // ── Role assignment ───────────────────────────────────────────────────────

    /// One attempt at granting the configured role on the node resource group.
    pub async fn create_role_assignment(
        &self,
        app: &mut App,
    ) -> Result<RoleAssignmentRecord, ProvisionError> {
        let assignment_name = Uuid::new_v4().to_string();
        self.assign_role(app, &assignment_name).await
    }

    async fn assign_role(
        &self,
        app: &mut App,
        assignment_name: &str,
    ) -> Result<RoleAssignmentRecord, ProvisionError> {
        let principal_id = app.service_principal.require_object_id()?.to_string();
        let scope = self.scope_for(app);
        let params = RoleAssignmentCreateParameters {
            role_definition_id: role_definition_id(
                &self.settings.subscription_id,
                &self.settings.role_definition,
            ),
            principal_id,
        };

        let record = self
            .authorization
            .create_role_assignment(&scope, assignment_name, &params)
            .await
            .map_err(ProvisionError::Authorization)?;

        app.role_assignment.name = record.name.clone();
        app.role_assignment.object_id = record.id.clone();
        info!(scope = %scope, name = %record.name, "Role assignment created");
        Ok(record)
    }

    /// Retry [`Self::create_role_assignment`] while the failure looks like
    /// propagation lag, with exponential backoff bounded by the retry policy's
    /// attempt count and deadline.
    pub async fn create_role_assignment_with_retry(
        &self,
        app: &mut App,
    ) -> Result<RoleAssignmentRecord, ProvisionError> {
        let started = Instant::now();
        let deadline = started + self.retry.deadline;
        let mut attempt: u32 = 0;
        let mut last_error: Option<String> = None;

        loop {
            attempt += 1;
            let assignment_name = Uuid::new_v4().to_string();
            let outcome =
                tokio::time::timeout_at(deadline, self.assign_role(app, &assignment_name)).await;
            let err = match outcome {
                Ok(Ok(record)) => {
                    if attempt > 1 {
                        debug!(attempt, "Role assignment accepted after retry");
                    }
                    return Ok(record);
                }
                Ok(Err(ProvisionError::Authorization(err))) => err,
                Ok(Err(other)) => return Err(other),
                Err(_) => {
                    // The PUT may still land; its name is the only handle for revoking it.
                    warn!(
                        attempt,
                        name = %assignment_name,
                        scope = %self.scope_for(app),
                        "Role assignment attempt abandoned at deadline, it may exist and need manual removal"
                    );
                    return Err(ProvisionError::RoleAssignmentTimedOut {
                        attempts: attempt,
                        elapsed: started.elapsed(),
                        last_error: last_error
                            .unwrap_or_else(|| "deadline reached before any attempt completed".into()),
                    });
                }
            };

            let disposition = classify(&err);
            if !disposition.is_retryable() {
                return Err(ProvisionError::Authorization(err));
            }

            let delay = self.retry.delay_for(attempt);
            if attempt >= self.retry.max_attempts || Instant::now() + delay > deadline {
                return Err(ProvisionError::RoleAssignmentTimedOut {
                    attempts: attempt,
                    elapsed: started.elapsed(),
                    last_error: err.to_string(),
                });
            }

            warn!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                ?disposition,
                error = %err,
                "Role assignment not accepted yet, retrying"
            );
            last_error = Some(err.to_string());
            tokio::time::sleep(delay).await;
        }
    }

    /// Revoke the role assignment. Single attempt.
    pub async fn delete_role_assignment(
        &self,
        app: &App,
    ) -> Result<RoleAssignmentRecord, ProvisionError> {
        let id = app.role_assignment.require_object_id()?;
        let record = self
            .authorization
            .delete_role_assignment_by_id(id)
            .await
            .map_err(ProvisionError::Authorization)?;
        info!(id, "Role assignment deleted");
        Ok(record)
    }

    // ── Whole flow ────────────────────────────────────────────────────────────

    /// Application, then service principal and its role assignment.
    ///
    /// On failure the partially provisioned aggregate is handed back together
    /// with the phase it reached.
    pub async fn provision(&self, mut app: App) -> Result<App, PartialProvision> {
        info!(display_name = %app.display_name, "Provisioning identity");

        // Reject a bad duration before the application exists.
        if let Err(e) = credential_window(Utc::now(), &app.service_principal.duration) {
            return Err(PartialProvision { phase: app.phase(), app, error: e.into() });
        }

        if let Err(error) = self.create_application(&mut app).await {
            return Err(PartialProvision { phase: app.phase(), app, error });
        }
        if let Err(error) = self.create_service_principal(&mut app).await {
            return Err(PartialProvision { phase: app.phase(), app, error });
        }

        info!(
            display_name = %app.display_name,
            client_id = %app.client_id,
            phase = %app.phase(),
            "Identity provisioned"
        );
        Ok(app)
    }

    /// Role assignment first, then the application (which takes its service
    /// principal with it). Steps whose identifiers were never set are skipped.
    ///
    /// Identifiers are cleared on `app` as each delete succeeds, so after a
    /// failure the same aggregate can be passed in again to finish the teardown.
    pub async fn deprovision(&self, app: &mut App) -> Result<(), ProvisionError> {
        info!(display_name = %app.display_name, "Deprovisioning identity");

        if app.role_assignment.object_id.is_empty() {
            debug!(display_name = %app.display_name, "No role assignment recorded, skipping");
        } else {
            self.delete_role_assignment(app).await?;
            app.role_assignment.name.clear();
            app.role_assignment.object_id.clear();
        }

        if app.object_id.is_empty() {
            debug!(display_name = %app.display_name, "No application recorded, skipping");
        } else {
            self.delete_application(app).await?;
            app.client_id.clear();
            app.object_id.clear();
            app.service_principal.object_id.clear();
            app.service_principal.client_secret.clear();
            app.service_principal.client_secret_expiration = None;
        }
        Ok(())
    }
}
