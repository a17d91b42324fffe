use std::time::Duration;

use idterm_client::ClientError;
use idterm_domain::{App, DomainError, ProvisionPhase};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Caller input could not be interpreted. Raised before any remote call.
    #[error("configuration error: {0}")]
    Configuration(#[from] DomainError),

    #[error("directory error: {0}")]
    Directory(#[source] ClientError),

    #[error("authorization error: {0}")]
    Authorization(#[source] ClientError),

    /// The role assignment kept failing transiently until the retry budget ran out.
    #[error("role assignment not accepted after {attempts} attempt(s) in {elapsed:?}; last error: {last_error}")]
    RoleAssignmentTimedOut {
        attempts: u32,
        elapsed: Duration,
        last_error: String,
    },

    #[error("client setup failed: {0}")]
    Client(#[source] ClientError),
}

/// A provisioning run that stopped part-way.
///
/// `app` holds every identifier that was created before the failure, so the
/// caller can inspect it and compensate (typically by deprovisioning).
#[derive(Debug, Error)]
#[error("provisioning of {:?} stopped at phase {phase}: {error}", app.display_name)]
pub struct PartialProvision {
    pub app: App,
    pub phase: ProvisionPhase,
    #[source]
    pub error: ProvisionError,
}
