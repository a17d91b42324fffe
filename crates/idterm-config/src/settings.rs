use std::time::Duration;

use idterm_domain::READER_ROLE_ID;

pub const DEFAULT_USER_AGENT: &str = concat!("idterm/", env!("CARGO_PKG_VERSION"));

/// Process-wide settings, constructed once and handed to the provisioner and
/// the REST clients. Never mutated after loading.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub tenant_id: String,
    pub subscription_id: String,
    pub user_agent: String,
    /// Role granted to new principals: a GUID or a fully-qualified definition id.
    pub role_definition: String,
    pub endpoints: Endpoints,
    /// Client credentials used to authenticate outbound calls.
    /// Absent = managed identity or Azure CLI.
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub retry: RetrySettings,
}

impl Settings {
    pub fn new(tenant_id: impl Into<String>, subscription_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            subscription_id: subscription_id.into(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            role_definition: READER_ROLE_ID.to_string(),
            endpoints: Endpoints::default(),
            client_id: None,
            client_secret: None,
            retry: RetrySettings::default(),
        }
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("tenant_id", &self.tenant_id)
            .field("subscription_id", &self.subscription_id)
            .field("user_agent", &self.user_agent)
            .field("role_definition", &self.role_definition)
            .field("endpoints", &self.endpoints)
            .field("client_id", &self.client_id)
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("retry", &self.retry)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub graph: String,
    pub management: String,
    pub login: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            graph:      "https://graph.windows.net".into(),
            management: "https://management.azure.com".into(),
            login:      "https://login.microsoftonline.com".into(),
        }
    }
}

/// Role assignment retry budget while a new principal propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
    pub deadline: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay:     Duration::from_secs(30),
            max_attempts:  20,
            deadline:      Duration::from_secs(5 * 60),
        }
    }
}
