use serde::{Deserialize, Serialize};

/// Raw YAML representation of the settings file.
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawSettings {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub user_agent: Option<String>,
    /// Role definition GUID or fully-qualified id. Absent = built-in Reader.
    pub role_definition: Option<String>,
    #[serde(default)]
    pub endpoints: RawEndpoints,
    #[serde(default)]
    pub credentials: RawCredentials,
    #[serde(default)]
    pub retry: RawRetry,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawEndpoints {
    pub graph: Option<String>,
    pub management: Option<String>,
    pub login: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Durations use the same grammar as credential lifetimes ("1s", "5m", ...).
#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RawRetry {
    pub initial_delay: Option<String>,
    pub max_delay: Option<String>,
    pub max_attempts: Option<u32>,
    pub deadline: Option<String>,
}
