use std::path::Path;
use std::time::Duration;

use idterm_domain::parse_duration;
use tracing::debug;

use crate::error::ConfigError;
use crate::raw::{RawRetry, RawSettings};
use crate::settings::{Endpoints, RetrySettings, Settings, DEFAULT_USER_AGENT};

pub const ENV_TENANT_ID: &str = "AZURE_TENANT_ID";
pub const ENV_SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
pub const ENV_CLIENT_ID: &str = "AZURE_CLIENT_ID";
pub const ENV_CLIENT_SECRET: &str = "AZURE_CLIENT_SECRET";

/// Load settings from an optional YAML file, with environment overrides.
///
/// Recognised variables: `AZURE_TENANT_ID`, `AZURE_SUBSCRIPTION_ID`,
/// `AZURE_CLIENT_ID`, `AZURE_CLIENT_SECRET`. Environment values win over the file.
pub fn load_settings(path: Option<&Path>) -> Result<Settings, ConfigError> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_settings`] but with an injectable environment lookup.
pub fn load_settings_with<F>(path: Option<&Path>, env: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = match path {
        Some(p) => read_raw(p)?,
        None => RawSettings::default(),
    };
    convert(raw, env)
}

fn read_raw(path: &Path) -> Result<RawSettings, ConfigError> {
    debug!("Loading settings from {}", path.display());
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
        path: path.display().to_string(),
        source: e,
    })
}

fn convert<F>(raw: RawSettings, env: F) -> Result<Settings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let pick = |key: &str, file: Option<String>| env(key).filter(|v| !v.is_empty()).or(file);

    let tenant_id = pick(ENV_TENANT_ID, raw.tenant_id)
        .ok_or(ConfigError::Missing("tenant_id", ENV_TENANT_ID))?;
    let subscription_id = pick(ENV_SUBSCRIPTION_ID, raw.subscription_id)
        .ok_or(ConfigError::Missing("subscription_id", ENV_SUBSCRIPTION_ID))?;

    let defaults = Endpoints::default();
    let endpoints = Endpoints {
        graph:      trim_endpoint(raw.endpoints.graph.unwrap_or(defaults.graph)),
        management: trim_endpoint(raw.endpoints.management.unwrap_or(defaults.management)),
        login:      trim_endpoint(raw.endpoints.login.unwrap_or(defaults.login)),
    };

    let role_definition = raw
        .role_definition
        .unwrap_or_else(|| idterm_domain::READER_ROLE_ID.to_string());
    if role_definition.trim().is_empty() {
        return Err(ConfigError::Invalid {
            key: "role_definition",
            message: "must not be empty".into(),
        });
    }

    Ok(Settings {
        tenant_id,
        subscription_id,
        user_agent: raw.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        role_definition,
        endpoints,
        client_id: pick(ENV_CLIENT_ID, raw.credentials.client_id),
        client_secret: pick(ENV_CLIENT_SECRET, raw.credentials.client_secret),
        retry: convert_retry(raw.retry)?,
    })
}

fn convert_retry(raw: RawRetry) -> Result<RetrySettings, ConfigError> {
    let defaults = RetrySettings::default();
    let retry = RetrySettings {
        initial_delay: duration_or(raw.initial_delay, defaults.initial_delay)?,
        max_delay:     duration_or(raw.max_delay, defaults.max_delay)?,
        max_attempts:  raw.max_attempts.unwrap_or(defaults.max_attempts),
        deadline:      duration_or(raw.deadline, defaults.deadline)?,
    };
    if retry.max_attempts == 0 {
        return Err(ConfigError::Invalid {
            key: "retry.max_attempts",
            message: "must be at least 1".into(),
        });
    }
    if retry.max_delay < retry.initial_delay {
        return Err(ConfigError::Invalid {
            key: "retry.max_delay",
            message: format!(
                "{:?} is shorter than retry.initial_delay {:?}",
                retry.max_delay, retry.initial_delay
            ),
        });
    }
    Ok(retry)
}

fn duration_or(value: Option<String>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        Some(s) => Ok(parse_duration(&s)?),
        None => Ok(default),
    }
}

fn trim_endpoint(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
