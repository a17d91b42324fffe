use std::io::Write;
use std::path::Path;
use std::time::Duration;

use idterm_config::{load_settings_with, ConfigError, RetrySettings};

fn no_env(_: &str) -> Option<String> {
    None
}

fn fixture() -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/settings.yml")
}

fn write_yaml(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn load_valid_fixture() {
    let settings = load_settings_with(Some(&fixture()), no_env).expect("should load without error");
    assert_eq!(settings.tenant_id, "00000000-0000-0000-0000-00000000aaaa");
    assert_eq!(settings.subscription_id, "00000000-0000-0000-0000-00000000bbbb");
    assert_eq!(settings.user_agent, "idterm-tests");
    assert_eq!(settings.role_definition, idterm_domain::READER_ROLE_ID);
    // trailing slash trimmed, unset endpoints defaulted
    assert_eq!(settings.endpoints.graph, "http://127.0.0.1:9000");
    assert_eq!(settings.endpoints.management, "https://management.azure.com");
    assert_eq!(
        settings.retry,
        RetrySettings {
            initial_delay: Duration::from_millis(250),
            max_delay:     Duration::from_secs(5),
            max_attempts:  7,
            deadline:      Duration::from_secs(120),
        }
    );
}

#[test]
fn env_overrides_file() {
    let env = |key: &str| match key {
        "AZURE_TENANT_ID" => Some("env-tenant".to_string()),
        "AZURE_CLIENT_ID" => Some("env-client".to_string()),
        "AZURE_CLIENT_SECRET" => Some("env-secret".to_string()),
        _ => None,
    };
    let settings = load_settings_with(Some(&fixture()), env).unwrap();
    assert_eq!(settings.tenant_id, "env-tenant");
    assert_eq!(settings.subscription_id, "00000000-0000-0000-0000-00000000bbbb");
    assert_eq!(settings.client_id.as_deref(), Some("env-client"));
    assert_eq!(settings.client_secret.as_deref(), Some("env-secret"));
}

#[test]
fn env_only_uses_defaults() {
    let env = |key: &str| match key {
        "AZURE_TENANT_ID" => Some("t".to_string()),
        "AZURE_SUBSCRIPTION_ID" => Some("s".to_string()),
        _ => None,
    };
    let settings = load_settings_with(None, env).unwrap();
    assert_eq!(settings.retry, RetrySettings::default());
    assert!(settings.client_id.is_none());
    assert!(settings.user_agent.starts_with("idterm/"));
}

#[test]
fn missing_tenant_is_an_error() {
    let file = write_yaml("subscription_id: s\n");
    let err = load_settings_with(Some(file.path()), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::Missing("tenant_id", _)), "got: {}", err);
}

#[test]
fn bad_retry_duration_is_an_error() {
    let file = write_yaml("tenant_id: t\nsubscription_id: s\nretry:\n  deadline: soon\n");
    let err = load_settings_with(Some(file.path()), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::Domain(_)), "got: {}", err);
}

#[test]
fn zero_attempts_rejected() {
    let file = write_yaml("tenant_id: t\nsubscription_id: s\nretry:\n  max_attempts: 0\n");
    let err = load_settings_with(Some(file.path()), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid { key: "retry.max_attempts", .. }), "got: {}", err);
}

#[test]
fn unknown_keys_rejected() {
    let file = write_yaml("tenant_id: t\nsubscription_id: s\nsubscripton: typo\n");
    let err = load_settings_with(Some(file.path()), no_env).unwrap_err();
    assert!(matches!(err, ConfigError::YamlParse { .. }), "got: {}", err);
}

#[test]
fn missing_file_returns_error() {
    let path = Path::new("/nonexistent/path/settings.yml");
    assert!(matches!(
        load_settings_with(Some(path), no_env).unwrap_err(),
        ConfigError::Io { .. }
    ));
}
