use std::process::Command as StdCommand;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use idterm_config::Settings;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::ClientError;

/// Tokens are refreshed this long before they actually expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

// ── Authorizer ────────────────────────────────────────────────────────────────

/// Produces bearer tokens for one resource (AD Graph or ARM).
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn token(&self) -> Result<String, ClientError>;
}

/// Hands out an authenticated [`Authorizer`] per downstream service.
pub trait AuthorizerProvider: Send + Sync {
    fn graph_authorizer(&self) -> Result<Arc<dyn Authorizer>, ClientError>;
    fn resource_management_authorizer(&self) -> Result<Arc<dyn Authorizer>, ClientError>;
}

type TokenCache = Mutex<Option<(String, Instant)>>;

async fn cached(cache: &TokenCache) -> Option<String> {
    let guard = cache.lock().await;
    match guard.as_ref() {
        Some((tok, expiry)) if Instant::now() < *expiry => Some(tok.clone()),
        _ => None,
    }
}

async fn store(cache: &TokenCache, tok: &str, expires_in: u64) {
    let expiry = Instant::now() + Duration::from_secs(expires_in).saturating_sub(EXPIRY_MARGIN);
    *cache.lock().await = Some((tok.to_string(), expiry));
}

// ── Client credentials ───────────────────────────────────────────────────────

struct ClientSecretAuthorizer {
    tenant_id:     String,
    client_id:     String,
    client_secret: String,
    login_base:    String,
    resource:      String,
    client:        reqwest::Client,
    cache:         TokenCache,
}

#[async_trait]
impl Authorizer for ClientSecretAuthorizer {
    async fn token(&self) -> Result<String, ClientError> {
        if let Some(tok) = cached(&self.cache).await {
            return Ok(tok);
        }

        let url   = format!("{}/{}/oauth2/v2.0/token", self.login_base, self.tenant_id);
        let scope = format!("{}/.default", self.resource.trim_end_matches('/'));
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];
        let resp: Value = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| ClientError::Auth(format!("client credentials token request: {}", e)))?
            .json()
            .await
            .map_err(|e| ClientError::Auth(format!("client credentials token decode: {}", e)))?;

        let tok = resp["access_token"]
            .as_str()
            .ok_or_else(|| {
                ClientError::Auth(format!(
                    "no access_token in response: {}",
                    resp["error_description"].as_str().unwrap_or("unknown error")
                ))
            })?
            .to_string();
        let expires_in = resp["expires_in"].as_u64().unwrap_or(3600);
        store(&self.cache, &tok, expires_in).await;
        debug!(resource = %self.resource, "acquired client credentials token");
        Ok(tok)
    }
}

// ── Managed Identity (IMDS) ───────────────────────────────────────────────────

struct ManagedIdentityAuthorizer {
    resource: String,
    client:   reqwest::Client,
    cache:    TokenCache,
}

#[async_trait]
impl Authorizer for ManagedIdentityAuthorizer {
    async fn token(&self) -> Result<String, ClientError> {
        if let Some(tok) = cached(&self.cache).await {
            return Ok(tok);
        }

        let resp: Value = self
            .client
            .get("http://169.254.169.254/metadata/identity/oauth2/token")
            .header("Metadata", "true")
            .query(&[("api-version", "2018-02-01"), ("resource", self.resource.as_str())])
            .send()
            .await
            .map_err(|e| ClientError::Auth(format!("IMDS token request: {}", e)))?
            .json()
            .await
            .map_err(|e| ClientError::Auth(format!("IMDS token decode: {}", e)))?;

        let tok = resp["access_token"]
            .as_str()
            .ok_or_else(|| ClientError::Auth("IMDS token: no access_token in response".into()))?
            .to_string();
        // IMDS reports expires_in as a string.
        let expires_in = resp["expires_in"]
            .as_str()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(3600);
        store(&self.cache, &tok, expires_in).await;
        debug!(resource = %self.resource, "acquired managed identity token");
        Ok(tok)
    }
}

// ── Azure CLI ─────────────────────────────────────────────────────────────────

struct AzureCliAuthorizer {
    tenant_id: String,
    resource:  String,
}

#[async_trait]
impl Authorizer for AzureCliAuthorizer {
    async fn token(&self) -> Result<String, ClientError> {
        let tenant_id = self.tenant_id.clone();
        let resource  = self.resource.clone();
        let output = tokio::task::spawn_blocking(move || {
            StdCommand::new("az")
                .args([
                    "account",
                    "get-access-token",
                    "--resource",
                    resource.as_str(),
                    "--tenant",
                    tenant_id.as_str(),
                    "--output",
                    "json",
                ])
                .output()
        })
        .await
        .map_err(|e| ClientError::Auth(format!("az CLI task: {}", e)))?
        .map_err(|e| {
            ClientError::Auth(format!(
                "az CLI not found: {}. Install Azure CLI or configure client credentials.",
                e
            ))
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ClientError::Auth(format!(
                "az account get-access-token failed: {}. Run 'az login' first.",
                stderr.trim()
            )));
        }

        let resp: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ClientError::Auth(format!("az CLI output parse: {}", e)))?;
        let tok = resp["accessToken"]
            .as_str()
            .ok_or_else(|| ClientError::Auth("az CLI: no accessToken in output".into()))?
            .to_string();
        Ok(tok)
    }
}

// ── Static (tests) ────────────────────────────────────────────────────────────

/// Returns a fixed token without any network call.
#[derive(Debug, Clone)]
pub struct StaticToken(pub String);

#[async_trait]
impl Authorizer for StaticToken {
    async fn token(&self) -> Result<String, ClientError> {
        Ok(self.0.clone())
    }
}

// ── Provider ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
enum Mode {
    ClientSecret { client_id: String, client_secret: String },
    ManagedIdentity,
    AzureCli,
}

/// Default [`AuthorizerProvider`], auto-selecting the credential source:
/// 1. `client_id` + `client_secret` in settings (file or `AZURE_CLIENT_*` env) → client credentials
/// 2. `IDENTITY_ENDPOINT` env var → Managed Identity (IMDS)
/// 3. Otherwise → Azure CLI (`az account get-access-token`)
pub struct AzureCredentials {
    mode:                Mode,
    tenant_id:           String,
    login_base:          String,
    graph_resource:      String,
    management_resource: String,
    client:              reqwest::Client,
}

impl AzureCredentials {
    pub fn from_settings(settings: &Settings) -> Result<Self, ClientError> {
        let mode = match (settings.client_id.as_deref(), settings.client_secret.as_deref()) {
            (Some(cid), Some(cs)) => Mode::ClientSecret {
                client_id:     cid.to_string(),
                client_secret: cs.to_string(),
            },
            _ if std::env::var("IDENTITY_ENDPOINT").is_ok() => Mode::ManagedIdentity,
            _ => Mode::AzureCli,
        };
        let client = reqwest::Client::builder()
            .user_agent(settings.user_agent.as_str())
            .build()
            .map_err(|e| ClientError::Auth(format!("build HTTP client: {}", e)))?;

        Ok(Self {
            mode,
            tenant_id:           settings.tenant_id.clone(),
            login_base:          settings.endpoints.login.clone(),
            graph_resource:      format!("{}/", settings.endpoints.graph),
            management_resource: format!("{}/", settings.endpoints.management),
            client,
        })
    }

    /// Which credential source was selected; for log lines.
    pub fn source(&self) -> &'static str {
        match self.mode {
            Mode::ClientSecret { .. } => "client_secret",
            Mode::ManagedIdentity => "managed_identity",
            Mode::AzureCli => "azure_cli",
        }
    }

    fn authorizer(&self, resource: &str) -> Arc<dyn Authorizer> {
        match &self.mode {
            Mode::ClientSecret { client_id, client_secret } => Arc::new(ClientSecretAuthorizer {
                tenant_id:     self.tenant_id.clone(),
                client_id:     client_id.clone(),
                client_secret: client_secret.clone(),
                login_base:    self.login_base.clone(),
                resource:      resource.to_string(),
                client:        self.client.clone(),
                cache:         Mutex::new(None),
            }),
            Mode::ManagedIdentity => Arc::new(ManagedIdentityAuthorizer {
                resource: resource.to_string(),
                client:   self.client.clone(),
                cache:    Mutex::new(None),
            }),
            Mode::AzureCli => Arc::new(AzureCliAuthorizer {
                tenant_id: self.tenant_id.clone(),
                resource:  resource.to_string(),
            }),
        }
    }
}

impl AuthorizerProvider for AzureCredentials {
    fn graph_authorizer(&self) -> Result<Arc<dyn Authorizer>, ClientError> {
        Ok(self.authorizer(&self.graph_resource))
    }

    fn resource_management_authorizer(&self) -> Result<Arc<dyn Authorizer>, ClientError> {
        Ok(self.authorizer(&self.management_resource))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        matchers::{body_string_contains, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    fn settings(server: &MockServer) -> Settings {
        let mut s = Settings::new("test-tenant", "test-sub");
        s.client_id = Some("my-client".into());
        s.client_secret = Some("my-secret".into());
        s.endpoints.login = server.uri();
        s.endpoints.graph = "https://graph.example".into();
        s
    }

    #[tokio::test]
    async fn static_token_returns_value() {
        assert_eq!(StaticToken("abc".into()).token().await.unwrap(), "abc");
    }

    #[tokio::test]
    async fn client_secret_token_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .and(body_string_contains("client_credentials"))
            .and(body_string_contains("graph.example%2F.default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "expires_in":   3600,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let creds = AzureCredentials::from_settings(&settings(&server)).unwrap();
        assert_eq!(creds.source(), "client_secret");
        let auth = creds.graph_authorizer().unwrap();
        assert_eq!(auth.token().await.unwrap(), "tok-1");
        assert_eq!(auth.token().await.unwrap(), "tok-1");
    }

    #[tokio::test]
    async fn client_secret_error_is_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/test-tenant/oauth2/v2.0/token"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "invalid_client",
                "error_description": "AADSTS7000215: Invalid client secret provided.",
            })))
            .mount(&server)
            .await;

        let creds = AzureCredentials::from_settings(&settings(&server)).unwrap();
        let err = creds.resource_management_authorizer().unwrap().token().await.unwrap_err();
        assert!(matches!(err, ClientError::Auth(_)), "got: {}", err);
        assert!(err.to_string().contains("AADSTS7000215"), "got: {}", err);
    }
}
