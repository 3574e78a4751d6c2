//! Authentication - Bearer tokens for Resource Manager requests

use async_trait::async_trait;
use azurerm_core::provider::{ProviderError, ProviderResult};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::config::{CloudEnvironment, Credentials};

/// Tokens are renewed this long before they expire
const EXPIRY_MARGIN_MINUTES: i64 = 5;

/// Source of bearer tokens
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// A token valid for at least the next few minutes
    async fn token(&self) -> ProviderResult<String>;
}

/// A fixed, externally obtained token (ARM_ACCESS_TOKEN)
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenCredential for StaticToken {
    async fn token(&self) -> ProviderResult<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: String,
}

/// OAuth2 client-credentials flow against the login endpoint
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
    scope: String,
    cache: Mutex<Option<CachedToken>>,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            http,
            authority: authority.into().trim_end_matches('/').to_string(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            scope: scope.into(),
            cache: Mutex::new(None),
        }
    }

    async fn request_token(&self) -> ProviderResult<CachedToken> {
        let url = format!("{}/{}/oauth2/v2.0/token", self.authority, self.tenant_id);
        log::debug!("Requesting token from {}", url);

        let response = self
            .http
            .post(&url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("scope", self.scope.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::wrap("requesting access token", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(err) => format!("{}: {}", err.error, err.error_description),
                Err(_) => body,
            };
            return Err(ProviderError::new(format!(
                "requesting access token: HTTP {}: {}",
                status.as_u16(),
                message
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::wrap("decoding access token response", e))?;

        Ok(CachedToken {
            access_token: token.access_token,
            expires_at: Utc::now() + Duration::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    async fn token(&self) -> ProviderResult<String> {
        let mut cache = self.cache.lock().await;

        if let Some(cached) = cache.as_ref()
            && Utc::now() + Duration::minutes(EXPIRY_MARGIN_MINUTES) < cached.expires_at
        {
            return Ok(cached.access_token.clone());
        }

        let fresh = self.request_token().await?;
        let token = fresh.access_token.clone();
        *cache = Some(fresh);
        Ok(token)
    }
}

/// Build the credential described by the configuration
pub fn credential_for(
    http: reqwest::Client,
    credentials: &Credentials,
    environment: CloudEnvironment,
    scope: String,
) -> Box<dyn TokenCredential> {
    match credentials {
        Credentials::AccessToken(token) => Box::new(StaticToken::new(token.clone())),
        Credentials::ClientSecret {
            tenant_id,
            client_id,
            client_secret,
        } => Box::new(ClientSecretCredential::new(
            http,
            environment.login_endpoint(),
            tenant_id.clone(),
            client_id.clone(),
            client_secret.clone(),
            scope,
        )),
    }
}
