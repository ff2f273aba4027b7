//! Azure AD bearer tokens
//!
//! A pre-acquired token handed in at startup, the OAuth2 client-credentials
//! flow against the Microsoft identity platform, or a managed identity.
//! Acquired tokens are cached per scope until shortly before they expire.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;

use super::error::AzureError;
use crate::core::constants::{
    AZURE_APP_SERVICE_IDENTITY_API_VERSION, AZURE_IMDS_API_VERSION, TOKEN_REFRESH_MARGIN_SECS,
};
use crate::core::secret::Secret;

#[derive(Debug)]
pub enum AzureCredential {
    /// Token used as-is for every scope
    Static(Secret),
    ClientSecret(ClientSecretCredential),
    ManagedIdentity(ManagedIdentityCredential),
}

impl AzureCredential {
    /// Bearer token valid for `scope`
    pub async fn token(&self, scope: &str) -> Result<Secret, AzureError> {
        match self {
            Self::Static(token) => Ok(token.clone()),
            Self::ClientSecret(cred) => cred.token(scope).await,
            Self::ManagedIdentity(cred) => cred.token(scope).await,
        }
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: Secret,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct TokenCache(Mutex<HashMap<String, CachedToken>>);

impl TokenCache {
    async fn get_or_fetch<Fut>(
        &self,
        scope: &str,
        fetch: impl FnOnce() -> Fut,
    ) -> Result<Secret, AzureError>
    where
        Fut: Future<Output = Result<CachedToken, AzureError>>,
    {
        // Held across the request so concurrent callers share one fetch
        let mut cache = self.0.lock().await;

        if let Some(cached) = cache.get(scope)
            && cached.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now()
        {
            return Ok(cached.token.clone());
        }

        let cached = fetch().await?;
        tracing::debug!(scope, expires_at = %cached.expires_at, "Acquired Azure token");

        let token = cached.token.clone();
        cache.insert(scope.to_string(), cached);
        Ok(token)
    }
}

#[derive(Debug)]
pub struct ClientSecretCredential {
    http: reqwest::Client,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: Secret,
    cache: TokenCache,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

impl ClientSecretCredential {
    pub fn new(
        http: reqwest::Client,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: Secret,
    ) -> Self {
        Self {
            http,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret,
            cache: TokenCache::default(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }

    async fn token(&self, scope: &str) -> Result<Secret, AzureError> {
        self.cache.get_or_fetch(scope, || self.request(scope)).await
    }

    async fn request(&self, scope: &str) -> Result<CachedToken, AzureError> {
        let now = Utc::now();
        let resp = self
            .http
            .post(self.token_url())
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose()),
                ("scope", scope),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AzureError::from_response("identity platform", resp).await);
        }

        let body: TokenResponse = resp
            .json()
            .await
            .map_err(|e| AzureError::Credential(format!("invalid token response: {}", e)))?;

        Ok(CachedToken {
            token: Secret::new(body.access_token),
            expires_at: now + Duration::seconds(body.expires_in),
        })
    }
}

/// Where a managed identity token is requested
#[derive(Debug, Clone)]
pub enum ManagedIdentitySource {
    /// Local endpoint of App Service and Azure Functions (`IDENTITY_ENDPOINT`)
    AppService { endpoint: String, header: Secret },
    /// Instance Metadata Service
    Imds { endpoint: String },
}

#[derive(Debug)]
pub struct ManagedIdentityCredential {
    http: reqwest::Client,
    source: ManagedIdentitySource,
    /// User-assigned identity; `None` selects the system-assigned one
    client_id: Option<String>,
    cache: TokenCache,
}

/// Both endpoints send `expires_on` in epoch seconds, as a string or a number
#[derive(Deserialize)]
#[serde(untagged)]
enum EpochSeconds {
    Number(i64),
    Text(String),
}

impl EpochSeconds {
    fn to_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = match self {
            Self::Number(n) => *n,
            Self::Text(s) => s.trim().parse().ok()?,
        };
        DateTime::from_timestamp(secs, 0)
    }
}

#[derive(Deserialize)]
struct ManagedIdentityTokenResponse {
    access_token: String,
    expires_on: EpochSeconds,
}

impl ManagedIdentityCredential {
    pub fn new(
        http: reqwest::Client,
        source: ManagedIdentitySource,
        client_id: Option<String>,
    ) -> Self {
        Self {
            http,
            source,
            client_id,
            cache: TokenCache::default(),
        }
    }

    async fn token(&self, scope: &str) -> Result<Secret, AzureError> {
        self.cache.get_or_fetch(scope, || self.request(scope)).await
    }

    async fn request(&self, scope: &str) -> Result<CachedToken, AzureError> {
        // Managed identity endpoints take a resource, not a v2 scope
        let resource = scope.strip_suffix("/.default").unwrap_or(scope);

        let (endpoint, api_version) = match &self.source {
            ManagedIdentitySource::AppService { endpoint, .. } => {
                (endpoint, AZURE_APP_SERVICE_IDENTITY_API_VERSION)
            }
            ManagedIdentitySource::Imds { endpoint } => (endpoint, AZURE_IMDS_API_VERSION),
        };
        let mut url = reqwest::Url::parse(endpoint)
            .map_err(|e| AzureError::Url(format!("{}: {}", endpoint, e)))?;
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api-version", api_version)
                .append_pair("resource", resource);
            if let Some(client_id) = &self.client_id {
                query.append_pair("client_id", client_id);
            }
        }

        let request = match &self.source {
            ManagedIdentitySource::AppService { header, .. } => self
                .http
                .get(url)
                .header("X-IDENTITY-HEADER", header.expose()),
            ManagedIdentitySource::Imds { .. } => self.http.get(url).header("Metadata", "true"),
        };

        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(AzureError::from_response("managed identity", resp).await);
        }

        let body: ManagedIdentityTokenResponse = resp
            .json()
            .await
            .map_err(|e| AzureError::Credential(format!("invalid token response: {}", e)))?;
        let expires_at = body.expires_on.to_datetime().ok_or_else(|| {
            AzureError::Credential("invalid expires_on in token response".to_string())
        })?;

        Ok(CachedToken {
            token: Secret::new(body.access_token),
            expires_at,
        })
    }
}
