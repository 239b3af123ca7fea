use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use convergent_core::{AccessToken, AppResult, CredentialSource};
use tokio::sync::Mutex;

mod azure_cli;
mod client_certificate;
mod managed_identity;

pub use azure_cli::AzureCliTokenProvider;
pub use client_certificate::{ClientCertificateTokenProvider, DEFAULT_AUTHORITY_HOST};
pub use managed_identity::ManagedIdentityTokenProvider;

/// Audience of Microsoft Graph tokens.
pub const GRAPH_TOKEN_RESOURCE: &str = "https://graph.microsoft.com";
/// Audience of Azure Resource Manager tokens.
pub const ARM_TOKEN_RESOURCE: &str = "https://management.azure.com";
/// Audience of Key Vault data-plane tokens.
pub const KEY_VAULT_TOKEN_RESOURCE: &str = "https://vault.azure.net";

/// Lifetime assumed when the issuer does not report one.
pub(crate) const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Source of bearer tokens per resource audience.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// Returns a token for the given resource audience.
    async fn access_token(&self, resource: &str) -> AppResult<AccessToken>;
}

/// Pre-acquired token used for every audience.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Creates a static token provider.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for StaticTokenProvider {
    async fn access_token(&self, _resource: &str) -> AppResult<AccessToken> {
        Ok(AccessToken::new(self.token.clone(), DEFAULT_TOKEN_LIFETIME))
    }
}

/// Caches tokens per audience until shortly before they expire.
pub struct CachedTokenProvider {
    inner: Arc<dyn AccessTokenProvider>,
    refresh_margin: Duration,
    cache: Mutex<HashMap<String, AccessToken>>,
}

impl CachedTokenProvider {
    /// Wraps a provider, refreshing tokens `refresh_margin` before expiry.
    #[must_use]
    pub fn new(inner: Arc<dyn AccessTokenProvider>, refresh_margin: Duration) -> Self {
        Self {
            inner,
            refresh_margin,
            cache: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl AccessTokenProvider for CachedTokenProvider {
    async fn access_token(&self, resource: &str) -> AppResult<AccessToken> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache
            .get(resource)
            .filter(|token| token.is_fresh(self.refresh_margin))
        {
            return Ok(token.clone());
        }

        let token = self.inner.access_token(resource).await?;
        cache.insert(resource.to_owned(), token.clone());
        Ok(token)
    }
}

/// Builds the cached provider matching the configured credential source.
#[must_use]
pub fn token_provider_for(
    source: &CredentialSource,
    http_client: reqwest::Client,
) -> Arc<dyn AccessTokenProvider> {
    let inner: Arc<dyn AccessTokenProvider> = match source {
        CredentialSource::AzureCli { tenant_id } => {
            Arc::new(AzureCliTokenProvider::new(tenant_id.clone()))
        }
        CredentialSource::ManagedIdentity { client_id } => Arc::new(
            ManagedIdentityTokenProvider::new(http_client, client_id.clone()),
        ),
        CredentialSource::StaticToken { token } => Arc::new(StaticTokenProvider::new(token.clone())),
    };

    cached(inner)
}

/// Wraps a provider in a per-audience cache refreshing a minute before expiry.
#[must_use]
pub fn cached(inner: Arc<dyn AccessTokenProvider>) -> Arc<dyn AccessTokenProvider> {
    Arc::new(CachedTokenProvider::new(inner, Duration::from_secs(60)))
}
