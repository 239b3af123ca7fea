use std::time::Duration;

use async_trait::async_trait;
use convergent_core::{AccessToken, AppError, AppResult};
use serde::Deserialize;
use url::Url;

use super::{AccessTokenProvider, DEFAULT_TOKEN_LIFETIME};

const IMDS_TOKEN_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Issues tokens from the instance metadata service.
pub struct ManagedIdentityTokenProvider {
    http_client: reqwest::Client,
    endpoint: String,
    client_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImdsToken {
    access_token: String,
    expires_in: Option<String>,
}

impl ManagedIdentityTokenProvider {
    /// Creates a provider against the well-known metadata endpoint.
    #[must_use]
    pub fn new(http_client: reqwest::Client, client_id: Option<String>) -> Self {
        Self::with_endpoint(http_client, IMDS_TOKEN_ENDPOINT, client_id)
    }

    /// Creates a provider against an alternate token endpoint.
    #[must_use]
    pub fn with_endpoint(
        http_client: reqwest::Client,
        endpoint: impl Into<String>,
        client_id: Option<String>,
    ) -> Self {
        Self {
            http_client,
            endpoint: endpoint.into(),
            client_id,
        }
    }

    fn token_url(&self, resource: &str) -> AppResult<Url> {
        let mut url = Url::parse(self.endpoint.as_str()).map_err(|error| {
            AppError::Validation(format!(
                "invalid metadata endpoint '{}': {error}",
                self.endpoint
            ))
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("api-version", "2018-02-01");
            query.append_pair("resource", resource);
            if let Some(client_id) = self.client_id.as_deref() {
                query.append_pair("client_id", client_id);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl AccessTokenProvider for ManagedIdentityTokenProvider {
    async fn access_token(&self, resource: &str) -> AppResult<AccessToken> {
        let response = self
            .http_client
            .get(self.token_url(resource)?)
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("metadata token request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Forbidden(format!(
                "metadata token request returned {status}: {}",
                body.trim()
            )));
        }

        let token: ImdsToken = response.json().await.map_err(|error| {
            AppError::Internal(format!("unexpected metadata token payload: {error}"))
        })?;
        let lifetime = token
            .expires_in
            .as_deref()
            .and_then(|value| value.parse::<u64>().ok())
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

        Ok(AccessToken::new(token.access_token, lifetime))
    }
}
