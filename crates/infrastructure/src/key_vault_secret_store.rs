//! Key Vault data-plane secret store.

use std::sync::Arc;

use async_trait::async_trait;
use convergent_application::{SecretStore, VaultKey, VaultSecret};
use convergent_core::{AppError, AppResult, ResourceKind};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::azure_rest::{AzureRestClient, RestResponse};
use crate::token_provider::{AccessTokenProvider, KEY_VAULT_TOKEN_RESOURCE};

const KEY_VAULT_API_VERSION: &str = "7.4";

/// Key Vault implementation of the secret store port.
///
/// Forbidden responses are reported as transient: they follow a role
/// assignment on the vault that has not propagated yet.
#[derive(Clone)]
pub struct KeyVaultSecretStore {
    client: AzureRestClient,
}

impl KeyVaultSecretStore {
    /// Creates a store for the vault at `vault_url`.
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<dyn AccessTokenProvider>,
        vault_url: &str,
    ) -> AppResult<Self> {
        Ok(Self {
            client: AzureRestClient::new(
                http_client,
                tokens,
                vault_url,
                KEY_VAULT_TOKEN_RESOURCE,
            )?,
        })
    }

    async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AppResult<RestResponse> {
        let url = self
            .client
            .endpoint(path, &[("api-version", KEY_VAULT_API_VERSION)]);
        let response = self.client.send(method, url, body).await?;
        if response.status() == StatusCode::FORBIDDEN {
            return Err(AppError::TransientAuthorization(format!(
                "vault access to '{path}' not granted yet: {}",
                response.failure().message
            )));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct KeyBundle {
    key: JsonWebKey,
}

#[derive(Debug, Deserialize)]
struct JsonWebKey {
    kid: String,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

#[async_trait]
impl SecretStore for KeyVaultSecretStore {
    async fn get_key(&self, name: &str) -> AppResult<Option<VaultKey>> {
        let response = self
            .call(Method::GET, format!("keys/{name}").as_str(), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let bundle: KeyBundle = response.decode(ResourceKind::Key)?;
        Ok(Some(VaultKey {
            name: name.to_owned(),
            key_id: bundle.key.kid,
        }))
    }

    async fn create_key(&self, name: &str, key_bits: u32) -> AppResult<VaultKey> {
        let body = serde_json::json!({ "kty": "RSA", "key_size": key_bits });
        let bundle: KeyBundle = self
            .call(Method::POST, format!("keys/{name}/create").as_str(), Some(&body))
            .await?
            .decode(ResourceKind::Key)?;

        Ok(VaultKey {
            name: name.to_owned(),
            key_id: bundle.key.kid,
        })
    }

    async fn get_secret(&self, name: &str) -> AppResult<Option<VaultSecret>> {
        let response = self
            .call(Method::GET, format!("secrets/{name}").as_str(), None)
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let bundle: SecretBundle = response.decode(ResourceKind::Secret)?;
        Ok(Some(VaultSecret {
            name: name.to_owned(),
            value: bundle.value,
        }))
    }

    async fn set_secret(&self, name: &str, value: &str) -> AppResult<VaultSecret> {
        let body = serde_json::json!({ "value": value });
        let bundle: SecretBundle = self
            .call(Method::PUT, format!("secrets/{name}").as_str(), Some(&body))
            .await?
            .decode(ResourceKind::Secret)?;

        Ok(VaultSecret {
            name: name.to_owned(),
            value: bundle.value,
        })
    }
}
