use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use convergent_core::{AccessToken, AppError, AppResult};
use convergent_domain::CertificatePem;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use url::form_urlencoded;
use uuid::Uuid;

use super::{AccessTokenProvider, DEFAULT_TOKEN_LIFETIME};

/// Default Entra ID authority host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const ASSERTION_LIFETIME: Duration = Duration::from_secs(600);

/// Issues tokens for an application that authenticates with its certificate.
///
/// Each token request carries a short-lived RS256 client assertion signed with
/// the private key and identified by the certificate's SHA-1 thumbprint.
pub struct ClientCertificateTokenProvider {
    http_client: reqwest::Client,
    token_endpoint: String,
    client_id: Uuid,
    thumbprint: String,
    signing_key: EncodingKey,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    aud: &'a str,
    iss: String,
    sub: String,
    jti: String,
    nbf: u64,
    exp: u64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TokenError {
    error: Option<String>,
    error_description: Option<String>,
}

impl ClientCertificateTokenProvider {
    /// Creates a provider against the default authority.
    pub fn new(
        http_client: reqwest::Client,
        tenant_id: Uuid,
        client_id: Uuid,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> AppResult<Self> {
        Self::with_authority(
            http_client,
            DEFAULT_AUTHORITY_HOST,
            tenant_id,
            client_id,
            certificate_pem,
            private_key_pem,
        )
    }

    /// Creates a provider against an alternate authority host.
    pub fn with_authority(
        http_client: reqwest::Client,
        authority_host: &str,
        tenant_id: Uuid,
        client_id: Uuid,
        certificate_pem: &str,
        private_key_pem: &str,
    ) -> AppResult<Self> {
        let certificate = CertificatePem::parse(certificate_pem)?;
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem.as_bytes()).map_err(|error| {
            AppError::MalformedInput(format!("bootstrapper private key is not RSA PEM: {error}"))
        })?;

        Ok(Self {
            http_client,
            token_endpoint: format!(
                "{}/{tenant_id}/oauth2/v2.0/token",
                authority_host.trim_end_matches('/')
            ),
            client_id,
            thumbprint: URL_SAFE_NO_PAD.encode(certificate.thumbprint().as_bytes()),
            signing_key,
        })
    }

    fn client_assertion(&self) -> AppResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        let mut header = Header::new(Algorithm::RS256);
        header.x5t = Some(self.thumbprint.clone());
        let claims = AssertionClaims {
            aud: self.token_endpoint.as_str(),
            iss: self.client_id.to_string(),
            sub: self.client_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            nbf: now,
            exp: now + ASSERTION_LIFETIME.as_secs(),
        };

        jsonwebtoken::encode(&header, &claims, &self.signing_key)
            .map_err(|error| AppError::Internal(format!("failed to sign client assertion: {error}")))
    }
}

#[async_trait]
impl AccessTokenProvider for ClientCertificateTokenProvider {
    async fn access_token(&self, resource: &str) -> AppResult<AccessToken> {
        let scope = format!("{}/.default", resource.trim_end_matches('/'));
        let client_id = self.client_id.to_string();
        let assertion = self.client_assertion()?;
        let body = form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", "client_credentials")
            .append_pair("client_id", client_id.as_str())
            .append_pair("scope", scope.as_str())
            .append_pair("client_assertion_type", CLIENT_ASSERTION_TYPE)
            .append_pair("client_assertion", assertion.as_str())
            .finish();

        let response = self
            .http_client
            .post(self.token_endpoint.as_str())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .map_err(|error| AppError::Internal(format!("client token request failed: {error}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<TokenError>(body.as_str())
                .ok()
                .and_then(|error| error.error_description.or(error.error))
                .unwrap_or_else(|| body.trim().to_owned());
            return Err(AppError::Forbidden(format!(
                "client {} token request returned {status}: {detail}",
                self.client_id
            )));
        }

        let token: TokenResponse = response.json().await.map_err(|error| {
            AppError::Internal(format!("unexpected client token payload: {error}"))
        })?;
        let lifetime = token
            .expires_in
            .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

        Ok(AccessToken::new(token.access_token, lifetime))
    }
}
