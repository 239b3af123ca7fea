use std::sync::Arc;

use convergent_core::{AppError, AppResult, ResourceKind};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::token_provider::AccessTokenProvider;

/// Bearer-authenticated JSON client for one Azure REST surface.
#[derive(Clone)]
pub(crate) struct AzureRestClient {
    http_client: reqwest::Client,
    tokens: Arc<dyn AccessTokenProvider>,
    base_url: Url,
    token_resource: String,
}

impl AzureRestClient {
    pub(crate) fn new(
        http_client: reqwest::Client,
        tokens: Arc<dyn AccessTokenProvider>,
        base_url: &str,
        token_resource: impl Into<String>,
    ) -> AppResult<Self> {
        let base_url = Url::parse(base_url).map_err(|error| {
            AppError::Validation(format!("invalid base url '{base_url}': {error}"))
        })?;

        Ok(Self {
            http_client,
            tokens,
            base_url,
            token_resource: token_resource.into(),
        })
    }

    /// Joins `path` below the base url, keeping any base path segment.
    pub(crate) fn endpoint(&self, path: &str, query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        let joined = format!(
            "{}/{}",
            self.base_url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(joined.as_str());
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        url
    }

    pub(crate) async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&Value>,
    ) -> AppResult<RestResponse> {
        let token = self
            .tokens
            .access_token(self.token_resource.as_str())
            .await?;

        tracing::debug!(method = %method, url = %url, "azure request");
        let mut request = self
            .http_client
            .request(method.clone(), url.clone())
            .bearer_auth(token.secret());
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|error| {
            AppError::Internal(format!("{method} {url} transport error: {error}"))
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|error| {
            AppError::Internal(format!("{method} {url} body unavailable: {error}"))
        })?;

        Ok(RestResponse { status, body })
    }
}

/// Status and raw body of a completed request.
#[derive(Debug)]
pub(crate) struct RestResponse {
    status: StatusCode,
    body: String,
}

impl RestResponse {
    pub(crate) fn status(&self) -> StatusCode {
        self.status
    }

    /// Decodes a successful body; failures are mapped with [`RestFailure::into_app_error`].
    pub(crate) fn decode<T: DeserializeOwned>(self, kind: ResourceKind) -> AppResult<T> {
        let body = self.success_body(kind)?;
        serde_json::from_str(body.as_str()).map_err(|error| {
            AppError::Validation(format!("unexpected {kind} response shape: {error}"))
        })
    }

    /// Accepts any successful status and discards the body.
    pub(crate) fn ensure_success(self, kind: ResourceKind) -> AppResult<()> {
        self.success_body(kind).map(|_| ())
    }

    pub(crate) fn failure(&self) -> RestFailure {
        RestFailure::parse(self.status, self.body.as_str())
    }

    fn success_body(self, kind: ResourceKind) -> AppResult<String> {
        if self.status.is_success() {
            return Ok(self.body);
        }
        Err(self.failure().into_app_error(kind))
    }
}

/// Error envelope shared by Graph, ARM and Key Vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RestFailure {
    pub(crate) status: StatusCode,
    pub(crate) code: Option<String>,
    pub(crate) message: String,
}

impl RestFailure {
    pub(crate) fn parse(status: StatusCode, body: &str) -> Self {
        let envelope: Value = serde_json::from_str(body).unwrap_or(Value::Null);
        let error = envelope
            .get("error")
            .or_else(|| envelope.get("Error"))
            .unwrap_or(&envelope);
        let code = error
            .get("code")
            .and_then(Value::as_str)
            .map(str::to_owned);
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status.to_string()
                } else {
                    body.trim().to_owned()
                }
            });

        Self {
            status,
            code,
            message,
        }
    }

    pub(crate) fn has_code(&self, code: &str) -> bool {
        self.code
            .as_deref()
            .is_some_and(|value| value.eq_ignore_ascii_case(code))
    }

    pub(crate) fn into_app_error(self, kind: ResourceKind) -> AppError {
        let detail = match self.code.as_deref() {
            Some(code) => format!("{code}: {}", self.message),
            None => self.message,
        };

        match self.status {
            StatusCode::NOT_FOUND => AppError::not_found(kind, detail),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Forbidden(detail),
            StatusCode::CONFLICT => AppError::Conflict(detail),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                AppError::Validation(detail)
            }
            status => AppError::Internal(format!("{kind} request failed with {status}: {detail}")),
        }
    }
}
