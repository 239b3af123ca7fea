use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use convergent_core::{AccessToken, AppError, AppResult};
use serde::Deserialize;
use tokio::process::Command;

use super::{AccessTokenProvider, DEFAULT_TOKEN_LIFETIME};

/// Issues tokens through `az account get-access-token`.
pub struct AzureCliTokenProvider {
    program: String,
    tenant_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CliToken {
    #[serde(rename = "accessToken")]
    access_token: String,
    expires_on: Option<u64>,
}

impl AzureCliTokenProvider {
    /// Creates a provider that shells out to the `az` binary on `PATH`.
    #[must_use]
    pub fn new(tenant_id: Option<String>) -> Self {
        Self::with_program("az", tenant_id)
    }

    /// Creates a provider that runs an alternate CLI binary.
    #[must_use]
    pub fn with_program(program: impl Into<String>, tenant_id: Option<String>) -> Self {
        Self {
            program: program.into(),
            tenant_id,
        }
    }

    fn arguments<'a>(&'a self, resource: &'a str) -> Vec<&'a str> {
        let mut arguments = vec!["account", "get-access-token", "--resource", resource];
        if let Some(tenant_id) = self.tenant_id.as_deref() {
            arguments.extend(["--tenant", tenant_id]);
        }
        arguments.extend(["--output", "json"]);
        arguments
    }
}

#[async_trait]
impl AccessTokenProvider for AzureCliTokenProvider {
    async fn access_token(&self, resource: &str) -> AppResult<AccessToken> {
        let output = Command::new(self.program.as_str())
            .args(self.arguments(resource))
            .output()
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to run '{}': {error}; install the Azure CLI or pick another credential source",
                    self.program
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::Forbidden(format!(
                "az account get-access-token failed: {}; run 'az login' first",
                stderr.trim()
            )));
        }

        parse_cli_token(output.stdout.as_slice())
    }
}

pub(super) fn parse_cli_token(stdout: &[u8]) -> AppResult<AccessToken> {
    let token: CliToken = serde_json::from_slice(stdout).map_err(|error| {
        AppError::Internal(format!("unexpected az account get-access-token output: {error}"))
    })?;

    let lifetime = token
        .expires_on
        .and_then(|expires_on| {
            let now = SystemTime::now().duration_since(UNIX_EPOCH).ok()?.as_secs();
            Some(expires_on.saturating_sub(now))
        })
        .map_or(DEFAULT_TOKEN_LIFETIME, Duration::from_secs);

    Ok(AccessToken::new(token.access_token, lifetime))
}
