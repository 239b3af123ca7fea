use std::fmt::{Debug, Formatter};
use std::time::{Duration, Instant};

/// Bearer token acquired for one remote resource audience.
#[derive(Clone)]
pub struct AccessToken {
    secret: String,
    expires_at: Instant,
}

impl AccessToken {
    /// Creates a token valid for the given lifetime.
    #[must_use]
    pub fn new(secret: impl Into<String>, lifetime: Duration) -> Self {
        Self {
            secret: secret.into(),
            expires_at: Instant::now() + lifetime,
        }
    }

    /// Returns the raw bearer value.
    #[must_use]
    pub fn secret(&self) -> &str {
        self.secret.as_str()
    }

    /// Returns whether the token is still usable after reserving the given margin.
    #[must_use]
    pub fn is_fresh(&self, margin: Duration) -> bool {
        Instant::now() + margin < self.expires_at
    }
}

impl Debug for AccessToken {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("AccessToken")
            .field("secret", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Where the operator credentials used to talk to Azure come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Tokens issued by the locally signed-in Azure CLI.
    AzureCli {
        /// Tenant passed to `az account get-access-token`.
        tenant_id: Option<String>,
    },
    /// Tokens issued by the instance metadata endpoint.
    ManagedIdentity {
        /// User-assigned identity client id, system-assigned when absent.
        client_id: Option<String>,
    },
    /// A pre-acquired bearer token, used for every audience.
    StaticToken {
        /// Raw bearer token.
        token: String,
    },
}

impl CredentialSource {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureCli { .. } => "azure_cli",
            Self::ManagedIdentity { .. } => "managed_identity",
            Self::StaticToken { .. } => "static",
        }
    }
}

impl Debug for CredentialSource {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AzureCli { tenant_id } => formatter
                .debug_struct("AzureCli")
                .field("tenant_id", tenant_id)
                .finish(),
            Self::ManagedIdentity { client_id } => formatter
                .debug_struct("ManagedIdentity")
                .field("client_id", client_id)
                .finish(),
            Self::StaticToken { .. } => formatter
                .debug_struct("StaticToken")
                .field("token", &"<redacted>")
                .finish(),
        }
    }
}
