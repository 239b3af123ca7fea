use std::str::FromStr;

use convergent_core::{AppError, NonEmptyString};
use convergent_domain::RequiredResourceAccess;
use uuid::Uuid;

/// Discriminant of [`BootstrapperIdentity`] as written in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapperKind {
    /// Directory application authenticated with a certificate.
    Certificate,
    /// Pre-existing user-assigned managed identity.
    ManagedIdentity,
}

impl FromStr for BootstrapperKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "certificate" => Ok(Self::Certificate),
            "managed_identity" => Ok(Self::ManagedIdentity),
            other => Err(AppError::MalformedInput(format!(
                "unrecognized bootstrapper kind '{other}', expected certificate or managed_identity"
            ))),
        }
    }
}

/// Directory application the bootstrap run converges.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateBootstrapper {
    /// Exact display name of the application.
    pub display_name: NonEmptyString,
    /// PEM document whose first certificate becomes the key credential.
    pub certificate_pem: String,
    /// Permissions the application must request and hold.
    pub required_resource_access: Vec<RequiredResourceAccess>,
}

/// Managed identity used as is; only authorization is converged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedIdentityBootstrapper {
    /// Client id of the identity.
    pub client_id: Uuid,
    /// Object id used as principal in role assignments.
    pub principal_id: Uuid,
    /// ARM resource id of the identity.
    pub resource_id: String,
}

/// Principal that performs the rest of the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapperIdentity {
    /// Certificate-authenticated application.
    Certificate(CertificateBootstrapper),
    /// Managed identity.
    ManagedIdentity(ManagedIdentityBootstrapper),
}

impl BootstrapperIdentity {
    /// Returns the discriminant.
    #[must_use]
    pub fn kind(&self) -> BootstrapperKind {
        match self {
            Self::Certificate(_) => BootstrapperKind::Certificate,
            Self::ManagedIdentity(_) => BootstrapperKind::ManagedIdentity,
        }
    }
}
