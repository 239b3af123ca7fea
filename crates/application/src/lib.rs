//! Application services and ports.

#![forbid(unsafe_code)]

mod bootstrap_service;
mod consent_service;
mod credential_service;
mod directory_ports;
mod identity_service;
mod permission_service;
mod plugin_service;
mod role_assignment_service;
mod runtime_ports;
mod transient_retry;
mod upsert;
mod vault_service;

#[cfg(test)]
mod test_support;

pub use bootstrap_service::{
    BootstrapOutcome, BootstrapService, BootstrapSettings, BootstrapperIdentity, BootstrapperKind,
    CertificateBootstrapper, ManagedIdentityBootstrapper, OWNER_ROLE_DEFINITION_ID,
};
pub use consent_service::AdminConsentService;
pub use credential_service::CredentialService;
pub use directory_ports::{
    DirectoryRepository, RoleAssignmentRepository, SecretStore, VaultKey, VaultSecret,
};
pub use identity_service::IdentityService;
pub use permission_service::PermissionService;
pub use plugin_service::PluginInstallService;
pub use role_assignment_service::RoleAssignmentService;
pub use runtime_ports::{
    BootstrapEvent, BootstrapEventSink, BootstrapStage, PluginInstaller, PluginSpec, Sleeper,
};
pub use transient_retry::{RetryPolicy, TransientRetry};
pub use upsert::UpsertResult;
pub use vault_service::{VaultSecretService, secret_fingerprint};
