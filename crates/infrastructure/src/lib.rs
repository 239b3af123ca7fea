//! Infrastructure adapters for application ports.

#![forbid(unsafe_code)]

mod arm_role_assignment_repository;
mod azure_rest;
mod graph_directory_repository;
mod in_memory_directory;
mod key_vault_secret_store;
mod process_plugin_installer;
mod token_provider;
mod tokio_sleeper;
mod tracing_event_sink;

pub use arm_role_assignment_repository::{ArmRoleAssignmentRepository, DEFAULT_ARM_BASE_URL};
pub use graph_directory_repository::{DEFAULT_GRAPH_BASE_URL, GraphDirectoryRepository};
pub use in_memory_directory::InMemoryDirectory;
pub use key_vault_secret_store::KeyVaultSecretStore;
pub use process_plugin_installer::{DEFAULT_PLUGIN_PROGRAM, ProcessPluginInstaller};
pub use token_provider::{
    ARM_TOKEN_RESOURCE, AccessTokenProvider, AzureCliTokenProvider, CachedTokenProvider,
    ClientCertificateTokenProvider, DEFAULT_AUTHORITY_HOST, GRAPH_TOKEN_RESOURCE,
    KEY_VAULT_TOKEN_RESOURCE, ManagedIdentityTokenProvider, StaticTokenProvider, cached,
    token_provider_for,
};
pub use tokio_sleeper::TokioSleeper;
pub use tracing_event_sink::TracingBootstrapEventSink;
