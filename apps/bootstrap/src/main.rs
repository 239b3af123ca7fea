//! Convergent bootstrap runtime.

#![forbid(unsafe_code)]

mod config;
mod vault;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use convergent_application::{
    BootstrapEventSink, BootstrapOutcome, BootstrapService, BootstrapperIdentity,
    CertificateBootstrapper, DirectoryRepository, PluginInstallService, RoleAssignmentRepository,
    Sleeper,
};
use convergent_core::{AppError, AppResult};
use convergent_infrastructure::{
    ArmRoleAssignmentRepository, GraphDirectoryRepository, InMemoryDirectory,
    KeyVaultSecretStore, ProcessPluginInstaller, TokioSleeper, TracingBootstrapEventSink,
    token_provider_for,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{BootstrapConfig, BootstrapperSource};
use crate::vault::{StoredPipelineConfig, VaultBootstrap, VaultCaller};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = BootstrapConfig::load()?;
    let bootstrapper = resolve_bootstrapper(&config.bootstrapper)?;
    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;
    let tokens = token_provider_for(&config.credential_source, http_client.clone());
    let events: Arc<dyn BootstrapEventSink> = Arc::new(TracingBootstrapEventSink);
    let sleeper: Arc<dyn Sleeper> = Arc::new(TokioSleeper);

    let (directory, role_assignments): (
        Arc<dyn DirectoryRepository>,
        Arc<dyn RoleAssignmentRepository>,
    ) = if config.dry_run {
        let in_memory = Arc::new(InMemoryDirectory::new());
        if let BootstrapperIdentity::Certificate(certificate) = &bootstrapper {
            in_memory
                .seed_resource_principals(&certificate.required_resource_access)
                .await;
        }
        let directory: Arc<dyn DirectoryRepository> = in_memory.clone();
        let role_assignments: Arc<dyn RoleAssignmentRepository> = in_memory;
        (directory, role_assignments)
    } else {
        let directory: Arc<dyn DirectoryRepository> = Arc::new(GraphDirectoryRepository::new(
            http_client.clone(),
            tokens.clone(),
            config.graph_base_url.as_str(),
        )?);
        let role_assignments: Arc<dyn RoleAssignmentRepository> =
            Arc::new(ArmRoleAssignmentRepository::new(
                http_client.clone(),
                tokens.clone(),
                config.arm_base_url.as_str(),
            )?);
        (directory, role_assignments)
    };

    info!(
        tenant_id = %config.tenant_id,
        subscription_id = %config.subscription_id,
        credential_source = config.credential_source.as_str(),
        bootstrapper_kind = ?bootstrapper.kind(),
        dry_run = config.dry_run,
        "convergent-bootstrap started"
    );

    let service = BootstrapService::new(
        directory,
        role_assignments.clone(),
        sleeper,
        events.clone(),
        config.bootstrap_settings(),
    );
    let outcome = service.run(&bootstrapper).await?;
    info!(
        client_id = %outcome.client_id,
        principal_id = %outcome.principal_id,
        role_assignment_id = %outcome.subscription_role_assignment.value.id(),
        "bootstrapper converged"
    );

    if let Some(vault_config) = config.vault.clone() {
        if config.dry_run {
            warn!(vault_url = %vault_config.url, "dry run, skipping vault storage");
        } else {
            let private_key_pem = bootstrapper_private_key(&config.bootstrapper)?;
            let caller = VaultCaller::for_bootstrapper(
                config.tenant_id,
                &bootstrapper,
                &outcome,
                private_key_pem.as_deref(),
            )?;
            let stored_config = stored_pipeline_config(
                &config,
                &bootstrapper,
                &outcome,
                private_key_pem.as_deref(),
            )?;
            let store = Arc::new(KeyVaultSecretStore::new(
                http_client.clone(),
                caller.token_provider(http_client.clone(), config.authority_host.as_str())?,
                vault_config.url.as_str(),
            )?);
            info!(
                principal_id = %caller.principal_id(),
                client_id = %caller.client_id(),
                "vault calls authenticate as the bootstrapper"
            );
            VaultBootstrap::new(
                vault_config,
                config.subscription_id,
                role_assignments,
                store,
                service.transient_retry(),
                events.clone(),
            )
            .run(&caller, stored_config.as_ref())
            .await?;
        }
    }

    if !config.plugins.is_empty() {
        if config.dry_run {
            warn!(plugins = config.plugins.len(), "dry run, skipping plugin installation");
        } else {
            PluginInstallService::new(
                Arc::new(ProcessPluginInstaller::new(config.plugin_program.clone())),
                events,
            )
            .install_all(config.plugins.as_slice())
            .await?;
        }
    }

    info!("convergent-bootstrap finished");
    Ok(())
}

fn resolve_bootstrapper(source: &BootstrapperSource) -> AppResult<BootstrapperIdentity> {
    match source {
        BootstrapperSource::Certificate {
            display_name,
            certificate_path,
            required_resource_access,
            ..
        } => Ok(BootstrapperIdentity::Certificate(CertificateBootstrapper {
            display_name: display_name.clone(),
            certificate_pem: read_pem(certificate_path)?,
            required_resource_access: required_resource_access.clone(),
        })),
        BootstrapperSource::ManagedIdentity(managed_identity) => Ok(
            BootstrapperIdentity::ManagedIdentity(managed_identity.clone()),
        ),
    }
}

fn bootstrapper_private_key(source: &BootstrapperSource) -> AppResult<Option<String>> {
    match source {
        BootstrapperSource::Certificate {
            private_key_path: Some(private_key_path),
            ..
        } => read_pem(private_key_path).map(Some),
        BootstrapperSource::Certificate { .. } | BootstrapperSource::ManagedIdentity(_) => Ok(None),
    }
}

fn stored_pipeline_config(
    config: &BootstrapConfig,
    bootstrapper: &BootstrapperIdentity,
    outcome: &BootstrapOutcome,
    private_key_pem: Option<&str>,
) -> AppResult<Option<StoredPipelineConfig>> {
    let Some(vault) = config.vault.as_ref() else {
        return Ok(None);
    };
    if vault.secret_name.is_none() {
        return Ok(None);
    }

    match (bootstrapper, private_key_pem) {
        (BootstrapperIdentity::Certificate(certificate), Some(private_key_pem)) => {
            Ok(Some(StoredPipelineConfig::service_principal(
                config.tenant_id,
                outcome.client_id,
                private_key_pem,
                certificate.certificate_pem.as_str(),
            )))
        }
        (BootstrapperIdentity::ManagedIdentity(managed_identity), _) => {
            Ok(Some(StoredPipelineConfig::managed_identity(
                managed_identity.client_id,
                managed_identity.resource_id.as_str(),
            )))
        }
        (BootstrapperIdentity::Certificate(_), _) => Err(AppError::Validation(
            "BOOTSTRAPPER_KEY_PATH is required to store a certificate bootstrapper in the vault"
                .to_owned(),
        )),
    }
}

fn read_pem(path: &Path) -> AppResult<String> {
    std::fs::read_to_string(path).map_err(|error| {
        AppError::MalformedInput(format!("failed to read '{}': {error}", path.display()))
    })
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}
