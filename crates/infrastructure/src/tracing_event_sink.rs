//! Renders bootstrap progress as structured log lines.

use convergent_application::{BootstrapEvent, BootstrapEventSink};

/// Event sink writing every bootstrap event to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingBootstrapEventSink;

fn outcome(created_new: bool) -> &'static str {
    if created_new { "created" } else { "already configured" }
}

impl BootstrapEventSink for TracingBootstrapEventSink {
    fn record(&self, event: BootstrapEvent) {
        match event {
            BootstrapEvent::StageChanged { stage } => {
                tracing::debug!(stage = %stage, "bootstrap stage changed");
            }
            BootstrapEvent::ApplicationResolved {
                application_id,
                app_id,
                display_name,
                created_new,
            } => {
                tracing::info!(
                    application_id = %application_id,
                    client_id = %app_id,
                    display_name = %display_name,
                    "application {}",
                    outcome(created_new)
                );
            }
            BootstrapEvent::ServicePrincipalResolved {
                service_principal_id,
                app_id,
                created_new,
            } => {
                tracing::info!(
                    service_principal_id = %service_principal_id,
                    client_id = %app_id,
                    "service principal {}",
                    outcome(created_new)
                );
            }
            BootstrapEvent::CredentialChecked {
                application_id,
                thumbprint,
                wait,
                created_new,
            } => {
                if created_new {
                    tracing::info!(
                        application_id = %application_id,
                        thumbprint = %thumbprint,
                        wait_seconds = wait.as_secs(),
                        "registering certificate credential, waiting for propagation"
                    );
                } else {
                    tracing::debug!(
                        application_id = %application_id,
                        thumbprint = %thumbprint,
                        "certificate credential already registered"
                    );
                }
            }
            BootstrapEvent::CredentialReconciled {
                application_id,
                thumbprint,
                created_new,
            } => {
                tracing::info!(
                    application_id = %application_id,
                    thumbprint = %thumbprint,
                    "certificate credential {}",
                    outcome(created_new)
                );
            }
            BootstrapEvent::PermissionKindConflict {
                resource_app_id,
                access_id,
                current_kind,
                desired_kind,
            } => {
                tracing::warn!(
                    resource_app_id = %resource_app_id,
                    access_id = %access_id,
                    current_kind = current_kind.as_str(),
                    desired_kind = desired_kind.as_str(),
                    "permission already requested with another kind, keeping current entry"
                );
            }
            BootstrapEvent::PermissionsPatching {
                application_id,
                changed_resources,
                wait,
            } => {
                tracing::info!(
                    application_id = %application_id,
                    changed_resources,
                    wait_seconds = wait.as_secs(),
                    "patching required permissions, waiting for propagation"
                );
            }
            BootstrapEvent::PermissionsReconciled {
                application_id,
                created_new,
            } => {
                tracing::info!(
                    application_id = %application_id,
                    "required permissions {}",
                    outcome(created_new)
                );
            }
            BootstrapEvent::AppRoleGranted {
                principal_id,
                resource_id,
                app_role_id,
            } => {
                tracing::info!(
                    principal_id = %principal_id,
                    resource_id = %resource_id,
                    app_role_id = %app_role_id,
                    "app role granted"
                );
            }
            BootstrapEvent::AdminConsentReconciled {
                principal_id,
                granted,
            } => {
                tracing::info!(principal_id = %principal_id, granted, "admin consent reconciled");
            }
            BootstrapEvent::RoleAssignmentResolved {
                scope,
                role_definition_id,
                principal_id,
                principal_type,
                created_new,
            } => {
                tracing::info!(
                    scope = %scope,
                    role_definition_id = %role_definition_id,
                    principal_id = %principal_id,
                    principal_type = principal_type.as_deref().unwrap_or("unknown"),
                    "role assignment {}",
                    outcome(created_new)
                );
            }
            BootstrapEvent::TransientRetryScheduled {
                operation,
                attempt,
                wait,
            } => {
                tracing::info!(
                    operation = %operation,
                    attempt,
                    wait_seconds = wait.as_secs(),
                    "waiting for authorization to propagate"
                );
            }
            BootstrapEvent::VaultKeyResolved { name, created_new } => {
                tracing::info!(key = %name, "vault key {}", outcome(created_new));
            }
            BootstrapEvent::VaultSecretResolved {
                name,
                fingerprint,
                created_new,
            } => {
                tracing::info!(
                    secret = %name,
                    fingerprint = %fingerprint,
                    "vault secret {}",
                    outcome(created_new)
                );
            }
            BootstrapEvent::PluginInstalled { name, version } => {
                tracing::info!(plugin = %name, version = %version, "plugin installed");
            }
            BootstrapEvent::PluginInstallFailed {
                name,
                version,
                error,
            } => {
                tracing::error!(plugin = %name, version = %version, error = %error, "plugin installation failed");
            }
        }
    }
}
