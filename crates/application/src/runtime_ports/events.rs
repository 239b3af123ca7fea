use std::fmt::{Display, Formatter};
use std::time::Duration;

use convergent_domain::ResourceAccessKind;
use uuid::Uuid;

/// Progress of one bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BootstrapStage {
    /// Application lookup or creation in flight.
    IdentityPending,
    /// Application resolved.
    IdentityReady,
    /// Service principal, credential and permission work running together.
    ParallelConvergence,
    /// Parallel work joined; consent may still be required.
    ConvergedOrConsentPending,
    /// Admin consent grants in flight.
    ConsentPending,
    /// Every step completed.
    Converged,
}

impl BootstrapStage {
    /// Returns a stable storage-friendly label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::IdentityPending => "identity_pending",
            Self::IdentityReady => "identity_ready",
            Self::ParallelConvergence => "parallel_convergence",
            Self::ConvergedOrConsentPending => "converged_or_consent_pending",
            Self::ConsentPending => "consent_pending",
            Self::Converged => "converged",
        }
    }
}

impl Display for BootstrapStage {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Observable side effect of a bootstrap step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// Orchestrator moved to another stage.
    StageChanged {
        /// New stage.
        stage: BootstrapStage,
    },
    /// Application lookup finished.
    ApplicationResolved {
        /// Directory object id.
        application_id: Uuid,
        /// Client id.
        app_id: Uuid,
        /// Display name looked up.
        display_name: String,
        /// Whether the application was created by this run.
        created_new: bool,
    },
    /// Service principal lookup finished.
    ServicePrincipalResolved {
        /// Directory object id.
        service_principal_id: Uuid,
        /// Client id.
        app_id: Uuid,
        /// Whether the principal was created by this run.
        created_new: bool,
    },
    /// Certificate credential lookup finished, before any registration.
    CredentialChecked {
        /// Application receiving the credential.
        application_id: Uuid,
        /// Uppercase hex thumbprint.
        thumbprint: String,
        /// Propagation wait applied after a registration.
        wait: Duration,
        /// Whether the credential is registered by this run.
        created_new: bool,
    },
    /// Certificate credential is present on the application.
    CredentialReconciled {
        /// Application holding the credential.
        application_id: Uuid,
        /// Uppercase hex thumbprint.
        thumbprint: String,
        /// Whether the credential was registered by this run.
        created_new: bool,
    },
    /// Desired permission id already exists with another kind and was left as is.
    PermissionKindConflict {
        /// Resource API.
        resource_app_id: Uuid,
        /// Permission id.
        access_id: Uuid,
        /// Kind kept.
        current_kind: ResourceAccessKind,
        /// Kind requested.
        desired_kind: ResourceAccessKind,
    },
    /// Required permissions are about to be patched.
    PermissionsPatching {
        /// Application being patched.
        application_id: Uuid,
        /// Number of resource APIs added or merged.
        changed_resources: usize,
        /// Propagation wait applied after the write.
        wait: Duration,
    },
    /// Required permissions cover the desired set.
    PermissionsReconciled {
        /// Application checked.
        application_id: Uuid,
        /// Whether a patch was issued by this run.
        created_new: bool,
    },
    /// One app role was granted during admin consent.
    AppRoleGranted {
        /// Principal receiving the role.
        principal_id: Uuid,
        /// Resource service principal exposing the role.
        resource_id: Uuid,
        /// Granted role.
        app_role_id: Uuid,
    },
    /// Admin consent covers the desired app roles.
    AdminConsentReconciled {
        /// Principal checked.
        principal_id: Uuid,
        /// Number of grants issued by this run.
        granted: usize,
    },
    /// Role assignment lookup finished.
    RoleAssignmentResolved {
        /// Scope of the assignment.
        scope: String,
        /// Fully qualified role definition id.
        role_definition_id: String,
        /// Principal holding the role.
        principal_id: Uuid,
        /// Principal type reported by the authorization service.
        principal_type: Option<String>,
        /// Whether the assignment was created by this run.
        created_new: bool,
    },
    /// Action hit a propagation-pending authorization error and will retry.
    TransientRetryScheduled {
        /// Operation being retried.
        operation: String,
        /// Failed attempt number, starting at one.
        attempt: u32,
        /// Wait before the next attempt.
        wait: Duration,
    },
    /// Vault key lookup finished.
    VaultKeyResolved {
        /// Key name.
        name: String,
        /// Whether the key was created by this run.
        created_new: bool,
    },
    /// Vault secret upsert finished.
    VaultSecretResolved {
        /// Secret name.
        name: String,
        /// Short SHA-256 fingerprint of the value.
        fingerprint: String,
        /// Whether a new version was written by this run.
        created_new: bool,
    },
    /// Plugin installed.
    PluginInstalled {
        /// Plugin name.
        name: String,
        /// Version tag installed.
        version: String,
    },
    /// Plugin installation failed.
    PluginInstallFailed {
        /// Plugin name.
        name: String,
        /// Version tag requested.
        version: String,
        /// Failure description.
        error: String,
    },
}

/// Sink receiving bootstrap progress events.
pub trait BootstrapEventSink: Send + Sync {
    /// Records one event.
    fn record(&self, event: BootstrapEvent);
}
