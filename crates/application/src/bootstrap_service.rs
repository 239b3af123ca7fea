use std::sync::Arc;
use std::time::Duration;

use convergent_core::{AppResult, SubscriptionId};
use convergent_domain::{
    AppRoleAssignment, Application, CertificatePem, KeyCredential, RequiredResourceAccess,
    RoleAssignment,
};
use uuid::Uuid;

use crate::UpsertResult;
use crate::consent_service::AdminConsentService;
use crate::credential_service::CredentialService;
use crate::directory_ports::{DirectoryRepository, RoleAssignmentRepository};
use crate::identity_service::IdentityService;
use crate::permission_service::PermissionService;
use crate::role_assignment_service::RoleAssignmentService;
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink, BootstrapStage, Sleeper};
use crate::transient_retry::{RetryPolicy, TransientRetry};

mod bootstrapper;

pub use bootstrapper::{
    BootstrapperIdentity, BootstrapperKind, CertificateBootstrapper, ManagedIdentityBootstrapper,
};

/// Built-in Owner role definition.
pub const OWNER_ROLE_DEFINITION_ID: Uuid = Uuid::from_u128(0x8e3a_f657_a8ff_443c_a75c_2fe8_c4bc_b635);

/// Tunables of a bootstrap run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapSettings {
    /// Subscription the bootstrapper is granted a role in.
    pub subscription_id: SubscriptionId,
    /// Role definition granted at subscription scope.
    pub role_definition_id: Uuid,
    /// Wait after registering a certificate credential.
    pub credential_wait: Duration,
    /// Wait after patching required permissions.
    pub permission_wait: Duration,
    /// Retry budget while grants propagate.
    pub retry_policy: RetryPolicy,
}

impl BootstrapSettings {
    /// Creates settings with the default role and delay tiers.
    #[must_use]
    pub fn new(subscription_id: SubscriptionId) -> Self {
        Self {
            subscription_id,
            role_definition_id: OWNER_ROLE_DEFINITION_ID,
            credential_wait: Duration::from_secs(120),
            permission_wait: Duration::from_secs(60),
            retry_policy: RetryPolicy::default(),
        }
    }
}

/// Converged state of the bootstrapper.
#[derive(Debug, Clone)]
pub struct BootstrapOutcome {
    /// Client id the bootstrapper authenticates as.
    pub client_id: Uuid,
    /// Object id used as principal in grants.
    pub principal_id: Uuid,
    /// Application, for certificate bootstrappers.
    pub application: Option<Application>,
    /// Registered certificate credential, for certificate bootstrappers.
    pub key_credential: Option<KeyCredential>,
    /// Resulting required permissions, for certificate bootstrappers.
    pub required_resource_access: Vec<RequiredResourceAccess>,
    /// App roles held after admin consent.
    pub app_role_assignments: Vec<AppRoleAssignment>,
    /// Subscription role assignment of the bootstrapper.
    pub subscription_role_assignment: UpsertResult<RoleAssignment>,
}

/// Sequences identity, credential, permission and consent convergence.
///
/// Service principal, credential and permission work run together and are
/// all awaited before the first failure is returned. Admin consent starts
/// only after the permission patch and its propagation wait finished.
#[derive(Clone)]
pub struct BootstrapService {
    identity: IdentityService,
    credentials: CredentialService,
    permissions: PermissionService,
    consent: AdminConsentService,
    role_assignments: RoleAssignmentService,
    retry: TransientRetry,
    events: Arc<dyn BootstrapEventSink>,
    settings: BootstrapSettings,
}

impl BootstrapService {
    /// Wires the bootstrap pipeline over the given ports.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        role_assignments: Arc<dyn RoleAssignmentRepository>,
        sleeper: Arc<dyn Sleeper>,
        events: Arc<dyn BootstrapEventSink>,
        settings: BootstrapSettings,
    ) -> Self {
        Self {
            identity: IdentityService::new(directory.clone(), events.clone()),
            credentials: CredentialService::new(
                directory.clone(),
                sleeper.clone(),
                events.clone(),
                settings.credential_wait,
            ),
            permissions: PermissionService::new(
                directory.clone(),
                sleeper.clone(),
                events.clone(),
                settings.permission_wait,
            ),
            consent: AdminConsentService::new(directory, events.clone()),
            role_assignments: RoleAssignmentService::new(role_assignments, events.clone()),
            retry: TransientRetry::new(settings.retry_policy, sleeper, events.clone()),
            events,
            settings,
        }
    }

    /// Returns the retry helper shared with follow-up steps.
    #[must_use]
    pub fn transient_retry(&self) -> TransientRetry {
        self.retry.clone()
    }

    /// Converges the bootstrapper identity.
    pub async fn run(&self, bootstrapper: &BootstrapperIdentity) -> AppResult<BootstrapOutcome> {
        match bootstrapper {
            BootstrapperIdentity::Certificate(certificate) => {
                self.run_certificate(certificate).await
            }
            BootstrapperIdentity::ManagedIdentity(managed_identity) => {
                self.run_managed_identity(managed_identity).await
            }
        }
    }

    async fn run_certificate(
        &self,
        bootstrapper: &CertificateBootstrapper,
    ) -> AppResult<BootstrapOutcome> {
        self.enter(BootstrapStage::IdentityPending);
        let certificate = CertificatePem::parse(bootstrapper.certificate_pem.as_str())?;
        let application = self
            .identity
            .ensure_application(&bootstrapper.display_name)
            .await?
            .value;
        self.enter(BootstrapStage::IdentityReady);

        self.enter(BootstrapStage::ParallelConvergence);
        let (service_principal, key_credential, required_resource_access) = tokio::join!(
            self.identity.ensure_service_principal(&application),
            self.credentials.ensure_certificate(&application, &certificate),
            self.permissions
                .reconcile(&application, bootstrapper.required_resource_access.as_slice()),
        );
        let service_principal = service_principal?.value;
        let key_credential = key_credential?.value;
        let required_resource_access = required_resource_access?.value;
        self.enter(BootstrapStage::ConvergedOrConsentPending);

        let requests_app_roles = bootstrapper
            .required_resource_access
            .iter()
            .any(|entry| entry.role_ids().next().is_some());
        let app_role_assignments = if requests_app_roles {
            self.enter(BootstrapStage::ConsentPending);
            self.consent
                .reconcile(
                    &service_principal,
                    bootstrapper.required_resource_access.as_slice(),
                )
                .await?
                .value
        } else {
            Vec::new()
        };

        let subscription_role_assignment =
            self.grant_subscription_role(service_principal.id()).await?;
        self.enter(BootstrapStage::Converged);

        Ok(BootstrapOutcome {
            client_id: application.app_id(),
            principal_id: service_principal.id(),
            application: Some(application),
            key_credential: Some(key_credential),
            required_resource_access,
            app_role_assignments,
            subscription_role_assignment,
        })
    }

    async fn run_managed_identity(
        &self,
        bootstrapper: &ManagedIdentityBootstrapper,
    ) -> AppResult<BootstrapOutcome> {
        tracing::debug!(resource_id = %bootstrapper.resource_id, "using managed identity bootstrapper");
        self.enter(BootstrapStage::IdentityReady);
        let subscription_role_assignment =
            self.grant_subscription_role(bootstrapper.principal_id).await?;
        self.enter(BootstrapStage::Converged);

        Ok(BootstrapOutcome {
            client_id: bootstrapper.client_id,
            principal_id: bootstrapper.principal_id,
            application: None,
            key_credential: None,
            required_resource_access: Vec::new(),
            app_role_assignments: Vec::new(),
            subscription_role_assignment,
        })
    }

    async fn grant_subscription_role(
        &self,
        principal_id: Uuid,
    ) -> AppResult<UpsertResult<RoleAssignment>> {
        let scope = self.settings.subscription_id.scope();
        let role_definition_id = self
            .settings
            .subscription_id
            .role_definition_id(self.settings.role_definition_id);

        self.retry
            .run("grant subscription role", || {
                self.role_assignments
                    .upsert(scope.as_str(), role_definition_id.as_str(), principal_id)
            })
            .await
    }

    fn enter(&self, stage: BootstrapStage) {
        tracing::debug!(stage = %stage, "bootstrap stage");
        self.events.record(BootstrapEvent::StageChanged { stage });
    }
}

#[cfg(test)]
mod tests;
