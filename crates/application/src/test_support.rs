use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use convergent_core::{AppError, AppResult, ResourceKind};
use convergent_domain::{
    AppRoleAssignment, AppRoleGrant, Application, KeyCredential, RequiredResourceAccess,
    RoleAssignment, ServicePrincipal,
};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::directory_ports::{
    DirectoryRepository, RoleAssignmentRepository, SecretStore, VaultKey, VaultSecret,
};
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink, PluginInstaller, PluginSpec, Sleeper};

#[derive(Default)]
pub(crate) struct RecordingSleeper {
    sleeps: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub(crate) async fn recorded(&self) -> Vec<Duration> {
        self.sleeps.lock().await.clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().await.push(duration);
    }
}

#[derive(Default)]
pub(crate) struct RecordingEventSink {
    events: std::sync::Mutex<Vec<BootstrapEvent>>,
}

impl RecordingEventSink {
    pub(crate) fn recorded(&self) -> Vec<BootstrapEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl BootstrapEventSink for RecordingEventSink {
    fn record(&self, event: BootstrapEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

#[derive(Default)]
struct FakeDirectoryState {
    applications: Vec<Application>,
    service_principals: Vec<ServicePrincipal>,
    assignments: Vec<AppRoleAssignment>,
    failing_grants: HashSet<Uuid>,
}

/// Directory fake with a call journal.
#[derive(Default)]
pub(crate) struct FakeDirectory {
    state: Mutex<FakeDirectoryState>,
    calls: Mutex<Vec<String>>,
}

impl FakeDirectory {
    pub(crate) async fn insert_application(&self, application: Application) {
        self.state.lock().await.applications.push(application);
    }

    pub(crate) async fn insert_service_principal(&self, service_principal: ServicePrincipal) {
        self.state
            .lock()
            .await
            .service_principals
            .push(service_principal);
    }

    pub(crate) async fn insert_assignment(&self, assignment: AppRoleAssignment) {
        self.state.lock().await.assignments.push(assignment);
    }

    pub(crate) async fn fail_grants_for_role(&self, app_role_id: Uuid) {
        self.state.lock().await.failing_grants.insert(app_role_id);
    }

    pub(crate) async fn application(&self, application_id: Uuid) -> Option<Application> {
        self.state
            .lock()
            .await
            .applications
            .iter()
            .find(|application| application.id() == application_id)
            .cloned()
    }

    pub(crate) async fn assignments(&self) -> Vec<AppRoleAssignment> {
        self.state.lock().await.assignments.clone()
    }

    pub(crate) async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }

    pub(crate) async fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .await
            .into_iter()
            .filter(|call| call.starts_with("create_") || call.starts_with("patch_"))
            .collect()
    }

    async fn log(&self, call: &str) {
        self.calls.lock().await.push(call.to_owned());
    }

    async fn replace_application(
        &self,
        application_id: Uuid,
        rebuild: impl FnOnce(&Application) -> Application,
    ) -> AppResult<()> {
        let mut state = self.state.lock().await;
        let Some(application) = state
            .applications
            .iter_mut()
            .find(|application| application.id() == application_id)
        else {
            return Err(AppError::not_found(
                ResourceKind::Application,
                application_id.to_string(),
            ));
        };
        *application = rebuild(application);
        Ok(())
    }
}

#[async_trait]
impl DirectoryRepository for FakeDirectory {
    async fn list_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Vec<Application>> {
        self.log("list_applications").await;
        Ok(self
            .state
            .lock()
            .await
            .applications
            .iter()
            .filter(|application| application.display_name() == display_name)
            .cloned()
            .collect())
    }

    async fn create_application(&self, display_name: &str) -> AppResult<Application> {
        self.log("create_application").await;
        let application = Application::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            display_name,
            Vec::new(),
            Vec::new(),
        );
        self.state
            .lock()
            .await
            .applications
            .push(application.clone());
        Ok(application)
    }

    async fn patch_application_key_credentials(
        &self,
        application_id: Uuid,
        key_credentials: &[KeyCredential],
    ) -> AppResult<()> {
        self.log("patch_key_credentials").await;
        self.replace_application(application_id, |application| {
            Application::new(
                application.id(),
                application.app_id(),
                application.display_name(),
                key_credentials.to_vec(),
                application.required_resource_access().to_vec(),
            )
        })
        .await
    }

    async fn patch_application_required_resource_access(
        &self,
        application_id: Uuid,
        required_resource_access: &[RequiredResourceAccess],
    ) -> AppResult<()> {
        self.log("patch_required_resource_access").await;
        self.replace_application(application_id, |application| {
            Application::new(
                application.id(),
                application.app_id(),
                application.display_name(),
                application.key_credentials().to_vec(),
                required_resource_access.to_vec(),
            )
        })
        .await
    }

    async fn find_service_principal_by_app_id(
        &self,
        app_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        self.log("find_service_principal_by_app_id").await;
        Ok(self
            .state
            .lock()
            .await
            .service_principals
            .iter()
            .find(|service_principal| service_principal.app_id() == app_id)
            .cloned())
    }

    async fn find_service_principal(
        &self,
        service_principal_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        self.log("find_service_principal").await;
        Ok(self
            .state
            .lock()
            .await
            .service_principals
            .iter()
            .find(|service_principal| service_principal.id() == service_principal_id)
            .cloned())
    }

    async fn create_service_principal(&self, app_id: Uuid) -> AppResult<ServicePrincipal> {
        self.log("create_service_principal").await;
        let service_principal = ServicePrincipal::new(Uuid::new_v4(), app_id, None, Vec::new());
        self.state
            .lock()
            .await
            .service_principals
            .push(service_principal.clone());
        Ok(service_principal)
    }

    async fn list_app_role_assignments(
        &self,
        principal_id: Uuid,
    ) -> AppResult<Vec<AppRoleAssignment>> {
        self.log("list_app_role_assignments").await;
        Ok(self
            .state
            .lock()
            .await
            .assignments
            .iter()
            .filter(|assignment| assignment.principal_id() == principal_id)
            .cloned()
            .collect())
    }

    async fn create_app_role_assignment(
        &self,
        grant: AppRoleGrant,
    ) -> AppResult<AppRoleAssignment> {
        self.log("create_app_role_assignment").await;
        let mut state = self.state.lock().await;
        if state.failing_grants.contains(&grant.app_role_id) {
            return Err(AppError::Forbidden(format!(
                "grant of role {} rejected",
                grant.app_role_id
            )));
        }

        let assignment = AppRoleAssignment::new(
            Uuid::new_v4().to_string(),
            grant.principal_id,
            grant.resource_id,
            grant.app_role_id,
        );
        state.assignments.push(assignment.clone());
        Ok(assignment)
    }
}

#[derive(Default)]
pub(crate) struct FakeRoleAssignments {
    assignments: Mutex<Vec<RoleAssignment>>,
    creations: Mutex<u32>,
}

impl FakeRoleAssignments {
    pub(crate) async fn insert(&self, assignment: RoleAssignment) {
        self.assignments.lock().await.push(assignment);
    }

    pub(crate) async fn creations(&self) -> u32 {
        *self.creations.lock().await
    }
}

#[async_trait]
impl RoleAssignmentRepository for FakeRoleAssignments {
    async fn list_role_assignments(
        &self,
        _scope: &str,
        principal_id: Uuid,
    ) -> AppResult<Vec<RoleAssignment>> {
        Ok(self
            .assignments
            .lock()
            .await
            .iter()
            .filter(|assignment| assignment.principal_id() == principal_id)
            .cloned()
            .collect())
    }

    async fn create_role_assignment(
        &self,
        scope: &str,
        name: Uuid,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> AppResult<RoleAssignment> {
        *self.creations.lock().await += 1;
        let assignment = RoleAssignment::new(
            format!("{scope}/providers/Microsoft.Authorization/roleAssignments/{name}"),
            name.to_string(),
            scope,
            role_definition_id,
            principal_id,
            Some("ServicePrincipal".to_owned()),
        );
        self.assignments.lock().await.push(assignment.clone());
        Ok(assignment)
    }
}

/// Secret store fake whose reads fail with a transient error a fixed number of times.
#[derive(Default)]
pub(crate) struct FakeSecretStore {
    keys: Mutex<HashMap<String, VaultKey>>,
    secrets: Mutex<HashMap<String, VaultSecret>>,
    pending_denials: Mutex<u32>,
    writes: Mutex<Vec<String>>,
}

impl FakeSecretStore {
    pub(crate) async fn deny_reads(&self, times: u32) {
        *self.pending_denials.lock().await = times;
    }

    pub(crate) async fn insert_secret(&self, name: &str, value: &str) {
        self.secrets.lock().await.insert(
            name.to_owned(),
            VaultSecret {
                name: name.to_owned(),
                value: value.to_owned(),
            },
        );
    }

    pub(crate) async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }

    async fn check_access(&self) -> AppResult<()> {
        let mut pending = self.pending_denials.lock().await;
        if *pending > 0 {
            *pending -= 1;
            return Err(AppError::TransientAuthorization(
                "caller is not authorized yet".to_owned(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn get_key(&self, name: &str) -> AppResult<Option<VaultKey>> {
        self.check_access().await?;
        Ok(self.keys.lock().await.get(name).cloned())
    }

    async fn create_key(&self, name: &str, key_bits: u32) -> AppResult<VaultKey> {
        self.writes
            .lock()
            .await
            .push(format!("create_key:{name}:{key_bits}"));
        let key = VaultKey {
            name: name.to_owned(),
            key_id: format!("https://vault.test/keys/{name}/1"),
        };
        self.keys.lock().await.insert(name.to_owned(), key.clone());
        Ok(key)
    }

    async fn get_secret(&self, name: &str) -> AppResult<Option<VaultSecret>> {
        self.check_access().await?;
        Ok(self.secrets.lock().await.get(name).cloned())
    }

    async fn set_secret(&self, name: &str, value: &str) -> AppResult<VaultSecret> {
        self.writes.lock().await.push(format!("set_secret:{name}"));
        let secret = VaultSecret {
            name: name.to_owned(),
            value: value.to_owned(),
        };
        self.secrets
            .lock()
            .await
            .insert(name.to_owned(), secret.clone());
        Ok(secret)
    }
}

#[derive(Default)]
pub(crate) struct FakePluginInstaller {
    failing: HashSet<String>,
    installed: Mutex<Vec<String>>,
}

impl FakePluginInstaller {
    pub(crate) fn failing_on(names: &[&str]) -> Self {
        Self {
            failing: names.iter().map(|name| (*name).to_owned()).collect(),
            installed: Mutex::new(Vec::new()),
        }
    }

    pub(crate) async fn installed(&self) -> Vec<String> {
        self.installed.lock().await.clone()
    }
}

#[async_trait]
impl PluginInstaller for FakePluginInstaller {
    async fn install(&self, plugin: &PluginSpec) -> AppResult<()> {
        if self.failing.contains(plugin.name()) {
            return Err(AppError::Internal(format!(
                "plugin {} failed to install",
                plugin.name()
            )));
        }

        self.installed
            .lock()
            .await
            .push(format!("{} {}", plugin.name(), plugin.version_tag()));
        Ok(())
    }
}

pub(crate) const FIRST_CERTIFICATE_PEM: &str = "-----BEGIN CERTIFICATE-----\nY29udmVyZ2VudC10ZXN0LWNlcnRpZmljYXRl\nLWRlci0wMDAx\n-----END CERTIFICATE-----\n";

pub(crate) const SECOND_CERTIFICATE_PEM: &str = "-----BEGIN CERTIFICATE-----\nY29udmVyZ2VudC10ZXN0LWNlcnRpZmljYXRlLWRlci0wMDAy\n-----END CERTIFICATE-----\n";

pub(crate) fn empty_application(display_name: &str) -> Application {
    Application::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        display_name,
        Vec::new(),
        Vec::new(),
    )
}
