use async_trait::async_trait;
use convergent_application::{DirectoryRepository, RoleAssignmentRepository};
use convergent_core::{AppError, AppResult, ResourceKind};
use convergent_domain::{
    AppRole, AppRoleAssignment, AppRoleGrant, Application, KeyCredential, RequiredResourceAccess,
    RoleAssignment, ServicePrincipal,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory directory and authorization service with a call journal.
///
/// Backs dry runs and end-to-end tests of the bootstrap pipeline.
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    applications: RwLock<Vec<Application>>,
    service_principals: RwLock<Vec<ServicePrincipal>>,
    app_role_assignments: RwLock<Vec<AppRoleAssignment>>,
    role_assignments: RwLock<Vec<RoleAssignment>>,
    journal: RwLock<Vec<String>>,
}

impl InMemoryDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource API service principal exposing every role id
    /// requested in `required_resource_access`.
    ///
    /// Resources that already have a service principal are left untouched.
    pub async fn seed_resource_principals(&self, required_resource_access: &[RequiredResourceAccess]) {
        let mut service_principals = self.service_principals.write().await;
        for entry in required_resource_access {
            if service_principals
                .iter()
                .any(|principal| principal.app_id() == entry.resource_app_id())
            {
                continue;
            }

            let app_roles = entry
                .role_ids()
                .map(|role_id| AppRole::new(role_id, role_id.to_string()))
                .collect();
            service_principals.push(ServicePrincipal::new(
                Uuid::new_v4(),
                entry.resource_app_id(),
                None,
                app_roles,
            ));
        }
    }

    /// Adds a service principal as is.
    pub async fn insert_service_principal(&self, service_principal: ServicePrincipal) {
        self.service_principals.write().await.push(service_principal);
    }

    /// Returns the current snapshot of an application.
    pub async fn application(&self, application_id: Uuid) -> Option<Application> {
        self.applications
            .read()
            .await
            .iter()
            .find(|application| application.id() == application_id)
            .cloned()
    }

    /// Returns every app role assignment.
    pub async fn app_role_assignments(&self) -> Vec<AppRoleAssignment> {
        self.app_role_assignments.read().await.clone()
    }

    /// Returns every call made so far, in order.
    pub async fn journal(&self) -> Vec<String> {
        self.journal.read().await.clone()
    }

    /// Returns only the calls that changed state.
    pub async fn mutations(&self) -> Vec<String> {
        self.journal()
            .await
            .into_iter()
            .filter(|call| call.starts_with("create_") || call.starts_with("patch_"))
            .collect()
    }

    async fn record(&self, call: &str) {
        self.journal.write().await.push(call.to_owned());
    }

    async fn rebuild_application(
        &self,
        application_id: Uuid,
        rebuild: impl FnOnce(&Application) -> Application,
    ) -> AppResult<()> {
        let mut applications = self.applications.write().await;
        let application = applications
            .iter_mut()
            .find(|application| application.id() == application_id)
            .ok_or_else(|| {
                AppError::not_found(
                    ResourceKind::Application,
                    format!("application '{application_id}' does not exist"),
                )
            })?;
        *application = rebuild(application);
        Ok(())
    }
}

#[async_trait]
impl DirectoryRepository for InMemoryDirectory {
    async fn list_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Vec<Application>> {
        self.record("list_applications").await;
        Ok(self
            .applications
            .read()
            .await
            .iter()
            .filter(|application| application.display_name() == display_name)
            .cloned()
            .collect())
    }

    async fn create_application(&self, display_name: &str) -> AppResult<Application> {
        self.record("create_application").await;
        let application = Application::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            display_name,
            Vec::new(),
            Vec::new(),
        );
        self.applications.write().await.push(application.clone());
        Ok(application)
    }

    async fn patch_application_key_credentials(
        &self,
        application_id: Uuid,
        key_credentials: &[KeyCredential],
    ) -> AppResult<()> {
        self.record("patch_key_credentials").await;
        self.rebuild_application(application_id, |application| {
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
        self.record("patch_required_resource_access").await;
        self.rebuild_application(application_id, |application| {
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
        self.record("find_service_principal_by_app_id").await;
        Ok(self
            .service_principals
            .read()
            .await
            .iter()
            .find(|principal| principal.app_id() == app_id)
            .cloned())
    }

    async fn find_service_principal(
        &self,
        service_principal_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        self.record("find_service_principal").await;
        Ok(self
            .service_principals
            .read()
            .await
            .iter()
            .find(|principal| principal.id() == service_principal_id)
            .cloned())
    }

    async fn create_service_principal(&self, app_id: Uuid) -> AppResult<ServicePrincipal> {
        self.record("create_service_principal").await;
        let mut service_principals = self.service_principals.write().await;
        if service_principals
            .iter()
            .any(|principal| principal.app_id() == app_id)
        {
            return Err(AppError::Conflict(format!(
                "a service principal for application '{app_id}' already exists"
            )));
        }

        let service_principal = ServicePrincipal::new(Uuid::new_v4(), app_id, None, Vec::new());
        service_principals.push(service_principal.clone());
        Ok(service_principal)
    }

    async fn list_app_role_assignments(
        &self,
        principal_id: Uuid,
    ) -> AppResult<Vec<AppRoleAssignment>> {
        self.record("list_app_role_assignments").await;
        Ok(self
            .app_role_assignments
            .read()
            .await
            .iter()
            .filter(|assignment| assignment.principal_id() == principal_id)
            .cloned()
            .collect())
    }

    async fn create_app_role_assignment(
        &self,
        grant: AppRoleGrant,
    ) -> AppResult<AppRoleAssignment> {
        self.record("create_app_role_assignment").await;
        let exposes_role = self
            .service_principals
            .read()
            .await
            .iter()
            .find(|principal| principal.id() == grant.resource_id)
            .is_some_and(|resource| {
                resource
                    .app_roles()
                    .iter()
                    .any(|role| role.id() == grant.app_role_id)
            });
        if !exposes_role {
            return Err(AppError::Validation(format!(
                "resource '{}' does not expose app role '{}'",
                grant.resource_id, grant.app_role_id
            )));
        }

        let assignment = AppRoleAssignment::new(
            Uuid::new_v4().to_string(),
            grant.principal_id,
            grant.resource_id,
            grant.app_role_id,
        );
        self.app_role_assignments
            .write()
            .await
            .push(assignment.clone());
        Ok(assignment)
    }
}

#[async_trait]
impl RoleAssignmentRepository for InMemoryDirectory {
    async fn list_role_assignments(
        &self,
        _scope: &str,
        principal_id: Uuid,
    ) -> AppResult<Vec<RoleAssignment>> {
        self.record("list_role_assignments").await;
        Ok(self
            .role_assignments
            .read()
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
        self.record("create_role_assignment").await;
        let assignment = RoleAssignment::new(
            format!("{scope}/providers/Microsoft.Authorization/roleAssignments/{name}"),
            name.to_string(),
            scope,
            role_definition_id,
            principal_id,
            Some("ServicePrincipal".to_owned()),
        );
        self.role_assignments.write().await.push(assignment.clone());
        Ok(assignment)
    }
}
