use async_trait::async_trait;
use convergent_core::AppResult;
use convergent_domain::{
    AppRoleAssignment, AppRoleGrant, Application, KeyCredential, RequiredResourceAccess,
    ServicePrincipal,
};
use uuid::Uuid;

/// Port for the remote identity directory.
///
/// Every read returns a fresh snapshot; nothing is cached between calls.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    /// Lists applications whose display name equals the given name.
    async fn list_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Vec<Application>>;

    /// Registers a new application.
    async fn create_application(&self, display_name: &str) -> AppResult<Application>;

    /// Replaces the key credential list of an application.
    async fn patch_application_key_credentials(
        &self,
        application_id: Uuid,
        key_credentials: &[KeyCredential],
    ) -> AppResult<()>;

    /// Replaces the required resource access list of an application.
    async fn patch_application_required_resource_access(
        &self,
        application_id: Uuid,
        required_resource_access: &[RequiredResourceAccess],
    ) -> AppResult<()>;

    /// Finds the service principal bound to a client id.
    async fn find_service_principal_by_app_id(
        &self,
        app_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>>;

    /// Finds a service principal by directory object id.
    async fn find_service_principal(
        &self,
        service_principal_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>>;

    /// Creates the service principal of an application.
    async fn create_service_principal(&self, app_id: Uuid) -> AppResult<ServicePrincipal>;

    /// Lists app roles held by a principal.
    async fn list_app_role_assignments(
        &self,
        principal_id: Uuid,
    ) -> AppResult<Vec<AppRoleAssignment>>;

    /// Grants one app role to a principal.
    async fn create_app_role_assignment(
        &self,
        grant: AppRoleGrant,
    ) -> AppResult<AppRoleAssignment>;
}
