use async_trait::async_trait;
use convergent_core::AppResult;
use convergent_domain::RoleAssignment;
use uuid::Uuid;

/// Port for the RBAC authorization service.
#[async_trait]
pub trait RoleAssignmentRepository: Send + Sync {
    /// Lists assignments of one principal visible at a scope.
    ///
    /// The service only filters by principal, so results may include
    /// assignments at parent or child scopes.
    async fn list_role_assignments(
        &self,
        scope: &str,
        principal_id: Uuid,
    ) -> AppResult<Vec<RoleAssignment>>;

    /// Creates an assignment under the given name.
    async fn create_role_assignment(
        &self,
        scope: &str,
        name: Uuid,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> AppResult<RoleAssignment>;
}
