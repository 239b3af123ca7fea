use convergent_core::{AppResult, ResourceKind};
use convergent_domain::{AppRoleAssignment, AppRoleGrant};
use reqwest::Method;
use uuid::Uuid;

use super::GraphDirectoryRepository;

impl GraphDirectoryRepository {
    pub(super) async fn list_app_role_assignments_impl(
        &self,
        principal_id: Uuid,
    ) -> AppResult<Vec<AppRoleAssignment>> {
        let url = self.client.endpoint(
            format!("servicePrincipals/{principal_id}/appRoleAssignments").as_str(),
            &[],
        );

        self.list_all(url, ResourceKind::AppRoleAssignment).await
    }

    pub(super) async fn create_app_role_assignment_impl(
        &self,
        grant: AppRoleGrant,
    ) -> AppResult<AppRoleAssignment> {
        let url = self.client.endpoint(
            format!("servicePrincipals/{}/appRoleAssignments", grant.principal_id).as_str(),
            &[],
        );
        let body = serde_json::to_value(grant).map_err(|error| {
            convergent_core::AppError::Internal(format!(
                "failed to encode app role grant: {error}"
            ))
        })?;

        self.client
            .send(Method::POST, url, Some(&body))
            .await?
            .decode(ResourceKind::AppRoleAssignment)
    }
}
