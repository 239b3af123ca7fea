use convergent_core::{AppResult, ResourceKind};
use convergent_domain::ServicePrincipal;
use reqwest::{Method, StatusCode};
use uuid::Uuid;

use super::{GraphDirectoryRepository, odata_literal};

impl GraphDirectoryRepository {
    pub(super) async fn find_service_principal_by_app_id_impl(
        &self,
        app_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        let filter = format!("appId eq {}", odata_literal(app_id.to_string().as_str()));
        let url = self
            .client
            .endpoint("servicePrincipals", &[("$filter", filter.as_str())]);

        let matches: Vec<ServicePrincipal> =
            self.list_all(url, ResourceKind::ServicePrincipal).await?;
        Ok(matches.into_iter().next())
    }

    pub(super) async fn find_service_principal_impl(
        &self,
        service_principal_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        let url = self.client.endpoint(
            format!("servicePrincipals/{service_principal_id}").as_str(),
            &[],
        );

        let response = self.client.send(Method::GET, url, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        response.decode(ResourceKind::ServicePrincipal).map(Some)
    }

    pub(super) async fn create_service_principal_impl(
        &self,
        app_id: Uuid,
    ) -> AppResult<ServicePrincipal> {
        let url = self.client.endpoint("servicePrincipals", &[]);
        let body = serde_json::json!({ "appId": app_id });

        self.client
            .send(Method::POST, url, Some(&body))
            .await?
            .decode(ResourceKind::ServicePrincipal)
    }
}
