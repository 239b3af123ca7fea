use convergent_core::{AppResult, ResourceKind};
use convergent_domain::Application;
use reqwest::Method;
use serde_json::Value;
use uuid::Uuid;

use super::{GraphDirectoryRepository, odata_literal};

impl GraphDirectoryRepository {
    pub(super) async fn list_applications_by_display_name_impl(
        &self,
        display_name: &str,
    ) -> AppResult<Vec<Application>> {
        let filter = format!("displayName eq {}", odata_literal(display_name));
        let url = self
            .client
            .endpoint("applications", &[("$filter", filter.as_str())]);

        self.list_all(url, ResourceKind::Application).await
    }

    pub(super) async fn create_application_impl(
        &self,
        display_name: &str,
    ) -> AppResult<Application> {
        let url = self.client.endpoint("applications", &[]);
        let body = serde_json::json!({ "displayName": display_name });

        self.client
            .send(Method::POST, url, Some(&body))
            .await?
            .decode(ResourceKind::Application)
    }

    pub(super) async fn patch_application_impl(
        &self,
        application_id: Uuid,
        body: Value,
    ) -> AppResult<()> {
        let url = self
            .client
            .endpoint(format!("applications/{application_id}").as_str(), &[]);

        self.client
            .send(Method::PATCH, url, Some(&body))
            .await?
            .ensure_success(ResourceKind::Application)
    }
}
