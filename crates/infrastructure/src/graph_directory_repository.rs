//! Microsoft Graph backed directory repository.

use std::sync::Arc;

use async_trait::async_trait;
use convergent_application::DirectoryRepository;
use convergent_core::{AppResult, ResourceKind};
use convergent_domain::{
    AppRoleAssignment, AppRoleGrant, Application, KeyCredential, RequiredResourceAccess,
    ServicePrincipal,
};
use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::azure_rest::AzureRestClient;
use crate::token_provider::{AccessTokenProvider, GRAPH_TOKEN_RESOURCE};

mod app_role_assignments;
mod applications;
mod service_principals;

/// Default Graph endpoint including the API version segment.
pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

/// Graph implementation of the directory port.
#[derive(Clone)]
pub struct GraphDirectoryRepository {
    client: AzureRestClient,
}

impl GraphDirectoryRepository {
    /// Creates a repository against the given Graph base url.
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<dyn AccessTokenProvider>,
        base_url: &str,
    ) -> AppResult<Self> {
        Ok(Self {
            client: AzureRestClient::new(http_client, tokens, base_url, GRAPH_TOKEN_RESOURCE)?,
        })
    }

    /// Collects every page of a collection starting at `first`.
    async fn list_all<T: DeserializeOwned>(
        &self,
        first: Url,
        kind: ResourceKind,
    ) -> AppResult<Vec<T>> {
        let mut items = Vec::new();
        let mut next = Some(first);
        while let Some(url) = next.take() {
            let page: GraphPage<T> = self
                .client
                .send(Method::GET, url, None)
                .await?
                .decode(kind)?;
            items.extend(page.value);
            next = page
                .next_link
                .as_deref()
                .map(Url::parse)
                .transpose()
                .map_err(|error| {
                    convergent_core::AppError::Validation(format!(
                        "invalid @odata.nextLink in {kind} listing: {error}"
                    ))
                })?;
        }

        Ok(items)
    }
}

#[derive(Debug, Deserialize)]
struct GraphPage<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

/// Quotes a literal for use inside an OData `$filter` expression.
fn odata_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[async_trait]
impl DirectoryRepository for GraphDirectoryRepository {
    async fn list_applications_by_display_name(
        &self,
        display_name: &str,
    ) -> AppResult<Vec<Application>> {
        self.list_applications_by_display_name_impl(display_name)
            .await
    }

    async fn create_application(&self, display_name: &str) -> AppResult<Application> {
        self.create_application_impl(display_name).await
    }

    async fn patch_application_key_credentials(
        &self,
        application_id: Uuid,
        key_credentials: &[KeyCredential],
    ) -> AppResult<()> {
        self.patch_application_impl(
            application_id,
            serde_json::json!({ "keyCredentials": key_credentials }),
        )
        .await
    }

    async fn patch_application_required_resource_access(
        &self,
        application_id: Uuid,
        required_resource_access: &[RequiredResourceAccess],
    ) -> AppResult<()> {
        self.patch_application_impl(
            application_id,
            serde_json::json!({ "requiredResourceAccess": required_resource_access }),
        )
        .await
    }

    async fn find_service_principal_by_app_id(
        &self,
        app_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        self.find_service_principal_by_app_id_impl(app_id).await
    }

    async fn find_service_principal(
        &self,
        service_principal_id: Uuid,
    ) -> AppResult<Option<ServicePrincipal>> {
        self.find_service_principal_impl(service_principal_id).await
    }

    async fn create_service_principal(&self, app_id: Uuid) -> AppResult<ServicePrincipal> {
        self.create_service_principal_impl(app_id).await
    }

    async fn list_app_role_assignments(
        &self,
        principal_id: Uuid,
    ) -> AppResult<Vec<AppRoleAssignment>> {
        self.list_app_role_assignments_impl(principal_id).await
    }

    async fn create_app_role_assignment(
        &self,
        grant: AppRoleGrant,
    ) -> AppResult<AppRoleAssignment> {
        self.create_app_role_assignment_impl(grant).await
    }
}
