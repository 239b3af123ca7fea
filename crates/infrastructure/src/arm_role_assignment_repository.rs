//! Azure Resource Manager backed role assignment repository.

use std::sync::Arc;

use async_trait::async_trait;
use convergent_application::RoleAssignmentRepository;
use convergent_core::{AppError, AppResult, ResourceKind};
use convergent_domain::RoleAssignment;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use uuid::Uuid;

use crate::azure_rest::{AzureRestClient, RestResponse};
use crate::token_provider::{ARM_TOKEN_RESOURCE, AccessTokenProvider};

/// Default Resource Manager endpoint.
pub const DEFAULT_ARM_BASE_URL: &str = "https://management.azure.com";

const ROLE_ASSIGNMENTS_API_VERSION: &str = "2022-04-01";

/// ARM implementation of the role assignment port.
#[derive(Clone)]
pub struct ArmRoleAssignmentRepository {
    client: AzureRestClient,
}

impl ArmRoleAssignmentRepository {
    /// Creates a repository against the given Resource Manager base url.
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<dyn AccessTokenProvider>,
        base_url: &str,
    ) -> AppResult<Self> {
        Ok(Self {
            client: AzureRestClient::new(http_client, tokens, base_url, ARM_TOKEN_RESOURCE)?,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignmentList {
    value: Vec<RoleAssignmentResource>,
    #[serde(default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RoleAssignmentResource {
    id: String,
    name: String,
    properties: RoleAssignmentProperties,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoleAssignmentProperties {
    scope: String,
    role_definition_id: String,
    principal_id: Uuid,
    #[serde(default)]
    principal_type: Option<String>,
}

impl From<RoleAssignmentResource> for RoleAssignment {
    fn from(resource: RoleAssignmentResource) -> Self {
        RoleAssignment::new(
            resource.id,
            resource.name,
            resource.properties.scope,
            resource.properties.role_definition_id,
            resource.properties.principal_id,
            resource.properties.principal_type,
        )
    }
}

/// A principal created moments ago is not yet visible to the authorization service.
fn classify_write_failure(response: RestResponse) -> AppError {
    let failure = response.failure();
    if failure.status == StatusCode::BAD_REQUEST && failure.has_code("PrincipalNotFound") {
        return AppError::TransientAuthorization(failure.message);
    }
    failure.into_app_error(ResourceKind::RoleAssignment)
}

#[async_trait]
impl RoleAssignmentRepository for ArmRoleAssignmentRepository {
    async fn list_role_assignments(
        &self,
        scope: &str,
        principal_id: Uuid,
    ) -> AppResult<Vec<RoleAssignment>> {
        let filter = format!("principalId eq '{principal_id}'");
        let mut next = Some(self.client.endpoint(
            format!("{scope}/providers/Microsoft.Authorization/roleAssignments").as_str(),
            &[
                ("api-version", ROLE_ASSIGNMENTS_API_VERSION),
                ("$filter", filter.as_str()),
            ],
        ));

        let mut assignments = Vec::new();
        while let Some(url) = next.take() {
            let page: RoleAssignmentList = self
                .client
                .send(Method::GET, url, None)
                .await?
                .decode(ResourceKind::RoleAssignment)?;
            assignments.extend(page.value.into_iter().map(RoleAssignment::from));
            next = page
                .next_link
                .as_deref()
                .map(url::Url::parse)
                .transpose()
                .map_err(|error| {
                    AppError::Validation(format!("invalid role assignment nextLink: {error}"))
                })?;
        }

        Ok(assignments)
    }

    async fn create_role_assignment(
        &self,
        scope: &str,
        name: Uuid,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> AppResult<RoleAssignment> {
        let url = self.client.endpoint(
            format!("{scope}/providers/Microsoft.Authorization/roleAssignments/{name}").as_str(),
            &[("api-version", ROLE_ASSIGNMENTS_API_VERSION)],
        );
        let body = serde_json::json!({
            "properties": {
                "roleDefinitionId": role_definition_id,
                "principalId": principal_id,
                "principalType": "ServicePrincipal",
            }
        });

        let response = self.client.send(Method::PUT, url, Some(&body)).await?;
        if !response.status().is_success() {
            return Err(classify_write_failure(response));
        }
        response
            .decode::<RoleAssignmentResource>(ResourceKind::RoleAssignment)
            .map(RoleAssignment::from)
    }
}
