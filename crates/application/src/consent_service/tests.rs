use std::sync::Arc;

use convergent_core::{AppError, ResourceKind};
use convergent_domain::{
    AppRole, AppRoleAssignment, RequiredResourceAccess, ResourceAccess, ServicePrincipal,
};
use uuid::Uuid;

use crate::test_support::{FakeDirectory, RecordingEventSink};

use super::AdminConsentService;

struct Fixture {
    directory: Arc<FakeDirectory>,
    service: AdminConsentService,
    principal: ServicePrincipal,
}

async fn fixture() -> Fixture {
    let directory = Arc::new(FakeDirectory::default());
    let principal = ServicePrincipal::new(Uuid::new_v4(), Uuid::new_v4(), None, Vec::new());
    directory.insert_service_principal(principal.clone()).await;
    let service = AdminConsentService::new(directory.clone(), Arc::new(RecordingEventSink::default()));
    Fixture {
        directory,
        service,
        principal,
    }
}

async fn resource_with_roles(directory: &FakeDirectory, roles: &[Uuid]) -> ServicePrincipal {
    let resource = ServicePrincipal::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Some("resource api".to_owned()),
        roles
            .iter()
            .map(|role| AppRole::new(*role, format!("role-{role}")))
            .collect(),
    );
    directory.insert_service_principal(resource.clone()).await;
    resource
}

#[tokio::test]
async fn grants_only_missing_roles() {
    let fixture = fixture().await;
    let (granted_role, missing_role) = (Uuid::new_v4(), Uuid::new_v4());
    let resource = resource_with_roles(&fixture.directory, &[granted_role, missing_role]).await;
    fixture
        .directory
        .insert_assignment(AppRoleAssignment::new(
            "existing",
            fixture.principal.id(),
            resource.id(),
            granted_role,
        ))
        .await;

    let result = fixture
        .service
        .reconcile(
            &fixture.principal,
            &[RequiredResourceAccess::new(
                resource.app_id(),
                vec![ResourceAccess::role(granted_role), ResourceAccess::role(missing_role)],
            )],
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.created_new);
    assert_eq!(result.value.len(), 2);
    assert_eq!(
        fixture.directory.mutating_calls().await,
        vec!["create_app_role_assignment"]
    );
    let assignments = fixture.directory.assignments().await;
    assert!(assignments.iter().any(|assignment| {
        assignment.resource_id() == resource.id() && assignment.app_role_id() == missing_role
    }));
}

#[tokio::test]
async fn fully_consented_principal_is_left_untouched() {
    let fixture = fixture().await;
    let role = Uuid::new_v4();
    let resource = resource_with_roles(&fixture.directory, &[role]).await;
    fixture
        .directory
        .insert_assignment(AppRoleAssignment::new(
            "existing",
            fixture.principal.id(),
            resource.id(),
            role,
        ))
        .await;

    let result = fixture
        .service
        .reconcile(
            &fixture.principal,
            &[RequiredResourceAccess::new(resource.app_id(), vec![ResourceAccess::role(role)])],
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!result.created_new);
    assert!(fixture.directory.mutating_calls().await.is_empty());
    assert!(
        !fixture
            .directory
            .calls()
            .await
            .contains(&"find_service_principal_by_app_id".to_owned())
    );
}

#[tokio::test]
async fn delegated_scopes_are_not_granted() {
    let fixture = fixture().await;
    let scope = Uuid::new_v4();

    let result = fixture
        .service
        .reconcile(
            &fixture.principal,
            &[RequiredResourceAccess::new(Uuid::new_v4(), vec![ResourceAccess::scope(scope)])],
        )
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!result.created_new);
    assert!(fixture.directory.mutating_calls().await.is_empty());
}

#[tokio::test]
async fn unknown_resource_fails_without_rolling_back_siblings() {
    let fixture = fixture().await;
    let role = Uuid::new_v4();
    let resource = resource_with_roles(&fixture.directory, &[role]).await;
    let unknown_resource_app_id = Uuid::new_v4();

    let result = fixture
        .service
        .reconcile(
            &fixture.principal,
            &[
                RequiredResourceAccess::new(
                    unknown_resource_app_id,
                    vec![ResourceAccess::role(Uuid::new_v4())],
                ),
                RequiredResourceAccess::new(resource.app_id(), vec![ResourceAccess::role(role)]),
            ],
        )
        .await;

    let Err(error) = result else {
        unreachable!();
    };
    assert_eq!(error.not_found_kind(), Some(ResourceKind::ResourceServicePrincipal));
    assert_eq!(fixture.directory.assignments().await.len(), 1);
}

#[tokio::test]
async fn failed_grant_keeps_concurrent_grants_and_returns_error() {
    let fixture = fixture().await;
    let (failing_role, other_role) = (Uuid::new_v4(), Uuid::new_v4());
    let resource = resource_with_roles(&fixture.directory, &[failing_role, other_role]).await;
    fixture.directory.fail_grants_for_role(failing_role).await;

    let result = fixture
        .service
        .reconcile(
            &fixture.principal,
            &[RequiredResourceAccess::new(
                resource.app_id(),
                vec![ResourceAccess::role(failing_role), ResourceAccess::role(other_role)],
            )],
        )
        .await;

    assert!(matches!(result, Err(AppError::Forbidden(_))));
    let assignments = fixture.directory.assignments().await;
    assert_eq!(assignments.len(), 1);
    assert_eq!(assignments[0].app_role_id(), other_role);
}
