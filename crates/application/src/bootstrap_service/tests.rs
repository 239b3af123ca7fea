use std::sync::Arc;
use std::time::Duration;

use convergent_core::{AppError, NonEmptyString, ResourceKind, SubscriptionId};
use convergent_domain::{AppRole, RequiredResourceAccess, ResourceAccess, ServicePrincipal};
use uuid::Uuid;

use crate::runtime_ports::{BootstrapEvent, BootstrapStage};
use crate::test_support::{
    FIRST_CERTIFICATE_PEM, FakeDirectory, FakeRoleAssignments, RecordingEventSink,
    RecordingSleeper,
};

use super::{
    BootstrapService, BootstrapSettings, BootstrapperIdentity, CertificateBootstrapper,
    ManagedIdentityBootstrapper,
};

struct Fixture {
    directory: Arc<FakeDirectory>,
    role_assignments: Arc<FakeRoleAssignments>,
    sleeper: Arc<RecordingSleeper>,
    events: Arc<RecordingEventSink>,
    service: BootstrapService,
}

fn fixture() -> Fixture {
    let directory = Arc::new(FakeDirectory::default());
    let role_assignments = Arc::new(FakeRoleAssignments::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let events = Arc::new(RecordingEventSink::default());
    let settings = BootstrapSettings::new(SubscriptionId::from_uuid(Uuid::from_u128(7)));
    let service = BootstrapService::new(
        directory.clone(),
        role_assignments.clone(),
        sleeper.clone(),
        events.clone(),
        settings,
    );
    Fixture {
        directory,
        role_assignments,
        sleeper,
        events,
        service,
    }
}

async fn resource_api(directory: &FakeDirectory, role: Uuid) -> ServicePrincipal {
    let resource = ServicePrincipal::new(
        Uuid::new_v4(),
        Uuid::new_v4(),
        Some("resource api".to_owned()),
        vec![AppRole::new(role, "Application.ReadWrite.OwnedBy")],
    );
    directory.insert_service_principal(resource.clone()).await;
    resource
}

fn deployer(resource_app_id: Uuid, role: Uuid) -> BootstrapperIdentity {
    BootstrapperIdentity::Certificate(CertificateBootstrapper {
        display_name: NonEmptyString::new("deployer").unwrap_or_else(|_| unreachable!()),
        certificate_pem: FIRST_CERTIFICATE_PEM.to_owned(),
        required_resource_access: vec![RequiredResourceAccess::new(
            resource_app_id,
            vec![ResourceAccess::role(role)],
        )],
    })
}

fn stages(events: &[BootstrapEvent]) -> Vec<BootstrapStage> {
    events
        .iter()
        .filter_map(|event| match event {
            BootstrapEvent::StageChanged { stage } => Some(*stage),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn new_deployer_converges_end_to_end() {
    let fixture = fixture();
    let role = Uuid::new_v4();
    let resource = resource_api(&fixture.directory, role).await;

    let outcome = fixture
        .service
        .run(&deployer(resource.app_id(), role))
        .await
        .unwrap_or_else(|_| unreachable!());

    let mut mutations = fixture.directory.mutating_calls().await;
    assert_eq!(mutations.first().map(String::as_str), Some("create_application"));
    assert_eq!(
        mutations.last().map(String::as_str),
        Some("create_app_role_assignment")
    );
    mutations.sort();
    assert_eq!(
        mutations,
        vec![
            "create_app_role_assignment",
            "create_application",
            "create_service_principal",
            "patch_key_credentials",
            "patch_required_resource_access",
        ]
    );

    let application = outcome
        .application
        .as_ref()
        .map(|application| application.id())
        .unwrap_or_else(|| unreachable!());
    let stored = fixture
        .directory
        .application(application)
        .await
        .unwrap_or_else(|| unreachable!());
    assert_eq!(stored.key_credentials().len(), 1);
    assert_eq!(stored.required_resource_access().len(), 1);
    assert_eq!(stored.required_resource_access()[0].resource_access().len(), 1);
    assert_eq!(fixture.directory.assignments().await.len(), 1);
    assert_eq!(outcome.app_role_assignments.len(), 1);
    assert!(outcome.subscription_role_assignment.created_new);

    let mut sleeps = fixture.sleeper.recorded().await;
    sleeps.sort();
    assert_eq!(sleeps, vec![Duration::from_secs(60), Duration::from_secs(120)]);

    assert_eq!(
        stages(&fixture.events.recorded()),
        vec![
            BootstrapStage::IdentityPending,
            BootstrapStage::IdentityReady,
            BootstrapStage::ParallelConvergence,
            BootstrapStage::ConvergedOrConsentPending,
            BootstrapStage::ConsentPending,
            BootstrapStage::Converged,
        ]
    );
}

#[tokio::test]
async fn consent_starts_after_permission_propagation() {
    let fixture = fixture();
    let role = Uuid::new_v4();
    let resource = resource_api(&fixture.directory, role).await;

    fixture
        .service
        .run(&deployer(resource.app_id(), role))
        .await
        .unwrap_or_else(|_| unreachable!());

    let events = fixture.events.recorded();
    let permissions_done = events
        .iter()
        .position(|event| matches!(event, BootstrapEvent::PermissionsReconciled { .. }));
    let first_grant = events
        .iter()
        .position(|event| matches!(event, BootstrapEvent::AppRoleGranted { .. }));
    assert!(permissions_done.is_some());
    assert!(permissions_done < first_grant);
}

#[tokio::test]
async fn second_run_issues_no_mutation() {
    let fixture = fixture();
    let role = Uuid::new_v4();
    let resource = resource_api(&fixture.directory, role).await;
    let bootstrapper = deployer(resource.app_id(), role);

    let first = fixture
        .service
        .run(&bootstrapper)
        .await
        .unwrap_or_else(|_| unreachable!());
    let mutations_after_first_run = fixture.directory.mutating_calls().await.len();
    let second = fixture
        .service
        .run(&bootstrapper)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        fixture.directory.mutating_calls().await.len(),
        mutations_after_first_run
    );
    assert_eq!(first.client_id, second.client_id);
    assert_eq!(first.principal_id, second.principal_id);
    assert!(!second.subscription_role_assignment.created_new);
    assert_eq!(fixture.role_assignments.creations().await, 1);
}

#[tokio::test]
async fn malformed_certificate_fails_before_any_directory_call() {
    let fixture = fixture();
    let bootstrapper = BootstrapperIdentity::Certificate(CertificateBootstrapper {
        display_name: NonEmptyString::new("deployer").unwrap_or_else(|_| unreachable!()),
        certificate_pem: "not a certificate".to_owned(),
        required_resource_access: Vec::new(),
    });

    let result = fixture.service.run(&bootstrapper).await;

    assert!(matches!(result, Err(AppError::MalformedInput(_))));
    assert!(fixture.directory.calls().await.is_empty());
}

#[tokio::test]
async fn missing_resource_principal_leaves_partial_state_that_rerun_completes() {
    let fixture = fixture();
    let role = Uuid::new_v4();
    let resource_app_id = Uuid::new_v4();
    let bootstrapper = deployer(resource_app_id, role);

    let failed = fixture.service.run(&bootstrapper).await;
    let Err(error) = failed else {
        unreachable!();
    };
    assert_eq!(
        error.not_found_kind(),
        Some(ResourceKind::ResourceServicePrincipal)
    );
    assert!(
        fixture
            .directory
            .mutating_calls()
            .await
            .contains(&"patch_required_resource_access".to_owned())
    );

    fixture
        .directory
        .insert_service_principal(ServicePrincipal::new(
            Uuid::new_v4(),
            resource_app_id,
            None,
            vec![AppRole::new(role, "Directory.Read.All")],
        ))
        .await;

    let outcome = fixture
        .service
        .run(&bootstrapper)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(outcome.app_role_assignments.len(), 1);
    let patches = fixture
        .directory
        .mutating_calls()
        .await
        .into_iter()
        .filter(|call| call.starts_with("patch_"))
        .count();
    assert_eq!(patches, 2);
}

#[tokio::test]
async fn managed_identity_only_converges_authorization() {
    let fixture = fixture();
    let principal_id = Uuid::new_v4();
    let bootstrapper = BootstrapperIdentity::ManagedIdentity(ManagedIdentityBootstrapper {
        client_id: Uuid::new_v4(),
        principal_id,
        resource_id: "/subscriptions/s/resourceGroups/rg/providers/Microsoft.ManagedIdentity/userAssignedIdentities/bootstrap".to_owned(),
    });

    let outcome = fixture
        .service
        .run(&bootstrapper)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(fixture.directory.calls().await.is_empty());
    assert_eq!(outcome.principal_id, principal_id);
    assert_eq!(
        outcome.subscription_role_assignment.value.role_definition_id(),
        "/subscriptions/00000000-0000-0000-0000-000000000007/providers/Microsoft.Authorization/roleDefinitions/8e3af657-a8ff-443c-a75c-2fe8c4bcb635"
    );
    assert_eq!(
        outcome.subscription_role_assignment.value.scope(),
        "/subscriptions/00000000-0000-0000-0000-000000000007"
    );
}
