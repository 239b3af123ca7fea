use std::sync::Arc;

use convergent_core::NonEmptyString;
use convergent_domain::Application;
use uuid::Uuid;

use crate::runtime_ports::BootstrapEvent;
use crate::test_support::{FakeDirectory, RecordingEventSink};

use super::IdentityService;

fn display_name(value: &str) -> NonEmptyString {
    NonEmptyString::new(value).unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn second_run_resolves_the_same_identity_without_creating() {
    let directory = Arc::new(FakeDirectory::default());
    let events = Arc::new(RecordingEventSink::default());
    let service = IdentityService::new(directory.clone(), events.clone());

    let first = service
        .ensure_application(&display_name("deployer"))
        .await
        .unwrap_or_else(|_| unreachable!());
    let second = service
        .ensure_application(&display_name("deployer"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(first.created_new);
    assert!(!second.created_new);
    assert_eq!(first.value.id(), second.value.id());
    assert_eq!(first.value.app_id(), second.value.app_id());

    let first_principal = service
        .ensure_service_principal(&first.value)
        .await
        .unwrap_or_else(|_| unreachable!());
    let second_principal = service
        .ensure_service_principal(&second.value)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(first_principal.created_new);
    assert!(!second_principal.created_new);
    assert_eq!(first_principal.value.id(), second_principal.value.id());
    assert_eq!(
        directory.mutating_calls().await,
        vec!["create_application", "create_service_principal"]
    );
    assert_eq!(events.recorded().len(), 4);
}

#[tokio::test]
async fn display_name_must_match_exactly() {
    let directory = Arc::new(FakeDirectory::default());
    directory
        .insert_application(Application::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "deployer-staging",
            Vec::new(),
            Vec::new(),
        ))
        .await;
    let service = IdentityService::new(directory.clone(), Arc::new(RecordingEventSink::default()));

    let result = service
        .ensure_application(&display_name("deployer"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.created_new);
    assert_eq!(result.value.display_name(), "deployer");
}

#[tokio::test]
async fn reports_created_flag_to_event_sink() {
    let directory = Arc::new(FakeDirectory::default());
    let events = Arc::new(RecordingEventSink::default());
    let service = IdentityService::new(directory, events.clone());

    let application = service
        .ensure_application(&display_name("deployer"))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(events.recorded().iter().any(|event| matches!(
        event,
        BootstrapEvent::ApplicationResolved { application_id, created_new: true, .. }
            if *application_id == application.value.id()
    )));
}
