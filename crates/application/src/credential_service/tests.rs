use std::sync::Arc;
use std::time::Duration;

use convergent_domain::CertificatePem;

use crate::runtime_ports::BootstrapEvent;
use crate::test_support::{
    FIRST_CERTIFICATE_PEM, FakeDirectory, RecordingEventSink, RecordingSleeper,
    SECOND_CERTIFICATE_PEM, empty_application,
};

use super::CredentialService;

const WAIT: Duration = Duration::from_secs(120);

fn certificate(pem: &str) -> CertificatePem {
    CertificatePem::parse(pem).unwrap_or_else(|_| unreachable!())
}

struct Harness {
    directory: Arc<FakeDirectory>,
    sleeper: Arc<RecordingSleeper>,
    events: Arc<RecordingEventSink>,
    service: CredentialService,
}

fn harness() -> Harness {
    let directory = Arc::new(FakeDirectory::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let events = Arc::new(RecordingEventSink::default());
    let service = CredentialService::new(directory.clone(), sleeper.clone(), events.clone(), WAIT);
    Harness {
        directory,
        sleeper,
        events,
        service,
    }
}

#[tokio::test]
async fn same_certificate_twice_registers_once() {
    let harness = harness();
    let application = empty_application("deployer");
    harness.directory.insert_application(application.clone()).await;

    let first = harness
        .service
        .ensure_certificate(&application, &certificate(FIRST_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(first.created_new);

    let refreshed = harness
        .directory
        .application(application.id())
        .await
        .unwrap_or_else(|| unreachable!());
    let second = harness
        .service
        .ensure_certificate(&refreshed, &certificate(FIRST_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!second.created_new);
    assert_eq!(
        first.value.custom_key_identifier(),
        second.value.custom_key_identifier()
    );
    assert_eq!(harness.directory.mutating_calls().await, vec!["patch_key_credentials"]);
    assert_eq!(harness.sleeper.recorded().await, vec![WAIT]);
}

#[tokio::test]
async fn different_certificate_is_appended_and_prior_one_kept() {
    let harness = harness();
    let application = empty_application("deployer");
    harness.directory.insert_application(application.clone()).await;

    harness
        .service
        .ensure_certificate(&application, &certificate(FIRST_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());
    let refreshed = harness
        .directory
        .application(application.id())
        .await
        .unwrap_or_else(|| unreachable!());
    harness
        .service
        .ensure_certificate(&refreshed, &certificate(SECOND_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());

    let stored = harness
        .directory
        .application(application.id())
        .await
        .unwrap_or_else(|| unreachable!());
    let identifiers: Vec<Option<&str>> = stored
        .key_credentials()
        .iter()
        .map(|credential| credential.custom_key_identifier())
        .collect();

    assert_eq!(
        identifiers,
        vec![
            Some("19413AC19AE07A2937E973B8CA40D6B4D427304D"),
            Some("34A98D8FDD647A741A06647ED93845566CB640B0"),
        ]
    );
}

#[tokio::test]
async fn registration_reports_wait_before_patching() {
    let harness = harness();
    let application = empty_application("deployer");
    harness.directory.insert_application(application.clone()).await;

    harness
        .service
        .ensure_certificate(&application, &certificate(FIRST_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());

    let events = harness.events.recorded();
    assert!(matches!(
        events.first(),
        Some(BootstrapEvent::CredentialChecked { wait, created_new: true, .. }) if *wait == WAIT
    ));
    assert!(matches!(
        events.last(),
        Some(BootstrapEvent::CredentialReconciled { created_new: true, .. })
    ));
}

#[tokio::test]
async fn registered_certificate_still_reports_the_check() {
    let harness = harness();
    let application = empty_application("deployer");
    harness.directory.insert_application(application.clone()).await;
    harness
        .service
        .ensure_certificate(&application, &certificate(FIRST_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());
    let refreshed = harness
        .directory
        .application(application.id())
        .await
        .unwrap_or_else(|| unreachable!());
    let recorded_before = harness.events.recorded().len();

    harness
        .service
        .ensure_certificate(&refreshed, &certificate(FIRST_CERTIFICATE_PEM))
        .await
        .unwrap_or_else(|_| unreachable!());

    let events = harness.events.recorded();
    assert_eq!(
        &events[recorded_before..],
        &[
            BootstrapEvent::CredentialChecked {
                application_id: application.id(),
                thumbprint: certificate(FIRST_CERTIFICATE_PEM).thumbprint().to_hex(),
                wait: WAIT,
                created_new: false,
            },
            BootstrapEvent::CredentialReconciled {
                application_id: application.id(),
                thumbprint: certificate(FIRST_CERTIFICATE_PEM).thumbprint().to_hex(),
                created_new: false,
            },
        ]
    );
}
