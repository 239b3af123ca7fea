use std::sync::Arc;
use std::time::Duration;

use crate::runtime_ports::BootstrapEvent;
use crate::test_support::{FakeSecretStore, RecordingEventSink, RecordingSleeper};
use crate::transient_retry::{RetryPolicy, TransientRetry};

use super::{VaultSecretService, secret_fingerprint};

struct Fixture {
    store: Arc<FakeSecretStore>,
    sleeper: Arc<RecordingSleeper>,
    events: Arc<RecordingEventSink>,
    service: VaultSecretService,
}

fn fixture() -> Fixture {
    let store = Arc::new(FakeSecretStore::default());
    let sleeper = Arc::new(RecordingSleeper::default());
    let events = Arc::new(RecordingEventSink::default());
    let retry = TransientRetry::new(
        RetryPolicy::new(Duration::from_secs(10), 10).unwrap_or_else(|_| unreachable!()),
        sleeper.clone(),
        events.clone(),
    );
    let service = VaultSecretService::new(store.clone(), retry, events.clone());
    Fixture {
        store,
        sleeper,
        events,
        service,
    }
}

#[tokio::test]
async fn key_is_created_once() {
    let fixture = fixture();

    let first = fixture
        .service
        .ensure_key("state-encryption", 4096)
        .await
        .unwrap_or_else(|_| unreachable!());
    let second = fixture
        .service
        .ensure_key("state-encryption", 4096)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(first.created_new);
    assert!(!second.created_new);
    assert_eq!(first.value.key_id, second.value.key_id);
    assert_eq!(
        fixture.store.writes().await,
        vec!["create_key:state-encryption:4096"]
    );
}

#[tokio::test]
async fn reads_wait_for_access_to_propagate() {
    let fixture = fixture();
    fixture.store.deny_reads(2).await;

    let result = fixture
        .service
        .upsert_secret("bootstrap-config", "payload")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.created_new);
    assert_eq!(fixture.sleeper.recorded().await.len(), 2);
}

#[tokio::test]
async fn unchanged_secret_is_not_rewritten() {
    let fixture = fixture();
    fixture.store.insert_secret("bootstrap-config", "payload").await;

    let result = fixture
        .service
        .upsert_secret("bootstrap-config", "payload")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(!result.created_new);
    assert!(fixture.store.writes().await.is_empty());
}

#[tokio::test]
async fn changed_secret_gets_new_version_and_value_is_not_reported() {
    let fixture = fixture();
    fixture.store.insert_secret("bootstrap-config", "old").await;

    let result = fixture
        .service
        .upsert_secret("bootstrap-config", "new")
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(result.created_new);
    assert_eq!(fixture.store.writes().await, vec!["set_secret:bootstrap-config"]);
    let reported = fixture.events.recorded();
    assert!(reported.iter().any(|event| matches!(
        event,
        BootstrapEvent::VaultSecretResolved { fingerprint, .. } if *fingerprint == secret_fingerprint("new")
    )));
    assert!(!format!("{reported:?}").contains("\"new\""));
}

#[test]
fn fingerprint_is_short_hex() {
    let fingerprint = secret_fingerprint("value");
    assert_eq!(fingerprint.len(), 12);
    assert!(fingerprint.chars().all(|character| character.is_ascii_hexdigit()));
}
