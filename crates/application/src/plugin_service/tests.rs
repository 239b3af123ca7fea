use std::sync::Arc;

use convergent_core::AppError;

use crate::runtime_ports::{BootstrapEvent, PluginSpec};
use crate::test_support::{FakePluginInstaller, RecordingEventSink};

use super::PluginInstallService;

fn plugins() -> Vec<PluginSpec> {
    ["azure-native@1.0.0", "azuread@5.0.0", "random@4.0.0"]
        .iter()
        .map(|value| PluginSpec::parse(value).unwrap_or_else(|_| unreachable!()))
        .collect()
}

#[tokio::test]
async fn one_failure_does_not_stop_siblings() {
    let installer = Arc::new(FakePluginInstaller::failing_on(&["azuread"]));
    let events = Arc::new(RecordingEventSink::default());
    let service = PluginInstallService::new(installer.clone(), events.clone());

    let result = service.install_all(plugins().as_slice()).await;

    let Err(AppError::Aggregate(aggregate)) = result else {
        unreachable!();
    };
    assert_eq!(aggregate.errors().len(), 1);
    assert!(aggregate.errors()[0].to_string().contains("azuread"));

    let mut installed = installer.installed().await;
    installed.sort();
    assert_eq!(installed, vec!["azure-native v1.0.0", "random v4.0.0"]);

    let recorded = events.recorded();
    let successes = recorded
        .iter()
        .filter(|event| matches!(event, BootstrapEvent::PluginInstalled { .. }))
        .count();
    let failures = recorded
        .iter()
        .filter(|event| matches!(event, BootstrapEvent::PluginInstallFailed { .. }))
        .count();
    assert_eq!((successes, failures), (2, 1));
}

#[tokio::test]
async fn all_successful_installs_return_ok() {
    let installer = Arc::new(FakePluginInstaller::default());
    let service = PluginInstallService::new(installer.clone(), Arc::new(RecordingEventSink::default()));

    let result = service.install_all(plugins().as_slice()).await;

    assert!(result.is_ok());
    assert_eq!(installer.installed().await.len(), 3);
}
