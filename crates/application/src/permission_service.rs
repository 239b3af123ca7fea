use std::sync::Arc;
use std::time::Duration;

use convergent_core::AppResult;
use convergent_domain::{Application, RequiredResourceAccess, compute_permission_delta};

use crate::UpsertResult;
use crate::directory_ports::DirectoryRepository;
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink, Sleeper};

/// Applies the additive permission delta to an application.
#[derive(Clone)]
pub struct PermissionService {
    directory: Arc<dyn DirectoryRepository>,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn BootstrapEventSink>,
    propagation_wait: Duration,
}

impl PermissionService {
    /// Creates a permission service that waits `propagation_wait` after each patch.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        sleeper: Arc<dyn Sleeper>,
        events: Arc<dyn BootstrapEventSink>,
        propagation_wait: Duration,
    ) -> Self {
        Self {
            directory,
            sleeper,
            events,
            propagation_wait,
        }
    }

    /// Makes the application's required permissions a superset of `desired`.
    ///
    /// Returns the resulting permission list. No patch is issued when the
    /// current list already covers every desired permission id.
    pub async fn reconcile(
        &self,
        application: &Application,
        desired: &[RequiredResourceAccess],
    ) -> AppResult<UpsertResult<Vec<RequiredResourceAccess>>> {
        let delta = compute_permission_delta(application.required_resource_access(), desired);

        for conflict in delta.conflicts() {
            tracing::warn!(
                application_id = %application.id(),
                resource_app_id = %conflict.resource_app_id,
                access_id = %conflict.access_id,
                current_kind = conflict.current_kind.as_str(),
                desired_kind = conflict.desired_kind.as_str(),
                "permission requested with a different kind than registered, keeping registered kind"
            );
            self.events.record(BootstrapEvent::PermissionKindConflict {
                resource_app_id: conflict.resource_app_id,
                access_id: conflict.access_id,
                current_kind: conflict.current_kind,
                desired_kind: conflict.desired_kind,
            });
        }

        let Some(patched) = delta.patched_access() else {
            self.events.record(BootstrapEvent::PermissionsReconciled {
                application_id: application.id(),
                created_new: false,
            });
            return Ok(UpsertResult::existing(
                application.required_resource_access().to_vec(),
            ));
        };

        self.events.record(BootstrapEvent::PermissionsPatching {
            application_id: application.id(),
            changed_resources: delta.staged().len(),
            wait: self.propagation_wait,
        });
        self.directory
            .patch_application_required_resource_access(application.id(), patched)
            .await?;
        self.sleeper.sleep(self.propagation_wait).await;

        self.events.record(BootstrapEvent::PermissionsReconciled {
            application_id: application.id(),
            created_new: true,
        });

        Ok(UpsertResult::created(patched.to_vec()))
    }
}
