use std::sync::Arc;

use convergent_core::AppResult;
use convergent_domain::RoleAssignment;
use uuid::Uuid;

use crate::UpsertResult;
use crate::directory_ports::RoleAssignmentRepository;
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink};

/// Idempotent grant of a role definition at a scope.
///
/// Two concurrent callers targeting the same tuple can both observe no
/// match and both create; bootstrap runs one caller at a time.
#[derive(Clone)]
pub struct RoleAssignmentService {
    repository: Arc<dyn RoleAssignmentRepository>,
    events: Arc<dyn BootstrapEventSink>,
}

impl RoleAssignmentService {
    /// Creates a role assignment service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn RoleAssignmentRepository>,
        events: Arc<dyn BootstrapEventSink>,
    ) -> Self {
        Self { repository, events }
    }

    /// Returns the assignment binding `principal_id` to the role at exactly
    /// `scope`, creating one under a random name when none exists.
    pub async fn upsert(
        &self,
        scope: &str,
        role_definition_id: &str,
        principal_id: Uuid,
    ) -> AppResult<UpsertResult<RoleAssignment>> {
        let existing = self
            .repository
            .list_role_assignments(scope, principal_id)
            .await?
            .into_iter()
            .find(|assignment| assignment.matches(scope, role_definition_id));

        let result = match existing {
            Some(assignment) => UpsertResult::existing(assignment),
            None => UpsertResult::created(
                self.repository
                    .create_role_assignment(scope, Uuid::new_v4(), role_definition_id, principal_id)
                    .await?,
            ),
        };

        self.events.record(BootstrapEvent::RoleAssignmentResolved {
            scope: scope.to_owned(),
            role_definition_id: role_definition_id.to_owned(),
            principal_id,
            principal_type: result.value.principal_type().map(str::to_owned),
            created_new: result.created_new,
        });

        Ok(result)
    }
}
