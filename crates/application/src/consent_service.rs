use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use convergent_core::{AppError, AppResult, ResourceKind};
use convergent_domain::{AppRoleAssignment, AppRoleGrant, RequiredResourceAccess, ServicePrincipal};
use futures::future::join_all;
use uuid::Uuid;

use crate::UpsertResult;
use crate::directory_ports::DirectoryRepository;
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink};

/// Grants the app roles implied by required permissions to a service principal.
///
/// Only application permissions (`Role` entries) are consented here.
/// Delegated `Scope` entries need an interactive consent and are skipped.
#[derive(Clone)]
pub struct AdminConsentService {
    directory: Arc<dyn DirectoryRepository>,
    events: Arc<dyn BootstrapEventSink>,
}

/// Desired role of a resource API that is not granted yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct MissingGrant {
    resource_app_id: Uuid,
    app_role_id: Uuid,
}

impl AdminConsentService {
    /// Creates an admin consent service.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        events: Arc<dyn BootstrapEventSink>,
    ) -> Self {
        Self { directory, events }
    }

    /// Grants every desired app role the principal does not hold yet.
    ///
    /// Grants run concurrently. When one fails, the others still complete
    /// and stay in place; the first failure is returned after all of them
    /// settle. A desired resource without a service principal fails with
    /// [`ResourceKind::ResourceServicePrincipal`].
    pub async fn reconcile(
        &self,
        service_principal: &ServicePrincipal,
        desired: &[RequiredResourceAccess],
    ) -> AppResult<UpsertResult<Vec<AppRoleAssignment>>> {
        let principal_id = service_principal.id();
        let existing = self.directory.list_app_role_assignments(principal_id).await?;

        let referenced_ids = unique(existing.iter().map(AppRoleAssignment::resource_id));
        let referenced = self.resolve_by_object_id(referenced_ids.as_slice()).await?;

        let mut resources_by_app_id: HashMap<Uuid, ServicePrincipal> = referenced
            .into_iter()
            .map(|resource| (resource.app_id(), resource))
            .collect();
        let unresolved_app_ids: Vec<Uuid> = unique(
            desired
                .iter()
                .filter(|entry| entry.role_ids().next().is_some())
                .map(RequiredResourceAccess::resource_app_id),
        )
        .into_iter()
        .filter(|app_id| !resources_by_app_id.contains_key(app_id))
        .collect();
        resources_by_app_id.extend(
            self.resolve_by_app_id(unresolved_app_ids.as_slice())
                .await?
                .into_iter()
                .map(|resource| (resource.app_id(), resource)),
        );

        let granted: HashSet<(Uuid, Uuid)> = existing
            .iter()
            .map(|assignment| (assignment.resource_id(), assignment.app_role_id()))
            .collect();

        let missing = unique(desired.iter().flat_map(|entry| {
            entry.role_ids().map(|app_role_id| MissingGrant {
                resource_app_id: entry.resource_app_id(),
                app_role_id,
            })
        }))
        .into_iter()
        .filter(|grant| {
            resources_by_app_id
                .get(&grant.resource_app_id)
                .is_none_or(|resource| !granted.contains(&(resource.id(), grant.app_role_id)))
        })
        .collect::<Vec<_>>();

        if missing.is_empty() {
            self.events.record(BootstrapEvent::AdminConsentReconciled {
                principal_id,
                granted: 0,
            });
            return Ok(UpsertResult::existing(existing));
        }

        let outcomes = join_all(missing.iter().map(|grant| {
            self.grant(principal_id, *grant, &resources_by_app_id)
        }))
        .await;

        let mut assignments = existing;
        let mut first_error = None;
        let mut created = 0;
        for outcome in outcomes {
            match outcome {
                Ok(assignment) => {
                    created += 1;
                    assignments.push(assignment);
                }
                Err(error) => {
                    tracing::warn!(principal_id = %principal_id, error = %error, "app role grant failed");
                    first_error.get_or_insert(error);
                }
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        self.events.record(BootstrapEvent::AdminConsentReconciled {
            principal_id,
            granted: created,
        });

        Ok(UpsertResult::created(assignments))
    }

    async fn grant(
        &self,
        principal_id: Uuid,
        grant: MissingGrant,
        resources_by_app_id: &HashMap<Uuid, ServicePrincipal>,
    ) -> AppResult<AppRoleAssignment> {
        let Some(resource) = resources_by_app_id.get(&grant.resource_app_id) else {
            return Err(AppError::not_found(
                ResourceKind::ResourceServicePrincipal,
                format!("no service principal for resource app {}", grant.resource_app_id),
            ));
        };

        let assignment = self
            .directory
            .create_app_role_assignment(AppRoleGrant {
                principal_id,
                resource_id: resource.id(),
                app_role_id: grant.app_role_id,
            })
            .await?;

        self.events.record(BootstrapEvent::AppRoleGranted {
            principal_id,
            resource_id: resource.id(),
            app_role_id: grant.app_role_id,
        });

        Ok(assignment)
    }

    async fn resolve_by_object_id(&self, ids: &[Uuid]) -> AppResult<Vec<ServicePrincipal>> {
        let lookups = join_all(
            ids.iter()
                .map(|id| self.directory.find_service_principal(*id)),
        )
        .await;

        Ok(lookups
            .into_iter()
            .collect::<AppResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect())
    }

    async fn resolve_by_app_id(&self, app_ids: &[Uuid]) -> AppResult<Vec<ServicePrincipal>> {
        let lookups = join_all(
            app_ids
                .iter()
                .map(|app_id| self.directory.find_service_principal_by_app_id(*app_id)),
        )
        .await;

        Ok(lookups
            .into_iter()
            .collect::<AppResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect())
    }
}

fn unique<T: Copy + Eq + std::hash::Hash>(values: impl Iterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    values.filter(|value| seen.insert(*value)).collect()
}

#[cfg(test)]
mod tests;
