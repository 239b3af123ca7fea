use std::sync::Arc;

use convergent_core::{AppResult, NonEmptyString};
use convergent_domain::{Application, ServicePrincipal};

use crate::UpsertResult;
use crate::directory_ports::DirectoryRepository;
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink};

/// Get-or-create of the application and its service principal.
///
/// Directory errors propagate unchanged; nothing is retried here.
#[derive(Clone)]
pub struct IdentityService {
    directory: Arc<dyn DirectoryRepository>,
    events: Arc<dyn BootstrapEventSink>,
}

impl IdentityService {
    /// Creates an identity service.
    #[must_use]
    pub fn new(
        directory: Arc<dyn DirectoryRepository>,
        events: Arc<dyn BootstrapEventSink>,
    ) -> Self {
        Self { directory, events }
    }

    /// Resolves the application with exactly this display name, creating it when absent.
    pub async fn ensure_application(
        &self,
        display_name: &NonEmptyString,
    ) -> AppResult<UpsertResult<Application>> {
        let matches: Vec<Application> = self
            .directory
            .list_applications_by_display_name(display_name.as_str())
            .await?
            .into_iter()
            .filter(|application| application.display_name() == display_name.as_str())
            .collect();

        if matches.len() > 1 {
            tracing::warn!(
                display_name = %display_name,
                count = matches.len(),
                "several applications share the display name, using the first one"
            );
        }

        let result = match matches.into_iter().next() {
            Some(application) => UpsertResult::existing(application),
            None => UpsertResult::created(
                self.directory
                    .create_application(display_name.as_str())
                    .await?,
            ),
        };

        self.events.record(BootstrapEvent::ApplicationResolved {
            application_id: result.value.id(),
            app_id: result.value.app_id(),
            display_name: result.value.display_name().to_owned(),
            created_new: result.created_new,
        });

        Ok(result)
    }

    /// Resolves the service principal bound to the application, creating it when absent.
    pub async fn ensure_service_principal(
        &self,
        application: &Application,
    ) -> AppResult<UpsertResult<ServicePrincipal>> {
        let result = match self
            .directory
            .find_service_principal_by_app_id(application.app_id())
            .await?
        {
            Some(service_principal) => UpsertResult::existing(service_principal),
            None => UpsertResult::created(
                self.directory
                    .create_service_principal(application.app_id())
                    .await?,
            ),
        };

        self.events.record(BootstrapEvent::ServicePrincipalResolved {
            service_principal_id: result.value.id(),
            app_id: result.value.app_id(),
            created_new: result.created_new,
        });

        Ok(result)
    }
}

#[cfg(test)]
mod tests;
