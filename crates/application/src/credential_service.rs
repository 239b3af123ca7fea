use std::sync::Arc;
use std::time::Duration;

use convergent_core::AppResult;
use convergent_domain::{Application, CertificatePem, KeyCredential};

use crate::UpsertResult;
use crate::directory_ports::DirectoryRepository;
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink, Sleeper};

/// Ensures a certificate is registered as a key credential of an application.
#[derive(Clone)]
pub struct CredentialService {
    directory: Arc<dyn DirectoryRepository>,
    sleeper: Arc<dyn Sleeper>,
    events: Arc<dyn BootstrapEventSink>,
    propagation_wait: Duration,
}

impl CredentialService {
    /// Creates a credential service that waits `propagation_wait` after each registration.
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

    /// Registers the certificate unless a credential with its thumbprint exists.
    ///
    /// Existing credentials are always kept: the patch writes the current list
    /// with the new credential appended.
    pub async fn ensure_certificate(
        &self,
        application: &Application,
        certificate: &CertificatePem,
    ) -> AppResult<UpsertResult<KeyCredential>> {
        let thumbprint = certificate.thumbprint();
        let existing = application.find_key_credential(thumbprint);
        self.events.record(BootstrapEvent::CredentialChecked {
            application_id: application.id(),
            thumbprint: thumbprint.to_hex(),
            wait: self.propagation_wait,
            created_new: existing.is_none(),
        });

        if let Some(existing) = existing {
            self.events.record(BootstrapEvent::CredentialReconciled {
                application_id: application.id(),
                thumbprint: thumbprint.to_hex(),
                created_new: false,
            });
            return Ok(UpsertResult::existing(existing.clone()));
        }

        let credential = KeyCredential::for_certificate(certificate);
        self.directory
            .patch_application_key_credentials(
                application.id(),
                application
                    .key_credentials_with(credential.clone())
                    .as_slice(),
            )
            .await?;
        self.sleeper.sleep(self.propagation_wait).await;

        self.events.record(BootstrapEvent::CredentialReconciled {
            application_id: application.id(),
            thumbprint: thumbprint.to_hex(),
            created_new: true,
        });

        Ok(UpsertResult::created(credential))
    }
}

#[cfg(test)]
mod tests;
