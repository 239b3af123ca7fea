use std::sync::Arc;

use convergent_core::AppResult;
use sha2::{Digest, Sha256};

use crate::UpsertResult;
use crate::directory_ports::{SecretStore, VaultKey, VaultSecret};
use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink};
use crate::transient_retry::TransientRetry;

/// Get-or-create of vault keys and secrets right after access was granted.
///
/// Every store call goes through the transient retry helper because the
/// caller's data-plane role may still be propagating.
#[derive(Clone)]
pub struct VaultSecretService {
    store: Arc<dyn SecretStore>,
    retry: TransientRetry,
    events: Arc<dyn BootstrapEventSink>,
}

impl VaultSecretService {
    /// Creates a vault service.
    #[must_use]
    pub fn new(
        store: Arc<dyn SecretStore>,
        retry: TransientRetry,
        events: Arc<dyn BootstrapEventSink>,
    ) -> Self {
        Self {
            store,
            retry,
            events,
        }
    }

    /// Returns the named key, creating an RSA key of `key_bits` when absent.
    pub async fn ensure_key(&self, name: &str, key_bits: u32) -> AppResult<UpsertResult<VaultKey>> {
        let existing = self
            .retry
            .run("get vault key", || self.store.get_key(name))
            .await?;

        let result = match existing {
            Some(key) => UpsertResult::existing(key),
            None => UpsertResult::created(
                self.retry
                    .run("create vault key", || self.store.create_key(name, key_bits))
                    .await?,
            ),
        };

        self.events.record(BootstrapEvent::VaultKeyResolved {
            name: name.to_owned(),
            created_new: result.created_new,
        });

        Ok(result)
    }

    /// Writes the secret unless its current value is already `value`.
    pub async fn upsert_secret(
        &self,
        name: &str,
        value: &str,
    ) -> AppResult<UpsertResult<VaultSecret>> {
        let existing = self
            .retry
            .run("get vault secret", || self.store.get_secret(name))
            .await?;

        let result = match existing {
            Some(secret) if secret.value == value => UpsertResult::existing(secret),
            _ => UpsertResult::created(
                self.retry
                    .run("set vault secret", || self.store.set_secret(name, value))
                    .await?,
            ),
        };

        self.events.record(BootstrapEvent::VaultSecretResolved {
            name: name.to_owned(),
            fingerprint: secret_fingerprint(value),
            created_new: result.created_new,
        });

        Ok(result)
    }
}

/// Returns a short SHA-256 fingerprint safe to log in place of a secret.
#[must_use]
pub fn secret_fingerprint(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests;
