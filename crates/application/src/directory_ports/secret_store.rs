use std::fmt::{Debug, Formatter};

use async_trait::async_trait;
use convergent_core::AppResult;

/// Key held by the vault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultKey {
    /// Key name.
    pub name: String,
    /// Versioned key identifier.
    pub key_id: String,
}

/// Secret held by the vault.
#[derive(Clone, PartialEq, Eq)]
pub struct VaultSecret {
    /// Secret name.
    pub name: String,
    /// Secret value.
    pub value: String,
}

impl Debug for VaultSecret {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("VaultSecret")
            .field("name", &self.name)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Port for the key and secret store.
///
/// Reads return `None` when the item does not exist; every other failure is
/// an error.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Reads the current version of a key.
    async fn get_key(&self, name: &str) -> AppResult<Option<VaultKey>>;

    /// Creates an RSA key.
    async fn create_key(&self, name: &str, key_bits: u32) -> AppResult<VaultKey>;

    /// Reads the current version of a secret.
    async fn get_secret(&self, name: &str) -> AppResult<Option<VaultSecret>>;

    /// Writes a new version of a secret.
    async fn set_secret(&self, name: &str, value: &str) -> AppResult<VaultSecret>;
}
