mod authorization;
mod directory;
mod secret_store;

pub use authorization::RoleAssignmentRepository;
pub use directory::DirectoryRepository;
pub use secret_store::{SecretStore, VaultKey, VaultSecret};
