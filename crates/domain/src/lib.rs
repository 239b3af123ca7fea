//! Domain entities and invariants.

#![forbid(unsafe_code)]

mod application;
mod assignment;
mod certificate;
mod permission;
mod permission_delta;
mod service_principal;

pub use application::{Application, KeyCredential, KeyCredentialType, KeyCredentialUsage};
pub use assignment::{AppRoleAssignment, AppRoleGrant, RoleAssignment};
pub use certificate::{CertificatePem, Thumbprint, ensure_trailing_newline};
pub use permission::{RequiredResourceAccess, ResourceAccess, ResourceAccessKind};
pub use permission_delta::{
    AccessKindConflict, PermissionDelta, StagedAccess, compute_permission_delta,
};
pub use service_principal::{AppRole, ServicePrincipal};
