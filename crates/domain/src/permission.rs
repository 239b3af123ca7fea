use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of a permission requested from a resource API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceAccessKind {
    /// Application permission, materialized by an app role assignment.
    Role,
    /// Delegated permission.
    Scope,
}

impl ResourceAccessKind {
    /// Returns the directory wire value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Role => "Role",
            Self::Scope => "Scope",
        }
    }
}

/// One permission requested from a resource API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceAccess {
    id: Uuid,
    #[serde(rename = "type")]
    kind: ResourceAccessKind,
}

impl ResourceAccess {
    /// Creates a resource access entry.
    #[must_use]
    pub fn new(id: Uuid, kind: ResourceAccessKind) -> Self {
        Self { id, kind }
    }

    /// Creates an application permission entry.
    #[must_use]
    pub fn role(id: Uuid) -> Self {
        Self::new(id, ResourceAccessKind::Role)
    }

    /// Creates a delegated permission entry.
    #[must_use]
    pub fn scope(id: Uuid) -> Self {
        Self::new(id, ResourceAccessKind::Scope)
    }

    /// Returns the permission id exposed by the resource API.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the permission kind.
    #[must_use]
    pub fn kind(&self) -> ResourceAccessKind {
        self.kind
    }
}

/// Permissions an application requests from one resource API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredResourceAccess {
    resource_app_id: Uuid,
    resource_access: Vec<ResourceAccess>,
}

impl RequiredResourceAccess {
    /// Creates a required resource access entry.
    #[must_use]
    pub fn new(resource_app_id: Uuid, resource_access: Vec<ResourceAccess>) -> Self {
        Self {
            resource_app_id,
            resource_access,
        }
    }

    /// Returns the client id of the resource API.
    #[must_use]
    pub fn resource_app_id(&self) -> Uuid {
        self.resource_app_id
    }

    /// Returns the requested permissions.
    #[must_use]
    pub fn resource_access(&self) -> &[ResourceAccess] {
        self.resource_access.as_slice()
    }

    /// Returns the ids of requested application permissions.
    pub fn role_ids(&self) -> impl Iterator<Item = Uuid> + '_ {
        self.resource_access
            .iter()
            .filter(|access| access.kind() == ResourceAccessKind::Role)
            .map(ResourceAccess::id)
    }
}
