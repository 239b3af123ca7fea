use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized admin consent: a principal holding an app role of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleAssignment {
    id: String,
    principal_id: Uuid,
    resource_id: Uuid,
    app_role_id: Uuid,
    #[serde(default)]
    resource_display_name: Option<String>,
}

impl AppRoleAssignment {
    /// Creates an app role assignment snapshot.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        principal_id: Uuid,
        resource_id: Uuid,
        app_role_id: Uuid,
    ) -> Self {
        Self {
            id: id.into(),
            principal_id,
            resource_id,
            app_role_id,
            resource_display_name: None,
        }
    }

    /// Returns the assignment id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the principal holding the role.
    #[must_use]
    pub fn principal_id(&self) -> Uuid {
        self.principal_id
    }

    /// Returns the resource service principal exposing the role.
    #[must_use]
    pub fn resource_id(&self) -> Uuid {
        self.resource_id
    }

    /// Returns the granted role id.
    #[must_use]
    pub fn app_role_id(&self) -> Uuid {
        self.app_role_id
    }

    /// Returns the resource display name, when the directory included it.
    #[must_use]
    pub fn resource_display_name(&self) -> Option<&str> {
        self.resource_display_name.as_deref()
    }
}

/// Body of an app role assignment creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRoleGrant {
    /// Principal receiving the role.
    pub principal_id: Uuid,
    /// Resource service principal exposing the role.
    pub resource_id: Uuid,
    /// Role to grant.
    pub app_role_id: Uuid,
}

/// RBAC binding of a principal to a role definition at a scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    id: String,
    name: String,
    scope: String,
    role_definition_id: String,
    principal_id: Uuid,
    principal_type: Option<String>,
}

impl RoleAssignment {
    /// Creates a role assignment snapshot.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        scope: impl Into<String>,
        role_definition_id: impl Into<String>,
        principal_id: Uuid,
        principal_type: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            scope: scope.into(),
            role_definition_id: role_definition_id.into(),
            principal_id,
            principal_type,
        }
    }

    /// Returns the fully qualified assignment id.
    #[must_use]
    pub fn id(&self) -> &str {
        self.id.as_str()
    }

    /// Returns the assignment name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the scope the role applies to.
    #[must_use]
    pub fn scope(&self) -> &str {
        self.scope.as_str()
    }

    /// Returns the fully qualified role definition id.
    #[must_use]
    pub fn role_definition_id(&self) -> &str {
        self.role_definition_id.as_str()
    }

    /// Returns the principal holding the role.
    #[must_use]
    pub fn principal_id(&self) -> Uuid {
        self.principal_id
    }

    /// Returns the principal type reported by the authorization service.
    #[must_use]
    pub fn principal_type(&self) -> Option<&str> {
        self.principal_type.as_deref()
    }

    /// Returns whether this assignment binds exactly this role at exactly this scope.
    #[must_use]
    pub fn matches(&self, scope: &str, role_definition_id: &str) -> bool {
        self.scope == scope && self.role_definition_id == role_definition_id
    }
}
