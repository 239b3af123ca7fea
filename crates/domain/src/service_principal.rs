use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// App role exposed by a resource service principal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppRole {
    id: Uuid,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    allowed_member_types: Vec<String>,
    #[serde(default = "enabled_by_default")]
    is_enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl AppRole {
    /// Creates an enabled app role assignable to applications.
    #[must_use]
    pub fn new(id: Uuid, value: impl Into<String>) -> Self {
        Self {
            id,
            value: Some(value.into()),
            display_name: None,
            allowed_member_types: vec!["Application".to_owned()],
            is_enabled: true,
        }
    }

    /// Returns the role id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the claim value of the role.
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns the role display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns which principal types may hold the role.
    #[must_use]
    pub fn allowed_member_types(&self) -> &[String] {
        self.allowed_member_types.as_slice()
    }

    /// Returns whether the role can currently be granted.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.is_enabled
    }
}

/// Runtime principal bound to an application's client id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePrincipal {
    id: Uuid,
    app_id: Uuid,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    app_roles: Vec<AppRole>,
}

impl ServicePrincipal {
    /// Creates a service principal snapshot.
    #[must_use]
    pub fn new(
        id: Uuid,
        app_id: Uuid,
        display_name: Option<String>,
        app_roles: Vec<AppRole>,
    ) -> Self {
        Self {
            id,
            app_id,
            display_name,
            app_roles,
        }
    }

    /// Returns the directory object id, used as principal id in grants.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the client id of the bound application.
    #[must_use]
    pub fn app_id(&self) -> Uuid {
        self.app_id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Returns app roles exposed when this principal acts as a resource.
    #[must_use]
    pub fn app_roles(&self) -> &[AppRole] {
        self.app_roles.as_slice()
    }
}
