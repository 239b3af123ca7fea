//! Shared primitives for all Rust crates in Convergent.

#![forbid(unsafe_code)]

/// Authentication primitives shared across services.
pub mod auth;

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

pub use auth::{AccessToken, CredentialSource};

/// Result type used across Convergent crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

impl Display for NonEmptyString {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.0.as_str())
    }
}

/// Azure subscription identifier used to build authorization scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Creates a subscription identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Parses a subscription identifier from its textual form.
    pub fn parse(value: &str) -> AppResult<Self> {
        Uuid::parse_str(value.trim()).map(Self).map_err(|error| {
            AppError::Validation(format!("invalid subscription id '{value}': {error}"))
        })
    }

    /// Returns the authorization scope covering the whole subscription.
    #[must_use]
    pub fn scope(&self) -> String {
        format!("/subscriptions/{}", self.0)
    }

    /// Expands a built-in role definition UUID into its fully qualified id.
    #[must_use]
    pub fn role_definition_id(&self, role_definition_uuid: Uuid) -> String {
        format!(
            "/subscriptions/{}/providers/Microsoft.Authorization/roleDefinitions/{role_definition_uuid}",
            self.0
        )
    }
}

impl Display for SubscriptionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Remote resource kinds distinguished by not-found errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Directory application registration.
    Application,
    /// Directory service principal bound to an application.
    ServicePrincipal,
    /// Service principal of an API that permissions are requested from.
    ResourceServicePrincipal,
    /// Granted app role assignment.
    AppRoleAssignment,
    /// RBAC role assignment.
    RoleAssignment,
    /// Vault key.
    Key,
    /// Vault secret.
    Secret,
}

impl ResourceKind {
    /// Returns a stable label for messages and logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Application => "application",
            Self::ServicePrincipal => "service_principal",
            Self::ResourceServicePrincipal => "resource_service_principal",
            Self::AppRoleAssignment => "app_role_assignment",
            Self::RoleAssignment => "role_assignment",
            Self::Key => "key",
            Self::Secret => "secret",
        }
    }
}

impl Display for ResourceKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Failures collected from a batch where every member was attempted.
#[derive(Debug)]
pub struct AggregateError {
    context: String,
    errors: Vec<AppError>,
}

impl AggregateError {
    /// Creates an aggregate error for the given batch context.
    #[must_use]
    pub fn new(context: impl Into<String>, errors: Vec<AppError>) -> Self {
        Self {
            context: context.into(),
            errors,
        }
    }

    /// Returns the batch description.
    #[must_use]
    pub fn context(&self) -> &str {
        self.context.as_str()
    }

    /// Returns every collected failure in submission order.
    #[must_use]
    pub fn errors(&self) -> &[AppError] {
        self.errors.as_slice()
    }
}

impl Display for AggregateError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "{} ({} failed)",
            self.context,
            self.errors.len()
        )?;
        for error in &self.errors {
            write!(formatter, "; {error}")?;
        }
        Ok(())
    }
}

/// Common application error categories.
#[derive(Debug, Error)]
pub enum AppError {
    /// Invalid input, configuration, or a remote payload that failed decoding.
    #[error("validation error: {0}")]
    Validation(String),

    /// Requested remote resource does not exist.
    #[error("{kind} not found: {message}")]
    NotFound {
        /// Kind of the missing resource.
        kind: ResourceKind,
        /// Human-readable detail.
        message: String,
    },

    /// Write operation conflicts with existing state.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Caller is blocked by authorization policy.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A freshly granted authorization has not propagated yet.
    #[error("authorization pending propagation: {0}")]
    TransientAuthorization(String),

    /// Several independent operations failed together.
    #[error("{0}")]
    Aggregate(AggregateError),

    /// Local input could not be interpreted.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// Internal unexpected error, including transport failures.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Creates a not-found error for the given resource kind.
    #[must_use]
    pub fn not_found(kind: ResourceKind, message: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            message: message.into(),
        }
    }

    /// Returns whether the error signals authorization that is still propagating.
    #[must_use]
    pub fn is_transient_authorization(&self) -> bool {
        matches!(self, Self::TransientAuthorization(_))
    }

    /// Returns the resource kind when this is a not-found error.
    #[must_use]
    pub fn not_found_kind(&self) -> Option<ResourceKind> {
        match self {
            Self::NotFound { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}
