use std::fmt::{Display, Formatter};

use async_trait::async_trait;
use convergent_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Infrastructure-as-code resource plugin to install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginSpec {
    name: String,
    version: String,
}

impl PluginSpec {
    /// Creates a plugin spec.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> AppResult<Self> {
        let name = name.into().trim().to_owned();
        let version = version.into().trim().to_owned();
        if name.is_empty() || version.is_empty() {
            return Err(AppError::Validation(
                "plugin name and version must not be empty".to_owned(),
            ));
        }

        Ok(Self { name, version })
    }

    /// Parses `name@version`.
    pub fn parse(value: &str) -> AppResult<Self> {
        let Some((name, version)) = value.split_once('@') else {
            return Err(AppError::Validation(format!(
                "plugin '{value}' must be written as name@version"
            )));
        };

        Self::new(name, version)
    }

    /// Returns the plugin name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    /// Returns the version as configured.
    #[must_use]
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Returns the version tag passed to the installer, always `v`-prefixed.
    #[must_use]
    pub fn version_tag(&self) -> String {
        if self.version.starts_with('v') {
            self.version.clone()
        } else {
            format!("v{}", self.version)
        }
    }
}

impl Display for PluginSpec {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}@{}", self.name, self.version)
    }
}

/// Port installing one resource plugin into the execution layer.
#[async_trait]
pub trait PluginInstaller: Send + Sync {
    /// Installs one plugin.
    async fn install(&self, plugin: &PluginSpec) -> AppResult<()>;
}
