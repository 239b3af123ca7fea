use async_trait::async_trait;
use convergent_application::{PluginInstaller, PluginSpec};
use convergent_core::{AppError, AppResult};
use tokio::process::Command;

/// Default command used to install resource plugins.
pub const DEFAULT_PLUGIN_PROGRAM: &str = "pulumi";

/// Installs resource plugins with `<program> plugin install resource <name> <version>`.
#[derive(Debug, Clone)]
pub struct ProcessPluginInstaller {
    program: String,
}

impl ProcessPluginInstaller {
    /// Creates an installer invoking the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for ProcessPluginInstaller {
    fn default() -> Self {
        Self::new(DEFAULT_PLUGIN_PROGRAM)
    }
}

#[async_trait]
impl PluginInstaller for ProcessPluginInstaller {
    async fn install(&self, plugin: &PluginSpec) -> AppResult<()> {
        let version_tag = plugin.version_tag();
        tracing::debug!(plugin = %plugin.name(), version = %version_tag, "installing plugin");

        let output = Command::new(self.program.as_str())
            .args(["plugin", "install", "resource", plugin.name(), version_tag.as_str()])
            .output()
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to run '{}': {error}", self.program))
            })?;

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(AppError::Internal(format!(
            "installing plugin {plugin} exited with {}: {}",
            output.status,
            stderr.trim()
        )))
    }
}
