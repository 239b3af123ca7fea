use std::sync::Arc;

use convergent_core::{AggregateError, AppError, AppResult};
use futures::future::join_all;

use crate::runtime_ports::{BootstrapEvent, BootstrapEventSink, PluginInstaller, PluginSpec};

/// Installs resource plugins for the execution layer.
#[derive(Clone)]
pub struct PluginInstallService {
    installer: Arc<dyn PluginInstaller>,
    events: Arc<dyn BootstrapEventSink>,
}

impl PluginInstallService {
    /// Creates a plugin install service.
    #[must_use]
    pub fn new(installer: Arc<dyn PluginInstaller>, events: Arc<dyn BootstrapEventSink>) -> Self {
        Self { installer, events }
    }

    /// Installs every plugin concurrently.
    ///
    /// Each install is attempted regardless of the others. Failures are
    /// collected into one [`AppError::Aggregate`]; successful installs stay.
    pub async fn install_all(&self, plugins: &[PluginSpec]) -> AppResult<()> {
        let outcomes = join_all(plugins.iter().map(|plugin| async move {
            (plugin, self.installer.install(plugin).await)
        }))
        .await;

        let mut errors = Vec::new();
        for (plugin, outcome) in outcomes {
            match outcome {
                Ok(()) => self.events.record(BootstrapEvent::PluginInstalled {
                    name: plugin.name().to_owned(),
                    version: plugin.version_tag(),
                }),
                Err(error) => {
                    self.events.record(BootstrapEvent::PluginInstallFailed {
                        name: plugin.name().to_owned(),
                        version: plugin.version_tag(),
                        error: error.to_string(),
                    });
                    errors.push(error);
                }
            }
        }

        if errors.is_empty() {
            return Ok(());
        }

        Err(AppError::Aggregate(AggregateError::new(
            "plugin installation failed",
            errors,
        )))
    }
}

#[cfg(test)]
mod tests;
