mod events;
mod plugins;
mod sleeper;

pub use events::{BootstrapEvent, BootstrapEventSink, BootstrapStage};
pub use plugins::{PluginInstaller, PluginSpec};
pub use sleeper::Sleeper;
