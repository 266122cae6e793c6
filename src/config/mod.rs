// Configuration module
// Static device settings and runtime updates from the config channel

pub mod settings;
pub mod update;

pub use settings::{DeviceSettings, SettingsError};
pub use update::{ConfigError, ConfigUpdate, KNOWN_FIELDS};
