use crate::error::ConfigError;
use crate::signal::TerminationTrigger;
use crate::time_unit::TimeUnit;
use config::{Config, File, FileFormat};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Load config from a specific TOML file, overridable with `APP__` env variables
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    Ok(config)
}

/// Load config from a specific YAML file, overridable with `APP__` env variables
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
        .add_source(config::Environment::with_prefix("APP").separator("__"))
        .build()?;
    Ok(config)
}

/// The `[daemon]` table of a config file
///
/// ```toml
/// [daemon]
/// interval = "5s"
/// termination_triggers = ["interrupt", "terminate", "hangup"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DaemonSettings {
    /// "500ms", "5s", "2m" or a bare number of milliseconds
    pub interval: Option<String>,
    pub termination_triggers: Option<Vec<String>>,
}

impl DaemonSettings {
    /// Read the `daemon` table; a missing table yields empty settings
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        match config.get::<DaemonSettings>("daemon") {
            Ok(settings) => Ok(settings),
            Err(config::ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    pub fn interval(&self) -> Result<Option<Duration>, ConfigError> {
        self.interval
            .as_deref()
            .map(|raw| {
                TimeUnit::parse_interval(raw, TimeUnit::Milliseconds)
                    .ok_or_else(|| ConfigError::InvalidInterval(raw.to_string()))
            })
            .transpose()
    }

    pub fn termination_triggers(&self) -> Result<Option<Vec<TerminationTrigger>>, ConfigError> {
        self.termination_triggers
            .as_ref()
            .map(|names| names.iter().map(|name| name.parse()).collect())
            .transpose()
    }
}
