//! Configuration management for the tablet agent.
//!
//! Provides hierarchical configuration loading and validation with:
//! - Default values as code base
//! - Configuration file support (`CONFIG_PATH`)
//! - Environment variable overrides (`TABLET__` prefix, `__` separator)
//! - Component-wise validation
mod action;
mod health;
mod monitoring;
mod tablet;
pub use action::*;
pub use health::*;
pub use monitoring::*;
pub use tablet::*;

use std::env;
use std::fmt::Debug;
use std::path::PathBuf;

use config::Config;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Main configuration container for the tablet agent
///
/// Combines all subsystem configurations with hierarchical override support:
/// 1. Default values from code implementation
/// 2. Configuration file specified by `CONFIG_PATH`
/// 3. Environment variables (highest priority)
#[derive(Serialize, Deserialize, Clone)]
pub struct AgentConfig {
    /// Identity, hostname override and service ports of this tablet
    #[serde(default)]
    pub tablet: TabletConfig,
    /// Health checking and health stream parameters
    #[serde(default)]
    pub health: HealthConfig,
    /// Action lock behaviour
    #[serde(default)]
    pub action: ActionConfig,
    /// Metrics and monitoring settings
    #[serde(default)]
    pub monitoring: MonitoringConfig,
    /// Directory for the agent's log files
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            tablet: TabletConfig::default(),
            health: HealthConfig::default(),
            action: ActionConfig::default(),
            monitoring: MonitoringConfig::default(),
            log_dir: default_log_dir(),
        }
    }
}

impl Debug for AgentConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("AgentConfig")
            .field("tablet", &self.tablet)
            .field("log_dir", &self.log_dir)
            .finish_non_exhaustive()
    }
}

impl AgentConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Configuration sources are merged in the following order (later sources override earlier):
    /// 1. Type defaults (lowest priority)
    /// 2. Configuration file from `CONFIG_PATH` environment variable (if set)
    /// 3. Environment variables with `TABLET__` prefix (highest priority)
    ///
    /// # Note
    /// Validation is deferred so that further overrides can be layered with
    /// `with_override_config()`. Callers must call `validate()` before use.
    ///
    /// # Examples
    /// ```ignore
    /// std::env::set_var("CONFIG_PATH", "config/tablet.toml");
    /// std::env::set_var("TABLET__TABLET__UID", "100");
    /// let cfg = AgentConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional configuration overrides from file without validation.
    ///
    /// Merging order (later sources override earlier):
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables (highest priority)
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates configuration and returns validated instance.
    ///
    /// Must be called after all overrides are applied.
    pub fn validate(self) -> Result<Self> {
        self.tablet.validate()?;
        self.health.validate()?;
        self.action.validate()?;
        self.monitoring.validate()?;
        if self.log_dir.as_os_str().is_empty() {
            return Err(Error::Config(ConfigError::Message(
                "log_dir path cannot be empty".into(),
            )));
        }
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix("TABLET")
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("/tmp/tablet-agent/logs")
}
