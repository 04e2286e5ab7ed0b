//! Routing Configuration Module
//!
//! Provides configuration loading for the transport dispatcher and the
//! remote group module. Supports loading from TOML files with
//! environment-variable overrides.

use anyhow::{Context, Result};
use config_crate::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Prefix of environment variables that override file settings
/// (e.g. `ROUTING_GROUPS__MAX_PENDING_MESSAGES=64`).
pub const ENV_PREFIX: &str = "ROUTING";

/// Top-level routing configuration
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct RoutingConfig {
    /// Transport worker dispatcher settings
    pub dispatcher: DispatcherSettings,

    /// Remote group module settings
    pub groups: GroupSettings,

    /// Log output settings
    pub logging: LogSettings,
}

/// Settings for the per-transport worker dispatcher
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Number of peer sessions the worker table is sized for up front
    pub worker_capacity: usize,
}

/// Settings for the remote group module
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct GroupSettings {
    /// Name under which the module is registered with the group manager
    pub module_name: String,

    /// Publishes buffered per tunnel while its connection is pending
    pub max_pending_messages: usize,
}

/// Log output settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self { worker_capacity: 16 }
    }
}

impl Default for GroupSettings {
    fn default() -> Self {
        Self {
            module_name: "remote".to_string(),
            max_pending_messages: 1024,
        }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl RoutingConfig {
    /// Load configuration from an optional TOML file with environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading routing config: {:?}", path);
            builder = builder.add_source(File::from(path).required(true));
        }

        // Override with environment variables (ROUTING_ prefix)
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build routing configuration")?;

        let parsed: Self = config
            .try_deserialize()
            .context("Failed to deserialize routing configuration")?;
        debug!(?parsed, "Routing configuration loaded");
        Ok(parsed)
    }

    /// Parse configuration from an inline TOML document (no environment layer)
    pub fn from_toml_str(document: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(document, FileFormat::Toml))
            .build()
            .context("Failed to build routing configuration")?
            .try_deserialize()
            .context("Failed to deserialize routing configuration")
    }

    /// Render the effective configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize routing configuration")
    }
}
