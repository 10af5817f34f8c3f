//! Configuration management for conveyor
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (conveyor.toml)
//! - Environment variables (CONVEYOR_*)
//!
//! ## Example config file (conveyor.toml):
//! ```toml
//! [construction]
//! stage = "ARCHIVE"
//! definition = "conveyor.json"
//!
//! [repositories]
//! remote_cache = "/var/cache/conveyor/repository"
//! offline = false
//!
//! [logging]
//! filter = "conveyor=debug"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::plugin::Stage;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConveyorConfig {
    /// Construction defaults
    #[serde(default)]
    pub construction: ConstructionConfig,

    /// Repository settings
    #[serde(default)]
    pub repositories: RepositoriesConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Construction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstructionConfig {
    /// Stage to construct to when none is requested
    #[serde(default = "default_stage")]
    pub stage: Stage,

    /// File name of schematic definitions inside a directory
    #[serde(default = "default_definition")]
    pub definition: String,

    /// Manual definition replacing the built-in root template
    #[serde(default)]
    pub root_template: Option<PathBuf>,
}

/// Repository configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoriesConfig {
    /// Remote cache used when a schematic does not set one
    #[serde(default)]
    pub remote_cache: Option<PathBuf>,

    /// Never reach remote repositories
    #[serde(default)]
    pub offline: bool,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default tracing filter, overridden by RUST_LOG
    #[serde(default = "default_filter")]
    pub filter: String,
}

// Default value functions
fn default_stage() -> Stage {
    Stage::Compile
}

fn default_definition() -> String {
    "conveyor.json".to_string()
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for ConstructionConfig {
    fn default() -> Self {
        Self {
            stage: default_stage(),
            definition: default_definition(),
            root_template: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

impl ConveyorConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load from default locations
        let config_locations = ["conveyor.toml", ".conveyor.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // Load from XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "conveyor", "conveyor") {
            let xdg_config = config_dir.config_dir().join("conveyor.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        // Load from specified path
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // Load from environment variables (CONVEYOR_*)
        builder = builder.add_source(
            Environment::with_prefix("CONVEYOR")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
