//! Error types for schematic construction

use std::path::PathBuf;

use thiserror::Error;

use crate::id::Id;
use crate::product::ProductType;

/// Result type for construction operations
pub type Result<T> = std::result::Result<T, ConveyorError>;

/// Construction errors
#[derive(Error, Debug)]
pub enum ConveyorError {
    #[error("Definition not found: {}", path.display())]
    DefinitionNotFound { path: PathBuf },

    #[error("Invalid definition {}: {reason}", path.display())]
    InvalidDefinition { path: PathBuf, reason: String },

    #[error("Artifact not found in any repository: {id}:{version}")]
    ArtifactNotFound { id: Id, version: String },

    #[error("Version of {id} is neither declared nor preferred")]
    UnresolvedVersion { id: Id },

    #[error("Invalid version '{value}': {source}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },

    #[error("Cyclic requirement: {}", chain.join(" -> "))]
    CyclicRequirement { chain: Vec<String> },

    #[error("Cyclic schematics: {}", names.join(", "))]
    CyclicSchematics { names: Vec<String> },

    #[error("Cannot override {id}: a schematic dependency and an artifact dependency share this name")]
    IncompatibleOverride { id: Id },

    #[error("Schematic not found: {name}")]
    SchematicNotFound { name: String },

    #[error("Schematic {name} has no {product_type} product")]
    ProductMissing { name: String, product_type: ProductType },

    #[error("No implementation registered for plugin {0}")]
    PluginNotFound(Id),

    #[error("Plugin {0} is not on the resolved module path")]
    PluginNotResolved(Id),

    #[error("Task of plugin {plugin} failed: {source}")]
    Task {
        plugin: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
