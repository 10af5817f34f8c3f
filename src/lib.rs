//! Conveyor
//!
//! A build orchestrator: resolves a forest of build units ("schematics"),
//! computes the one version of every dependency and plugin each unit needs,
//! and drives a staged, pluggable task pipeline that turns sources into
//! build products.
//!
//! ## Features
//!
//! - **Hierarchical Models**: Schematics inherit properties, plugins, dependencies
//!   and version preferences from a chain of templates
//! - **Version Resolution**: One version per artifact, with exclusion by dominance
//! - **Construction Order**: Templates and schematic dependencies are built first
//! - **Plugin Pipelines**: Stage and step ordered tasks folded over build products
//!
//! ## Architecture
//!
//! ```text
//! definition ──► hierarchy ──► preferences ──► artifact ──► module_path
//!                    │                                          │
//!                    ▼                                          ▼
//!               schematic (forest, order, stage) ──► pipeline ◄── plugin
//!                    │
//!                    ▼
//!               product (SchematicProducts threaded between schematics)
//! ```

pub mod artifact;
pub mod builtin;
pub mod config;
pub mod conveyor;
pub mod definition;
pub mod dependencies;
pub mod error;
pub mod hierarchy;
pub mod id;
pub mod module_path;
pub mod paths;
pub mod pipeline;
pub mod plugin;
pub mod preferences;
pub mod product;
pub mod properties;
pub mod repository;
pub mod schematic;
pub mod version;

pub use artifact::{Artifact, VersionResolutionStrategy};
pub use config::ConveyorConfig;
pub use conveyor::Conveyor;
pub use definition::{DefinitionReader, DependencyScope, JsonDefinitionReader};
pub use dependencies::SchematicDependencies;
pub use error::{ConveyorError, Result};
pub use id::Id;
pub use module_path::ResolvedModulePath;
pub use plugin::{Plugin, PluginCatalog, PluginModule, Stage, Step, TaskBinding};
pub use product::{ProductType, Products, SchematicProducts};
pub use properties::SchematicProperties;
pub use repository::{Classifier, Repository};
pub use schematic::EffectiveModel;
pub use version::SemanticVersion;
