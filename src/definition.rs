//! Raw schematic and manual definitions
//!
//! Definitions are the on-disk JSON documents. They are read as-is; versions
//! stay strings until properties are known so that `${key}` references inside
//! them can be interpolated.
//!
//! ## Example schematic definition (`conveyor.json`):
//! ```json
//! {
//!   "group": "com.example",
//!   "name": "project",
//!   "version": "1.0.0",
//!   "template": { "group": "com.example", "name": "bom", "version": "1.0.0" },
//!   "inclusions": ["library/conveyor.json"],
//!   "repositories": [{ "name": "local", "path": "../repository" }],
//!   "properties": { "compile.release": "21" },
//!   "preferences": { "artifacts": [{ "name": "dependency", "version": "1.0.0" }] },
//!   "plugins": [{ "name": "compile", "configuration": { "enabled": "true" } }],
//!   "dependencies": [
//!     { "name": "dependency", "scope": "TEST" },
//!     { "schematic": "library" }
//!   ]
//! }
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ConveyorError, Result};
use crate::id::Id;

/// Scope of a dependency; only `Implementation` edges propagate transitively
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyScope {
    #[default]
    Implementation,
    Test,
}

/// A buildable unit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchematicDefinition {
    #[serde(default)]
    pub group: String,
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub template: TemplateDefinition,
    #[serde(default)]
    pub inclusions: Vec<PathBuf>,
    #[serde(default)]
    pub repositories: Vec<RepositoryDefinition>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub preferences: PreferencesDefinition,
    #[serde(default)]
    pub plugins: Vec<PluginDefinition>,
    #[serde(default)]
    pub dependencies: Vec<DependencyDefinition>,
}

impl SchematicDefinition {
    pub fn id(&self) -> Id {
        Id::new(&self.group, &self.name)
    }
}

/// Metadata-only unit usable as a template or a preference inclusion
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct ManualDefinition {
    #[serde(default)]
    pub group: String,
    pub name: String,
    pub version: String,
    /// Manuals can only inherit from other manuals
    #[serde(default)]
    pub template: Option<ManualReference>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
    #[serde(default)]
    pub preferences: PreferencesDefinition,
    #[serde(default)]
    pub plugins: Vec<PluginDefinition>,
    #[serde(default)]
    pub dependencies: Vec<ArtifactDependencyDefinition>,
}

impl ManualDefinition {
    pub fn id(&self) -> Id {
        Id::new(&self.group, &self.name)
    }
}

/// Reference to a manual stored in a repository
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ManualReference {
    #[serde(default)]
    pub group: String,
    pub name: String,
    pub version: String,
}

impl ManualReference {
    pub fn id(&self) -> Id {
        Id::new(&self.group, &self.name)
    }
}

/// Serialized form of a template: either `{ "path": ... }` or a manual reference
#[derive(Deserialize)]
#[serde(untagged)]
pub enum TemplateReference {
    Path { path: PathBuf },
    Manual(ManualReference),
}

/// What a schematic inherits from
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "Option<TemplateReference>")]
pub enum TemplateDefinition {
    /// Nothing declared: the parent directory's schematic or the root template
    #[default]
    None,
    Manual(ManualReference),
    /// Another schematic definition, relative to the declaring file
    Path(PathBuf),
}

impl From<Option<TemplateReference>> for TemplateDefinition {
    fn from(reference: Option<TemplateReference>) -> Self {
        match reference {
            None => Self::None,
            Some(TemplateReference::Path { path }) => Self::Path(path),
            Some(TemplateReference::Manual(manual)) => Self::Manual(manual),
        }
    }
}

/// Where artifacts are looked up
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RepositoryDefinition {
    Local {
        name: String,
        path: PathBuf,
        #[serde(default = "default_true")]
        enabled: bool,
    },
    Remote {
        name: String,
        url: String,
        #[serde(default = "default_true")]
        enabled: bool,
    },
}

impl RepositoryDefinition {
    pub fn name(&self) -> &str {
        match self {
            Self::Local { name, .. } | Self::Remote { name, .. } => name,
        }
    }
}

/// Version pins plus BOM-like inclusions of other manuals' pins
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
pub struct PreferencesDefinition {
    #[serde(default)]
    pub inclusions: Vec<ManualReference>,
    #[serde(default)]
    pub artifacts: Vec<ArtifactPreferenceDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactPreferenceDefinition {
    #[serde(default)]
    pub group: String,
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginDefinition {
    #[serde(default)]
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub configuration: BTreeMap<String, String>,
}

/// Either an artifact from a repository or another schematic of the forest
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum DependencyDefinition {
    Schematic(SchematicDependencyDefinition),
    Artifact(ArtifactDependencyDefinition),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchematicDependencyDefinition {
    pub schematic: String,
    #[serde(default)]
    pub scope: Option<DependencyScope>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArtifactDependencyDefinition {
    #[serde(default)]
    pub group: String,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub scope: Option<DependencyScope>,
    #[serde(default)]
    pub exclusions: Vec<Id>,
}

fn default_true() -> bool {
    true
}

/// Reads definitions from wherever they are stored
pub trait DefinitionReader {
    fn schematic_definition(&self, path: &Path) -> Result<SchematicDefinition>;

    fn manual_definition(&self, path: &Path) -> Result<ManualDefinition>;
}

/// Reads definitions stored as JSON files
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDefinitionReader;

impl JsonDefinitionReader {
    fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ConveyorError::DefinitionNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&content).map_err(|e| ConveyorError::InvalidDefinition {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

impl DefinitionReader for JsonDefinitionReader {
    fn schematic_definition(&self, path: &Path) -> Result<SchematicDefinition> {
        Self::read(path)
    }

    fn manual_definition(&self, path: &Path) -> Result<ManualDefinition> {
        Self::read(path)
    }
}
