//! Schematics, the schematic forest and construction
//!
//! A schematic is one buildable unit: a definition on disk plus the chain of
//! templates it inherits from. Schematics form a forest through inclusions
//! and relate to each other through inheritance and schematic dependencies.

mod construction;
mod forest;

pub use construction::{Construction, EffectiveModel};
pub use forest::SchematicForest;

use std::path::{Path, PathBuf};

use crate::definition::{DependencyDefinition, SchematicDefinition};
use crate::error::{ConveyorError, Result};
use crate::hierarchy::{Hierarchy, HierarchyLoader, Level};
use crate::id::Id;

/// A schematic definition with its resolved template chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schematic {
    path: PathBuf,
    definition: SchematicDefinition,
    hierarchy: Hierarchy,
}

impl Schematic {
    pub fn load(loader: &HierarchyLoader<'_>, path: &Path) -> Result<Self> {
        let hierarchy = loader.schematic_hierarchy(path)?;
        let (definition, path) = match hierarchy.leaf() {
            Some(Level::Schematic { definition, path }) => (definition.clone(), path.clone()),
            _ => {
                return Err(ConveyorError::InvalidDefinition {
                    path: path.to_path_buf(),
                    reason: "not a schematic definition".into(),
                })
            }
        };
        Ok(Self {
            path,
            definition,
            hierarchy,
        })
    }

    /// Absolute location of the definition
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new(""))
    }

    pub fn definition(&self) -> &SchematicDefinition {
        &self.definition
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn id(&self) -> Id {
        self.definition.id()
    }

    pub fn version(&self) -> &str {
        &self.definition.version
    }

    /// Location of the root-most schematic of the template chain
    pub fn root_path(&self) -> &Path {
        self.hierarchy.schematic_paths().next().unwrap_or(&self.path)
    }

    pub fn inherits_from(&self, other: &Schematic) -> bool {
        self.hierarchy.inherits_from(&other.path)
    }

    /// Names of schematics declared as dependencies by this schematic or by a
    /// schematic it inherits from
    pub fn schematic_dependencies(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for level in self.hierarchy.levels() {
            let Level::Schematic { definition, .. } = level else {
                continue;
            };
            for dependency in &definition.dependencies {
                if let DependencyDefinition::Schematic(schematic) = dependency {
                    if !names.contains(&schematic.schematic.as_str()) {
                        names.push(&schematic.schematic);
                    }
                }
            }
        }
        names
    }

    /// Definition paths of the included schematics, in declared order
    pub fn inclusions(&self, loader: &HierarchyLoader<'_>) -> Vec<PathBuf> {
        self.definition
            .inclusions
            .iter()
            .map(|inclusion| loader.definition_path(self.directory(), inclusion))
            .collect()
    }
}
