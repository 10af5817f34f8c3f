//! Plugin contract and plugin loading
//!
//! Plugins are Rust values registered by id in a [`PluginCatalog`]. For each
//! schematic a short-lived [`PluginLoader`] is built from the catalog and the
//! resolved plugin module path; every plugin is instantiated with its own
//! [`PluginModule`], which only sees the plugin's location and what it requires.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::dependencies::SchematicDependencies;
use crate::error::{ConveyorError, Result};
use crate::id::Id;
use crate::module_path::ResolvedModulePath;
use crate::product::Products;
use crate::properties::SchematicProperties;
use crate::version::SemanticVersion;

/// Coarse ordering of tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Stage {
    Clean,
    Compile,
    Test,
    Archive,
    Publish,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Clean,
        Stage::Compile,
        Stage::Test,
        Stage::Archive,
        Stage::Publish,
    ];
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Clean => "CLEAN",
            Stage::Compile => "COMPILE",
            Stage::Test => "TEST",
            Stage::Archive => "ARCHIVE",
            Stage::Publish => "PUBLISH",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Stage::ALL
            .into_iter()
            .find(|stage| stage.to_string().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown stage '{value}'"))
    }
}

/// Fine ordering of tasks within a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    Prepare,
    Run,
    Finalize,
}

/// Takes the accumulated products and returns the next ones
pub type Task = Box<dyn Fn(Products, &SchematicDependencies) -> anyhow::Result<Products>>;

/// Task bound to a stage and step
pub struct TaskBinding {
    pub stage: Stage,
    pub step: Step,
    pub name: String,
    pub task: Task,
}

impl TaskBinding {
    pub fn new<F>(stage: Stage, step: Step, name: impl Into<String>, task: F) -> Self
    where
        F: Fn(Products, &SchematicDependencies) -> anyhow::Result<Products> + 'static,
    {
        Self {
            stage,
            step,
            name: name.into(),
            task: Box::new(task),
        }
    }
}

impl fmt::Debug for TaskBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskBinding")
            .field("stage", &self.stage)
            .field("step", &self.step)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Contract every plugin implements
pub trait Plugin {
    fn name(&self) -> &str;

    /// Tasks this plugin contributes for one schematic
    fn bindings(
        &self,
        properties: &SchematicProperties,
        configuration: &BTreeMap<String, String>,
    ) -> Vec<TaskBinding>;
}

/// What a plugin can see of the resolved plugin module path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginModule {
    pub id: Id,
    pub version: SemanticVersion,
    pub location: PathBuf,
    pub module_path: BTreeSet<PathBuf>,
}

type PluginFactory = Box<dyn Fn(&PluginModule) -> Box<dyn Plugin>>;

/// Long-lived registry of plugin implementations
#[derive(Default)]
pub struct PluginCatalog {
    factories: BTreeMap<Id, PluginFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, id: Id, factory: F)
    where
        F: Fn(&PluginModule) -> Box<dyn Plugin> + 'static,
    {
        self.factories.insert(id, Box::new(factory));
    }

    pub fn with<F>(mut self, id: Id, factory: F) -> Self
    where
        F: Fn(&PluginModule) -> Box<dyn Plugin> + 'static,
    {
        self.register(id, factory);
        self
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.factories.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &Id> {
        self.factories.keys()
    }
}

impl fmt::Debug for PluginCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginCatalog")
            .field("plugins", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Loading scope for the plugins of one schematic
pub struct PluginLoader<'a> {
    catalog: &'a PluginCatalog,
    module_path: &'a ResolvedModulePath,
}

impl<'a> PluginLoader<'a> {
    pub fn new(catalog: &'a PluginCatalog, module_path: &'a ResolvedModulePath) -> Self {
        Self { catalog, module_path }
    }

    pub fn module(&self, id: &Id) -> Result<PluginModule> {
        let artifact = self
            .module_path
            .get(id)
            .ok_or_else(|| ConveyorError::PluginNotResolved(id.clone()))?;
        Ok(PluginModule {
            id: artifact.id.clone(),
            version: artifact.version.clone(),
            location: artifact.location.clone(),
            module_path: self.module_path.view(id),
        })
    }

    pub fn load(&self, id: &Id) -> Result<Box<dyn Plugin>> {
        let factory = self
            .catalog
            .factories
            .get(id)
            .ok_or_else(|| ConveyorError::PluginNotFound(id.clone()))?;
        let module = self.module(id)?;
        Ok(factory(&module))
    }
}
