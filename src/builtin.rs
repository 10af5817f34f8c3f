//! Plugins shipped with conveyor

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use tracing::info;

use crate::id::Id;
use crate::plugin::{Plugin, PluginCatalog, Stage, Step, TaskBinding};
use crate::properties::SchematicProperties;

pub const GROUP: &str = "conveyor";

/// Deletes a directory, by default the construction directory
#[derive(Debug, Clone, Default)]
pub struct CleanPlugin;

impl CleanPlugin {
    pub fn id() -> Id {
        Id::new(GROUP, "clean")
    }
}

impl Plugin for CleanPlugin {
    fn name(&self) -> &str {
        "clean"
    }

    fn bindings(
        &self,
        properties: &SchematicProperties,
        configuration: &BTreeMap<String, String>,
    ) -> Vec<TaskBinding> {
        let directory = configuration
            .get("directory")
            .filter(|directory| !directory.is_empty())
            .map(PathBuf::from)
            .or_else(|| properties.construction_directory());
        let Some(directory) = directory else {
            return Vec::new();
        };
        vec![TaskBinding::new(Stage::Clean, Step::Run, "clean", move |products, _| {
            if directory.exists() {
                info!(directory = %directory.display(), "cleaning");
                fs::remove_dir_all(&directory)
                    .with_context(|| format!("Failed to delete {}", directory.display()))?;
            }
            Ok(products)
        })]
    }
}

/// Catalog holding every built-in plugin
pub fn catalog() -> PluginCatalog {
    PluginCatalog::new().with(CleanPlugin::id(), |_| Box::new(CleanPlugin))
}
