//! Plugin task pipeline
//!
//! Collects the task bindings of every enabled plugin, drops the ones bound
//! past the target stage, orders the rest by `(stage, step)` and folds them
//! over the products, starting from nothing.

use tracing::{debug, info};

use crate::dependencies::SchematicDependencies;
use crate::error::{ConveyorError, Result};
use crate::hierarchy::PluginModel;
use crate::plugin::{PluginLoader, Stage, TaskBinding};
use crate::product::Products;
use crate::properties::Properties;

/// Configuration key that turns a plugin off when set to `false`
pub const ENABLED: &str = "enabled";

/// Binding together with the plugin that contributed it
#[derive(Debug)]
pub struct ScheduledTask {
    pub plugin: String,
    pub binding: TaskBinding,
}

/// Tasks of one schematic, in execution order
#[derive(Debug, Default)]
pub struct Pipeline {
    tasks: Vec<ScheduledTask>,
}

impl Pipeline {
    /// Load every plugin and collect the bindings up to `stage`
    pub fn collect(
        loader: &PluginLoader<'_>,
        plugins: &[PluginModel],
        properties: &Properties,
        stage: Stage,
    ) -> Result<Self> {
        let schematic_properties = properties.schematic_properties();
        let mut tasks = Vec::new();
        for model in plugins {
            let configuration = properties.interpolated_map(&model.configuration);
            if configuration.get(ENABLED).map(String::as_str) == Some("false") {
                debug!(plugin = %model.id, "plugin disabled");
                continue;
            }
            let plugin = loader.load(&model.id)?;
            let name = plugin.name().to_string();
            tasks.extend(
                plugin
                    .bindings(&schematic_properties, &configuration)
                    .into_iter()
                    .map(|binding| ScheduledTask {
                        plugin: name.clone(),
                        binding,
                    }),
            );
        }
        Ok(Self::from_tasks(tasks, stage))
    }

    /// Filter to `stage` and sort by `(stage, step)`, keeping declaration
    /// order among equal keys
    pub fn from_tasks(tasks: Vec<ScheduledTask>, stage: Stage) -> Self {
        let mut tasks: Vec<ScheduledTask> = tasks
            .into_iter()
            .filter(|task| task.binding.stage <= stage)
            .collect();
        tasks.sort_by_key(|task| (task.binding.stage, task.binding.step));
        Self { tasks }
    }

    pub fn tasks(&self) -> &[ScheduledTask] {
        &self.tasks
    }

    /// Fold the tasks over an empty products value
    pub fn execute(&self, dependencies: &SchematicDependencies) -> Result<Products> {
        self.tasks.iter().try_fold(Products::new(), |products, task| {
            info!(
                plugin = %task.plugin,
                task = %task.binding.name,
                stage = %task.binding.stage,
                step = ?task.binding.step,
                "executing task"
            );
            (task.binding.task)(products, dependencies).map_err(|source| ConveyorError::Task {
                plugin: task.plugin.clone(),
                source,
            })
        })
    }
}
