//! Construction entry point

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::ConveyorConfig;
use crate::definition::{DefinitionReader, JsonDefinitionReader, ManualDefinition};
use crate::error::Result;
use crate::hierarchy::HierarchyLoader;
use crate::paths;
use crate::plugin::{PluginCatalog, Stage};
use crate::product::SchematicProducts;
use crate::repository::{self, RepositorySettings};
use crate::schematic::{Construction, EffectiveModel, Schematic, SchematicForest};

/// Discovers, orders and constructs schematics
pub struct Conveyor {
    config: ConveyorConfig,
    reader: Box<dyn DefinitionReader>,
    catalog: PluginCatalog,
    root_template: ManualDefinition,
}

impl Conveyor {
    pub fn new(catalog: PluginCatalog) -> Self {
        Self {
            config: ConveyorConfig::default(),
            reader: Box::new(JsonDefinitionReader),
            catalog,
            root_template: Self::default_root_template(),
        }
    }

    /// Built from configuration; a configured root template is read right away
    pub fn from_config(config: ConveyorConfig, catalog: PluginCatalog) -> Result<Self> {
        let conveyor = Self::new(catalog);
        let root_template = match &config.construction.root_template {
            Some(path) => conveyor.reader.manual_definition(path)?,
            None => Self::default_root_template(),
        };
        Ok(conveyor.with_config(config).with_root_template(root_template))
    }

    /// Template every schematic ends up inheriting from
    pub fn default_root_template() -> ManualDefinition {
        ManualDefinition {
            group: "conveyor".into(),
            name: "root".into(),
            version: "1.0.0".into(),
            ..ManualDefinition::default()
        }
    }

    pub fn with_config(mut self, config: ConveyorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reader(mut self, reader: impl DefinitionReader + 'static) -> Self {
        self.reader = Box::new(reader);
        self
    }

    pub fn with_root_template(mut self, root_template: ManualDefinition) -> Self {
        self.root_template = root_template;
        self
    }

    pub fn config(&self) -> &ConveyorConfig {
        &self.config
    }

    fn definition_path(&self, path: &Path) -> Result<PathBuf> {
        let path = paths::absolute(path)?;
        if path.is_dir() {
            Ok(path.join(&self.config.construction.definition))
        } else {
            Ok(path)
        }
    }

    /// Fallback settings for discovery; manual templates are looked up with
    /// the remote cache of their own chain
    fn discovery_settings(&self, path: &Path) -> RepositorySettings {
        RepositorySettings {
            remote_cache: self
                .config
                .repositories
                .remote_cache
                .clone()
                .unwrap_or_else(|| repository::default_remote_cache(path)),
            offline: self.config.repositories.offline,
        }
    }

    fn loader<'a>(&'a self, settings: &'a RepositorySettings) -> HierarchyLoader<'a> {
        HierarchyLoader::new(
            self.reader.as_ref(),
            &self.root_template,
            &self.config.construction.definition,
            settings,
        )
        .with_remote_cache(self.config.repositories.remote_cache.clone())
    }

    fn construction(&self) -> Construction<'_> {
        Construction::new(
            self.reader.as_ref(),
            &self.root_template,
            &self.config.construction.definition,
            &self.catalog,
        )
        .with_remote_cache(self.config.repositories.remote_cache.clone())
        .offline(self.config.repositories.offline)
    }

    /// Construct the schematic at `path` and everything it requires up to `stage`
    pub fn construct(&self, path: &Path, stage: Stage) -> Result<SchematicProducts> {
        let path = self.definition_path(path)?;
        let settings = self.discovery_settings(&path);
        let loader = self.loader(&settings);
        let forest = SchematicForest::discover(&loader, &path)?;
        let plan = forest.plan(stage)?;
        info!(
            schematic = %forest.initial().name(),
            %stage,
            schematics = plan.len(),
            "starting construction"
        );

        let construction = self.construction();
        let mut products = SchematicProducts::new();
        for (index, stage) in plan {
            let constructed = construction.construct(&forest.schematics()[index], stage, &products)?;
            products = products.with(constructed);
        }
        Ok(products)
    }

    /// Effective model of the schematic at `path`, without constructing anything
    pub fn effective_model(&self, path: &Path) -> Result<EffectiveModel> {
        let path = self.definition_path(path)?;
        let settings = self.discovery_settings(&path);
        let loader = self.loader(&settings);
        let schematic = Schematic::load(&loader, &path)?;
        self.construction().effective_model(&schematic)
    }
}

impl Default for Conveyor {
    fn default() -> Self {
        Self::new(crate::builtin::catalog())
    }
}
