//! Construction of a single schematic

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use super::Schematic;
use crate::artifact::{Artifact, ArtifactResolver};
use crate::definition::{DefinitionReader, DependencyScope, ManualDefinition};
use crate::dependencies::{SchematicDependencies, SchematicDependency};
use crate::error::{ConveyorError, Result};
use crate::hierarchy::{DependencyModel, HierarchyLoader, PluginModel};
use crate::module_path::ResolvedModulePath;
use crate::pipeline::{Pipeline, ENABLED};
use crate::plugin::{PluginCatalog, PluginLoader, Stage};
use crate::preferences::{Preferences, PreferencesResolver};
use crate::product::{ConstructedSchematic, ProductType, SchematicCoordinates, SchematicProducts};
use crate::properties::Properties;
use crate::repository::{self, Repositories, RepositoryModel, RepositorySettings, CACHE_DIRECTORY};
use crate::version::SemanticVersion;

/// Effective model of one schematic, as seen by its plugins
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveModel {
    pub coordinates: SchematicCoordinates,
    pub path: PathBuf,
    pub properties: BTreeMap<String, String>,
    pub repositories: Vec<RepositoryModel>,
    pub preferences: Preferences,
    pub plugins: Vec<PluginModel>,
    pub dependencies: Vec<DependencyModel>,
}

/// Constructs schematics one at a time
pub struct Construction<'a> {
    reader: &'a dyn DefinitionReader,
    root_template: &'a ManualDefinition,
    definition_file: &'a str,
    catalog: &'a PluginCatalog,
    remote_cache: Option<PathBuf>,
    offline: bool,
}

impl<'a> Construction<'a> {
    pub fn new(
        reader: &'a dyn DefinitionReader,
        root_template: &'a ManualDefinition,
        definition_file: &'a str,
        catalog: &'a PluginCatalog,
    ) -> Self {
        Self {
            reader,
            root_template,
            definition_file,
            catalog,
            remote_cache: None,
            offline: false,
        }
    }

    /// Remote cache used when a schematic does not set one
    pub fn with_remote_cache(mut self, remote_cache: Option<PathBuf>) -> Self {
        self.remote_cache = remote_cache;
        self
    }

    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    /// Effective properties including the reserved ones
    pub fn properties(&self, schematic: &Schematic) -> Properties {
        let default_cache = self
            .remote_cache
            .clone()
            .unwrap_or_else(|| repository::default_remote_cache(schematic.root_path()));
        Properties::new(schematic.hierarchy().properties()).with_reserved(
            &schematic.id(),
            schematic.version(),
            schematic.directory(),
            &default_cache,
        )
    }

    fn settings(&self, properties: &Properties) -> RepositorySettings {
        RepositorySettings {
            remote_cache: properties
                .remote_repository_cache_directory()
                .unwrap_or_else(|| PathBuf::from(CACHE_DIRECTORY).join("repository")),
            offline: self.offline,
        }
    }

    fn coordinates(schematic: &Schematic) -> SchematicCoordinates {
        SchematicCoordinates {
            group: schematic.definition().group.clone(),
            name: schematic.name().to_string(),
            version: schematic.version().to_string(),
        }
    }

    /// Merge and resolve everything a schematic declares without running tasks
    pub fn effective_model(&self, schematic: &Schematic) -> Result<EffectiveModel> {
        let properties = self.properties(schematic);
        let settings = self.settings(&properties);
        let loader = HierarchyLoader::new(self.reader, self.root_template, self.definition_file, &settings)
            .with_remote_cache(self.remote_cache.clone());
        let repositories = Repositories::from_models(&schematic.hierarchy().repositories(), &settings);
        let preferences = PreferencesResolver::new(&loader, &repositories)
            .resolve(&schematic.hierarchy().preferences(), &properties)?;
        Ok(EffectiveModel {
            coordinates: Self::coordinates(schematic),
            path: schematic.path().to_path_buf(),
            properties: properties
                .schematic_properties()
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
            repositories: schematic.hierarchy().repositories(),
            preferences,
            plugins: schematic.hierarchy().plugins(),
            dependencies: schematic.hierarchy().dependencies()?,
        })
    }

    /// Run the schematic's tasks up to `stage`
    pub fn construct(
        &self,
        schematic: &Schematic,
        stage: Stage,
        products: &SchematicProducts,
    ) -> Result<ConstructedSchematic> {
        info!(schematic = %schematic.name(), %stage, "constructing");
        let hierarchy = schematic.hierarchy();
        let properties = self.properties(schematic);
        let settings = self.settings(&properties);
        let loader = HierarchyLoader::new(self.reader, self.root_template, self.definition_file, &settings)
            .with_remote_cache(self.remote_cache.clone());
        let repositories = Repositories::from_models(&hierarchy.repositories(), &settings);
        let preferences = PreferencesResolver::new(&loader, &repositories)
            .resolve(&hierarchy.preferences(), &properties)?;
        let resolver = ArtifactResolver::new(&loader, &repositories, &preferences, &properties);

        let plugins: Vec<PluginModel> = hierarchy
            .plugins()
            .into_iter()
            .filter(|plugin| {
                plugin
                    .configuration
                    .get(ENABLED)
                    .map(|enabled| properties.interpolated(enabled))
                    .as_deref()
                    != Some("false")
            })
            .collect();
        let plugin_artifacts = plugins
            .iter()
            .map(|plugin| resolver.direct(&plugin.id, plugin.version.as_deref(), &BTreeSet::new()))
            .collect::<Result<Vec<Artifact>>>()?;
        let plugin_module_path = ResolvedModulePath::of(&plugin_artifacts)?;
        debug!(
            schematic = %schematic.name(),
            plugins = ?plugin_module_path.locations(),
            "resolved plugin module path"
        );

        let dependencies = hierarchy
            .dependencies()?
            .into_iter()
            .map(|dependency| self.dependency(&resolver, dependency, products))
            .collect::<Result<Vec<SchematicDependency>>>()?;
        let dependencies = SchematicDependencies::new(dependencies, products.clone());

        let loader = PluginLoader::new(self.catalog, &plugin_module_path);
        let pipeline = Pipeline::collect(&loader, &plugins, &properties, stage)?;
        let constructed = pipeline
            .execute(&dependencies)?
            .with(schematic.path(), ProductType::SchematicDefinition);
        info!(
            schematic = %schematic.name(),
            products = constructed.len(),
            "constructed"
        );

        Ok(ConstructedSchematic {
            coordinates: Self::coordinates(schematic),
            products: constructed,
            exports: dependencies.artifacts(&[DependencyScope::Implementation]),
        })
    }

    fn dependency(
        &self,
        resolver: &ArtifactResolver<'_>,
        dependency: DependencyModel,
        products: &SchematicProducts,
    ) -> Result<SchematicDependency> {
        let scope = dependency.scope();
        let artifact = match dependency {
            DependencyModel::Artifact {
                id,
                version,
                exclusions,
                ..
            } => resolver.direct(&id, version.as_deref(), &exclusions)?,
            DependencyModel::Schematic { name, .. } => {
                let constructed = products
                    .schematic(&name)
                    .ok_or_else(|| ConveyorError::SchematicNotFound { name: name.clone() })?;
                let module = constructed
                    .products
                    .single(ProductType::Module)
                    .ok_or_else(|| ConveyorError::ProductMissing {
                        name: name.clone(),
                        product_type: ProductType::Module,
                    })?;
                Artifact::new(
                    constructed.coordinates.id(),
                    SemanticVersion::parse(&constructed.coordinates.version)?,
                    module.to_path_buf(),
                )
                .with_dependencies(constructed.exports.clone())
            }
        };
        Ok(SchematicDependency { scope, artifact })
    }
}
