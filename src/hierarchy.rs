//! Inheritance hierarchies and the override engine
//!
//! A [`Hierarchy`] is a chain of model levels ordered root first, leaf last.
//! Folding the chain yields the effective model: properties are a shallow
//! union where later levels win, everything keyed (plugins, dependencies,
//! preference entries, repositories) goes through [`reduce`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::Hash;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::definition::{
    ArtifactDependencyDefinition, DefinitionReader, DependencyDefinition, DependencyScope,
    ManualDefinition, ManualReference, PluginDefinition, PreferencesDefinition, RepositoryDefinition,
    SchematicDefinition, TemplateDefinition,
};
use crate::error::{ConveyorError, Result};
use crate::id::Id;
use crate::paths;
use crate::properties::Properties;
use crate::repository::{self, Classifier, Repositories, RepositoryModel, RepositorySettings};
use crate::version::SemanticVersion;

// ============================================================================
// Levels
// ============================================================================

/// One node of an inheritance chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Level {
    /// Metadata only. The built-in root template has no location.
    Manual {
        definition: ManualDefinition,
        path: Option<PathBuf>,
    },
    /// A schematic definition read from disk
    Schematic {
        definition: SchematicDefinition,
        path: PathBuf,
    },
}

impl Level {
    pub fn id(&self) -> Id {
        match self {
            Level::Manual { definition, .. } => definition.id(),
            Level::Schematic { definition, .. } => definition.id(),
        }
    }

    pub fn version(&self) -> &str {
        match self {
            Level::Manual { definition, .. } => &definition.version,
            Level::Schematic { definition, .. } => &definition.version,
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Level::Manual { path, .. } => path.as_deref(),
            Level::Schematic { path, .. } => Some(path),
        }
    }

    pub fn is_schematic(&self) -> bool {
        matches!(self, Level::Schematic { .. })
    }

    fn properties(&self) -> &BTreeMap<String, String> {
        match self {
            Level::Manual { definition, .. } => &definition.properties,
            Level::Schematic { definition, .. } => &definition.properties,
        }
    }

    fn preferences(&self) -> &PreferencesDefinition {
        match self {
            Level::Manual { definition, .. } => &definition.preferences,
            Level::Schematic { definition, .. } => &definition.preferences,
        }
    }

    fn plugins(&self) -> &[PluginDefinition] {
        match self {
            Level::Manual { definition, .. } => &definition.plugins,
            Level::Schematic { definition, .. } => &definition.plugins,
        }
    }

    fn dependencies(&self) -> Vec<DependencyModel> {
        match self {
            Level::Manual { definition, .. } => definition
                .dependencies
                .iter()
                .map(DependencyModel::from_artifact)
                .collect(),
            Level::Schematic { definition, .. } => definition
                .dependencies
                .iter()
                .map(|dependency| match dependency {
                    DependencyDefinition::Artifact(artifact) => DependencyModel::from_artifact(artifact),
                    DependencyDefinition::Schematic(schematic) => DependencyModel::Schematic {
                        name: schematic.schematic.clone(),
                        scope: schematic.scope,
                    },
                })
                .collect(),
        }
    }

    fn repositories(&self) -> Vec<RepositoryModel> {
        let Level::Schematic { definition, path } = self else {
            return Vec::new();
        };
        let directory = path.parent().unwrap_or(Path::new(""));
        definition
            .repositories
            .iter()
            .map(|repository| match repository {
                RepositoryDefinition::Local { name, path, enabled } => RepositoryModel::Local {
                    name: name.clone(),
                    path: paths::resolve(directory, path),
                    enabled: *enabled,
                },
                RepositoryDefinition::Remote { name, url, enabled } => RepositoryModel::Remote {
                    name: name.clone(),
                    url: url.clone(),
                    enabled: *enabled,
                },
            })
            .collect()
    }
}

// ============================================================================
// Effective models
// ============================================================================

/// Plugin declaration after merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginModel {
    pub id: Id,
    pub version: Option<String>,
    pub configuration: BTreeMap<String, String>,
}

impl PluginModel {
    fn from_definition(definition: &PluginDefinition) -> Self {
        Self {
            id: Id::new(&definition.group, &definition.name),
            version: definition.version.clone(),
            configuration: definition.configuration.clone(),
        }
    }

    /// Configuration merged key by key, more specific keys win
    pub fn override_with(self, less_specific: PluginModel) -> PluginModel {
        let mut configuration = less_specific.configuration;
        configuration.extend(self.configuration);
        PluginModel {
            id: self.id,
            version: self.version.or(less_specific.version),
            configuration,
        }
    }
}

/// Dependency declaration after merging
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum DependencyModel {
    Artifact {
        id: Id,
        version: Option<String>,
        scope: Option<DependencyScope>,
        exclusions: BTreeSet<Id>,
    },
    Schematic {
        name: String,
        scope: Option<DependencyScope>,
    },
}

impl DependencyModel {
    fn from_artifact(definition: &ArtifactDependencyDefinition) -> Self {
        DependencyModel::Artifact {
            id: Id::new(&definition.group, &definition.name),
            version: definition.version.clone(),
            scope: definition.scope,
            exclusions: definition.exclusions.iter().cloned().collect(),
        }
    }

    /// Identity used when merging: schematics are keyed by name without group
    pub fn id(&self) -> Id {
        match self {
            DependencyModel::Artifact { id, .. } => id.clone(),
            DependencyModel::Schematic { name, .. } => Id::named(name),
        }
    }

    pub fn scope(&self) -> DependencyScope {
        match self {
            DependencyModel::Artifact { scope, .. } | DependencyModel::Schematic { scope, .. } => {
                scope.unwrap_or_default()
            }
        }
    }

    /// Fill unset fields from the less specific declaration.
    /// Overriding across variants is rejected.
    pub fn override_with(self, less_specific: DependencyModel) -> Result<DependencyModel> {
        match (self, less_specific) {
            (
                DependencyModel::Artifact { id, version, scope, mut exclusions },
                DependencyModel::Artifact {
                    version: inherited_version,
                    scope: inherited_scope,
                    exclusions: inherited_exclusions,
                    ..
                },
            ) => {
                exclusions.extend(inherited_exclusions);
                Ok(DependencyModel::Artifact {
                    id,
                    version: version.or(inherited_version),
                    scope: scope.or(inherited_scope),
                    exclusions,
                })
            }
            (
                DependencyModel::Schematic { name, scope },
                DependencyModel::Schematic {
                    scope: inherited_scope,
                    ..
                },
            ) => Ok(DependencyModel::Schematic {
                name,
                scope: scope.or(inherited_scope),
            }),
            (more_specific, _) => Err(ConveyorError::IncompatibleOverride {
                id: more_specific.id(),
            }),
        }
    }
}

/// Preference entry: an artifact pin or an inclusion of another manual's pins
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreferenceModel {
    pub id: Id,
    pub version: String,
}

/// Preferences after merging, before inclusions are followed
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreferencesModel {
    pub inclusions: Vec<PreferenceModel>,
    pub artifacts: Vec<PreferenceModel>,
}

impl PreferencesModel {
    fn from_definition(definition: &PreferencesDefinition) -> Self {
        Self {
            inclusions: definition
                .inclusions
                .iter()
                .map(|inclusion: &ManualReference| PreferenceModel {
                    id: inclusion.id(),
                    version: inclusion.version.clone(),
                })
                .collect(),
            artifacts: definition
                .artifacts
                .iter()
                .map(|artifact| PreferenceModel {
                    id: Id::new(&artifact.group, &artifact.name),
                    version: artifact.version.clone(),
                })
                .collect(),
        }
    }

    /// Entries of the more specific side win, the rest is kept
    pub fn override_with(self, less_specific: PreferencesModel) -> PreferencesModel {
        let merge = |more: Vec<PreferenceModel>, less: Vec<PreferenceModel>| {
            merge_keyed(
                [less, more],
                |preference: &PreferenceModel| preference.id.clone(),
                |more_specific, _| Ok(more_specific),
            )
            .unwrap_or_default()
        };
        PreferencesModel {
            inclusions: merge(self.inclusions, less_specific.inclusions),
            artifacts: merge(self.artifacts, less_specific.artifacts),
        }
    }
}

// ============================================================================
// Override engine
// ============================================================================

fn merge_keyed<T, K, I, F, O>(groups: I, key_of: F, mut override_fn: O) -> Result<Vec<T>>
where
    I: IntoIterator<Item = Vec<T>>,
    K: Eq + Hash,
    F: Fn(&T) -> K,
    O: FnMut(T, T) -> Result<T>,
{
    let mut merged: Vec<Option<T>> = Vec::new();
    let mut positions: HashMap<K, usize> = HashMap::new();
    for item in groups.into_iter().flatten() {
        let key = key_of(&item);
        match positions.get(&key) {
            Some(&position) => {
                let entry = &mut merged[position];
                let combined = match entry.take() {
                    Some(less_specific) => override_fn(item, less_specific)?,
                    None => item,
                };
                *entry = Some(combined);
            }
            None => {
                positions.insert(key, merged.len());
                merged.push(Some(item));
            }
        }
    }
    Ok(merged.into_iter().flatten().collect())
}

/// Generic merge of a keyed collection over a chain of levels.
///
/// `extract` pulls the collection out of every level, `key_of` groups entries
/// and `override_fn(more_specific, less_specific)` combines entries sharing a
/// key. Entries keep the position where their key was first seen.
pub fn reduce<T, K, E, F, O>(levels: &[Level], extract: E, key_of: F, override_fn: O) -> Result<Vec<T>>
where
    K: Eq + Hash,
    E: Fn(&Level) -> Vec<T>,
    F: Fn(&T) -> K,
    O: FnMut(T, T) -> Result<T>,
{
    merge_keyed(levels.iter().map(extract), key_of, override_fn)
}

/// Shallow union of properties, later levels win and empty values delete
pub fn properties(levels: &[Level]) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    for level in levels {
        for (key, value) in level.properties() {
            if value.is_empty() {
                merged.remove(key);
            } else {
                merged.insert(key.clone(), value.clone());
            }
        }
    }
    merged
}

fn repositories(levels: &[Level]) -> Vec<RepositoryModel> {
    merge_keyed(
        levels.iter().map(Level::repositories),
        |repository: &RepositoryModel| repository.name().to_string(),
        |more_specific, _| Ok(more_specific),
    )
    .unwrap_or_default()
}

/// Chain of levels, root first
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hierarchy {
    levels: Vec<Level>,
}

impl Hierarchy {
    /// Levels must be ordered root first and hold at least one level
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    pub fn levels(&self) -> &[Level] {
        &self.levels
    }

    pub fn leaf(&self) -> Option<&Level> {
        self.levels.last()
    }

    pub fn id(&self) -> Id {
        self.leaf().map(Level::id).unwrap_or_else(|| Id::named(""))
    }

    pub fn version(&self) -> &str {
        self.leaf().map(Level::version).unwrap_or_default()
    }

    /// Location of the leaf definition
    pub fn path(&self) -> Option<&Path> {
        self.leaf().and_then(Level::path)
    }

    /// Locations of every schematic level, root first
    pub fn schematic_paths(&self) -> impl Iterator<Item = &Path> {
        self.levels
            .iter()
            .filter(|level| level.is_schematic())
            .filter_map(Level::path)
    }

    /// Whether a schematic stored at `path` is one of this leaf's ancestors
    pub fn inherits_from(&self, path: &Path) -> bool {
        let ancestors = self.levels.len().saturating_sub(1);
        self.levels[..ancestors]
            .iter()
            .any(|level| level.is_schematic() && level.path() == Some(path))
    }

    pub fn properties(&self) -> BTreeMap<String, String> {
        properties(&self.levels)
    }

    pub fn plugins(&self) -> Vec<PluginModel> {
        reduce(
            &self.levels,
            |level| level.plugins().iter().map(PluginModel::from_definition).collect(),
            |plugin: &PluginModel| plugin.id.clone(),
            |more_specific, less_specific| Ok(more_specific.override_with(less_specific)),
        )
        .unwrap_or_default()
    }

    pub fn dependencies(&self) -> Result<Vec<DependencyModel>> {
        reduce(
            &self.levels,
            Level::dependencies,
            DependencyModel::id,
            DependencyModel::override_with,
        )
    }

    /// Each level's preferences override the previous ones
    pub fn preferences(&self) -> PreferencesModel {
        self.levels
            .iter()
            .map(|level| PreferencesModel::from_definition(level.preferences()))
            .fold(PreferencesModel::default(), |less_specific, more_specific| {
                more_specific.override_with(less_specific)
            })
    }

    /// Repositories of the schematic levels, merged by name
    pub fn repositories(&self) -> Vec<RepositoryModel> {
        repositories(&self.levels)
    }
}

// ============================================================================
// Template resolution
// ============================================================================

/// Builds hierarchies by walking template references
pub struct HierarchyLoader<'a> {
    reader: &'a dyn DefinitionReader,
    root_template: &'a ManualDefinition,
    definition_file: &'a str,
    settings: &'a RepositorySettings,
    /// Configured remote cache, taking precedence over the root-based default
    remote_cache: Option<PathBuf>,
}

impl<'a> HierarchyLoader<'a> {
    pub fn new(
        reader: &'a dyn DefinitionReader,
        root_template: &'a ManualDefinition,
        definition_file: &'a str,
        settings: &'a RepositorySettings,
    ) -> Self {
        Self {
            reader,
            root_template,
            definition_file,
            settings,
            remote_cache: None,
        }
    }

    pub fn with_remote_cache(mut self, remote_cache: Option<PathBuf>) -> Self {
        self.remote_cache = remote_cache;
        self
    }

    pub fn reader(&self) -> &dyn DefinitionReader {
        self.reader
    }

    pub fn settings(&self) -> &RepositorySettings {
        self.settings
    }

    /// Path to a definition: directories get the definition file name appended
    pub fn definition_path(&self, base: &Path, value: &Path) -> PathBuf {
        let path = paths::resolve(base, value);
        if path.is_dir() {
            path.join(self.definition_file)
        } else {
            path
        }
    }

    fn parent_definition(&self, path: &Path) -> Option<PathBuf> {
        let candidate = path.parent()?.parent()?.join(self.definition_file);
        candidate.is_file().then_some(candidate)
    }

    /// Chain of a schematic definition.
    ///
    /// Without an explicit template a schematic inherits from the definition
    /// in its parent directory, and ultimately from the root template.
    pub fn schematic_hierarchy(&self, path: &Path) -> Result<Hierarchy> {
        let mut levels = Vec::new();
        let mut visited: Vec<PathBuf> = Vec::new();
        let mut current = paths::absolute(path)?;
        loop {
            if visited.contains(&current) {
                visited.push(current);
                return Err(ConveyorError::CyclicSchematics {
                    names: visited.iter().map(|path| path.display().to_string()).collect(),
                });
            }
            let definition = self.reader.schematic_definition(&current)?;
            let template = definition.template.clone();
            visited.push(current.clone());
            levels.push(Level::Schematic {
                definition,
                path: current.clone(),
            });
            let directory = current.parent().unwrap_or(Path::new("")).to_path_buf();
            match template {
                TemplateDefinition::Path(template) => {
                    current = self.definition_path(&directory, &template);
                }
                TemplateDefinition::None => match self.parent_definition(&current) {
                    Some(parent) => current = parent,
                    None => {
                        levels.push(Level::Manual {
                            definition: self.root_template.clone(),
                            path: None,
                        });
                        break;
                    }
                },
                TemplateDefinition::Manual(reference) => {
                    let local: Vec<Level> = levels.iter().rev().cloned().collect();
                    let properties = Properties::new(properties(&local));
                    let settings = self.template_settings(&levels, &properties, &current);
                    let repositories = Repositories::from_models(&repositories(&local), &settings);
                    let version = properties.interpolated(&reference.version);
                    let manual = self.manual_hierarchy(&reference.id(), &version, &repositories)?;
                    levels.extend(manual.levels.into_iter().rev());
                    break;
                }
            }
        }
        levels.reverse();
        debug!(
            schematic = %path.display(),
            levels = levels.len(),
            "resolved schematic hierarchy"
        );
        Ok(Hierarchy::new(levels))
    }

    /// Settings for looking up the manual template of a chain whose root-most
    /// schematic is `root_path`, with the same remote cache construction uses
    fn template_settings(&self, levels: &[Level], properties: &Properties, root_path: &Path) -> RepositorySettings {
        let default = self
            .remote_cache
            .clone()
            .unwrap_or_else(|| repository::default_remote_cache(root_path));
        let remote_cache = match levels.first() {
            Some(Level::Schematic { definition, path }) => properties
                .clone()
                .with_reserved(
                    &definition.id(),
                    &definition.version,
                    path.parent().unwrap_or(Path::new("")),
                    &default,
                )
                .remote_repository_cache_directory()
                .unwrap_or(default),
            _ => default,
        };
        RepositorySettings {
            remote_cache,
            offline: self.settings.offline,
        }
    }

    /// Chain of a manual stored in one of the repositories
    pub fn manual_hierarchy(&self, id: &Id, version: &str, repositories: &Repositories) -> Result<Hierarchy> {
        let mut levels: Vec<Level> = Vec::new();
        let mut trail: Vec<(Id, String)> = Vec::new();
        let mut next = Some((id.clone(), version.to_string()));
        while let Some((id, version)) = next.take() {
            if trail.contains(&(id.clone(), version.clone())) {
                trail.push((id, version));
                return Err(ConveyorError::CyclicRequirement {
                    chain: trail.iter().map(|(id, version)| format!("{id}:{version}")).collect(),
                });
            }
            let semantic = SemanticVersion::parse(&version)?;
            let path = repositories.require(&id, &semantic, Classifier::SchematicDefinition)?;
            let definition = self.reader.manual_definition(&path)?;
            trail.push((id, version));
            let template = definition.template.clone();
            levels.push(Level::Manual {
                definition,
                path: Some(path),
            });
            if let Some(template) = template {
                let local: Vec<Level> = levels.iter().rev().cloned().collect();
                let version = Properties::new(properties(&local)).interpolated(&template.version);
                next = Some((template.id(), version));
            }
        }
        levels.reverse();
        Ok(Hierarchy::new(levels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::JsonDefinitionReader;
    use crate::repository::LocalDirectoryRepository;
    use serde_json::{json, Value};
    use std::fs;
    use tempfile::TempDir;

    fn manual(value: Value) -> Level {
        Level::Manual {
            definition: serde_json::from_value(value).unwrap(),
            path: None,
        }
    }

    fn schematic(path: &str, value: Value) -> Level {
        Level::Schematic {
            definition: serde_json::from_value(value).unwrap(),
            path: PathBuf::from(path),
        }
    }

    fn write(path: &Path, value: Value) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
    }

    fn settings(temp: &TempDir) -> RepositorySettings {
        RepositorySettings {
            remote_cache: temp.path().join("cache"),
            offline: true,
        }
    }

    #[test]
    fn test_property_override_and_deletion() {
        let hierarchy = Hierarchy::new(vec![
            manual(json!({
                "name": "template", "version": "1.0.0",
                "properties": { "kept": "template", "overridden": "template", "removed": "template" }
            })),
            schematic("/project/conveyor.json", json!({
                "name": "project", "version": "1.0.0",
                "properties": { "overridden": "project", "removed": "", "added": "project" }
            })),
        ]);
        let properties = hierarchy.properties();
        assert_eq!(properties["kept"], "template");
        assert_eq!(properties["overridden"], "project");
        assert_eq!(properties["added"], "project");
        assert!(!properties.contains_key("removed"));
    }

    #[test]
    fn test_plugin_configuration_merge() {
        let hierarchy = Hierarchy::new(vec![
            manual(json!({
                "name": "template", "version": "1.0.0",
                "plugins": [
                    { "name": "compile", "version": "1.0.0",
                      "configuration": { "template-only": "t", "shared": "t" } },
                    { "name": "archive", "version": "1.0.0" }
                ]
            })),
            schematic("/project/conveyor.json", json!({
                "name": "project", "version": "1.0.0",
                "plugins": [
                    { "name": "compile", "configuration": { "shared": "p", "child-only": "p" } }
                ]
            })),
        ]);
        let plugins = hierarchy.plugins();
        assert_eq!(plugins.len(), 2);
        assert_eq!(plugins[0].id, Id::named("compile"));
        assert_eq!(plugins[0].version.as_deref(), Some("1.0.0"));
        assert_eq!(plugins[0].configuration["template-only"], "t");
        assert_eq!(plugins[0].configuration["shared"], "p");
        assert_eq!(plugins[0].configuration["child-only"], "p");
        assert_eq!(plugins[1].id, Id::named("archive"));
    }

    #[test]
    fn test_dependency_override_fills_unset_fields() {
        let hierarchy = Hierarchy::new(vec![
            manual(json!({
                "name": "template", "version": "1.0.0",
                "dependencies": [{ "name": "library", "version": "1.0.0", "scope": "TEST" }]
            })),
            schematic("/project/conveyor.json", json!({
                "name": "project", "version": "1.0.0",
                "dependencies": [{ "name": "library", "version": "2.0.0" }]
            })),
        ]);
        let dependencies = hierarchy.dependencies().unwrap();
        assert_eq!(
            dependencies,
            vec![DependencyModel::Artifact {
                id: Id::named("library"),
                version: Some("2.0.0".into()),
                scope: Some(DependencyScope::Test),
                exclusions: BTreeSet::new(),
            }]
        );
    }

    #[test]
    fn test_incompatible_dependency_override_fails() {
        let template = schematic("/template/conveyor.json", json!({
            "name": "template", "version": "1.0.0",
            "dependencies": [{ "schematic": "library" }]
        }));
        let project = schematic("/project/conveyor.json", json!({
            "name": "project", "version": "1.0.0",
            "dependencies": [{ "name": "library", "version": "1.0.0" }]
        }));
        let error = Hierarchy::new(vec![template, project]).dependencies().unwrap_err();
        assert!(matches!(error, ConveyorError::IncompatibleOverride { id } if id == Id::named("library")));
    }

    #[test]
    fn test_schematic_dependency_override() {
        let more = DependencyModel::Schematic {
            name: "library".into(),
            scope: None,
        };
        let less = DependencyModel::Schematic {
            name: "library".into(),
            scope: Some(DependencyScope::Test),
        };
        assert_eq!(more.override_with(less).unwrap().scope(), DependencyScope::Test);
    }

    #[test]
    fn test_reduce_keeps_first_seen_order() {
        let levels = vec![
            manual(json!({ "name": "a", "version": "1.0.0", "properties": { "x": "1", "y": "1" } })),
            manual(json!({ "name": "b", "version": "1.0.0", "properties": { "z": "2", "x": "2" } })),
        ];
        let reduced = reduce(
            &levels,
            |level| {
                level
                    .properties()
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            },
            |(key, _): &(String, String)| key.clone(),
            |more_specific, _| Ok(more_specific),
        )
        .unwrap();
        assert_eq!(
            reduced,
            vec![
                ("x".to_string(), "2".to_string()),
                ("y".to_string(), "1".to_string()),
                ("z".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_preferences_override() {
        let hierarchy = Hierarchy::new(vec![
            manual(json!({
                "name": "template", "version": "1.0.0",
                "preferences": {
                    "artifacts": [
                        { "name": "a", "version": "1.0.0" },
                        { "name": "b", "version": "1.0.0" }
                    ]
                }
            })),
            manual(json!({
                "name": "child", "version": "1.0.0",
                "preferences": {
                    "inclusions": [{ "name": "bom", "version": "1.0.0" }],
                    "artifacts": [{ "name": "a", "version": "2.0.0" }]
                }
            })),
        ]);
        let preferences = hierarchy.preferences();
        assert_eq!(preferences.artifacts.len(), 2);
        assert_eq!(preferences.artifacts[0].version, "2.0.0");
        assert_eq!(preferences.artifacts[1].version, "1.0.0");
        assert_eq!(preferences.inclusions[0].id, Id::named("bom"));
    }

    #[test]
    fn test_inherits_from_ancestors_only() {
        let hierarchy = Hierarchy::new(vec![
            schematic("/root/conveyor.json", json!({ "name": "root", "version": "1.0.0" })),
            schematic("/root/child/conveyor.json", json!({ "name": "child", "version": "1.0.0" })),
        ]);
        assert!(hierarchy.inherits_from(Path::new("/root/conveyor.json")));
        assert!(!hierarchy.inherits_from(Path::new("/root/child/conveyor.json")));
    }

    #[test]
    fn test_schematic_hierarchy_walks_parent_directories() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("project/conveyor.json");
        let child = temp.path().join("project/child/conveyor.json");
        write(&root, json!({ "name": "project", "version": "1.0.0" }));
        write(&child, json!({ "name": "child", "version": "1.0.0" }));

        let root_template = ManualDefinition {
            name: "root-template".into(),
            version: "1.0.0".into(),
            ..ManualDefinition::default()
        };
        let settings = settings(&temp);
        let loader = HierarchyLoader::new(&JsonDefinitionReader, &root_template, "conveyor.json", &settings);
        let hierarchy = loader.schematic_hierarchy(&child).unwrap();

        let names: Vec<String> = hierarchy.levels().iter().map(|level| level.id().name).collect();
        assert_eq!(names, vec!["root-template", "project", "child"]);
        assert!(hierarchy.inherits_from(&root));
    }

    #[test]
    fn test_schematic_hierarchy_with_manual_template() {
        let temp = TempDir::new().unwrap();
        let repository = LocalDirectoryRepository::new("local", temp.path().join("repository"));
        let base = SemanticVersion::parse("1.0.0").unwrap();
        let bom = SemanticVersion::parse("2.0.0").unwrap();
        repository
            .store(
                &Id::named("base"),
                &base,
                Classifier::SchematicDefinition,
                json!({ "name": "base", "version": "1.0.0", "properties": { "from": "base" } })
                    .to_string()
                    .as_bytes(),
            )
            .unwrap();
        repository
            .store(
                &Id::named("bom"),
                &bom,
                Classifier::SchematicDefinition,
                json!({
                    "name": "bom", "version": "2.0.0",
                    "template": { "name": "base", "version": "${base.version}" },
                    "properties": { "base.version": "1.0.0" }
                })
                .to_string()
                .as_bytes(),
            )
            .unwrap();
        let project = temp.path().join("project/conveyor.json");
        write(&project, json!({
            "name": "project", "version": "1.0.0",
            "template": { "name": "bom", "version": "${bom.version}" },
            "repositories": [{ "name": "local", "path": "../repository" }],
            "properties": { "bom.version": "2.0.0" }
        }));

        let root_template = ManualDefinition::default();
        let settings = settings(&temp);
        let loader = HierarchyLoader::new(&JsonDefinitionReader, &root_template, "conveyor.json", &settings);
        let hierarchy = loader.schematic_hierarchy(&project).unwrap();

        let names: Vec<String> = hierarchy.levels().iter().map(|level| level.id().name).collect();
        assert_eq!(names, vec!["base", "bom", "project"]);
        assert_eq!(hierarchy.properties()["from"], "base");
    }

    fn cache_manual(cache: &Path, value: Value) {
        let version = SemanticVersion::parse(value["version"].as_str().unwrap()).unwrap();
        LocalDirectoryRepository::new("cache", cache)
            .store(
                &Id::named(value["name"].as_str().unwrap()),
                &version,
                Classifier::SchematicDefinition,
                value.to_string().as_bytes(),
            )
            .unwrap();
    }

    fn online(temp: &TempDir) -> RepositorySettings {
        RepositorySettings {
            remote_cache: temp.path().join("elsewhere"),
            offline: false,
        }
    }

    #[test]
    fn test_manual_template_found_in_cache_next_to_chain_root() {
        let temp = TempDir::new().unwrap();
        write(&temp.path().join("project/conveyor.json"), json!({
            "name": "project", "version": "1.0.0",
            "template": { "name": "bom", "version": "1.0.0" },
            "repositories": [{ "name": "remote", "url": "http://127.0.0.1:9/unreachable" }]
        }));
        let child = temp.path().join("project/child/conveyor.json");
        write(&child, json!({ "name": "child", "version": "1.0.0" }));
        cache_manual(
            &temp.path().join("project/.conveyor-cache/repository"),
            json!({ "name": "bom", "version": "1.0.0" }),
        );

        let root_template = ManualDefinition::default();
        let settings = online(&temp);
        let loader = HierarchyLoader::new(&JsonDefinitionReader, &root_template, "conveyor.json", &settings);
        let hierarchy = loader.schematic_hierarchy(&child).unwrap();

        let names: Vec<String> = hierarchy.levels().iter().map(|level| level.id().name).collect();
        assert_eq!(names, vec!["bom", "project", "child"]);
    }

    #[test]
    fn test_manual_template_found_in_declared_cache() {
        let temp = TempDir::new().unwrap();
        let declared = temp.path().join("declared-cache");
        let project = temp.path().join("project/conveyor.json");
        write(&project, json!({
            "name": "project", "version": "1.0.0",
            "template": { "name": "bom", "version": "1.0.0" },
            "repositories": [{ "name": "remote", "url": "http://127.0.0.1:9/unreachable" }],
            "properties": { "conveyor.repository.remote.cache.directory": declared.display().to_string() }
        }));
        cache_manual(&declared, json!({ "name": "bom", "version": "1.0.0" }));

        let root_template = ManualDefinition::default();
        let settings = online(&temp);
        let loader = HierarchyLoader::new(&JsonDefinitionReader, &root_template, "conveyor.json", &settings);
        let hierarchy = loader.schematic_hierarchy(&project).unwrap();

        assert_eq!(hierarchy.levels().len(), 2);
    }

    #[test]
    fn test_cyclic_path_templates_are_rejected() {
        let temp = TempDir::new().unwrap();
        let a = temp.path().join("a/conveyor.json");
        let b = temp.path().join("b/conveyor.json");
        write(&a, json!({ "name": "a", "version": "1.0.0", "template": { "path": "../b" } }));
        write(&b, json!({ "name": "b", "version": "1.0.0", "template": { "path": "../a/conveyor.json" } }));

        let root_template = ManualDefinition::default();
        let settings = settings(&temp);
        let loader = HierarchyLoader::new(&JsonDefinitionReader, &root_template, "conveyor.json", &settings);
        let error = loader.schematic_hierarchy(&a).unwrap_err();
        assert!(matches!(error, ConveyorError::CyclicSchematics { .. }));
    }

    #[test]
    fn test_missing_definition() {
        let temp = TempDir::new().unwrap();
        let root_template = ManualDefinition::default();
        let settings = settings(&temp);
        let loader = HierarchyLoader::new(&JsonDefinitionReader, &root_template, "conveyor.json", &settings);
        let error = loader
            .schematic_hierarchy(&temp.path().join("missing/conveyor.json"))
            .unwrap_err();
        assert!(matches!(error, ConveyorError::DefinitionNotFound { .. }));
    }
}
