//! Resolved artifacts and version resolution strategies

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::trace;

use crate::definition::DependencyScope;
use crate::error::{ConveyorError, Result};
use crate::hierarchy::{DependencyModel, HierarchyLoader};
use crate::id::Id;
use crate::preferences::{Preferences, PreferencesResolver};
use crate::properties::Properties;
use crate::repository::{Classifier, Repositories};
use crate::version::SemanticVersion;

/// Artifact with a concrete version, its location and its own resolved dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: Id,
    pub version: SemanticVersion,
    pub location: PathBuf,
    pub dependencies: Vec<Artifact>,
}

impl Artifact {
    pub fn new(id: Id, version: SemanticVersion, location: PathBuf) -> Self {
        Self {
            id,
            version,
            location,
            dependencies: Vec::new(),
        }
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Artifact>) -> Self {
        self.dependencies = dependencies;
        self
    }
}

/// How a declared dependency gets its version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionResolutionStrategy {
    /// Declared directly by the schematic: explicit version, else the preference
    ExplicitWithPreferenceFallback,
    /// Declared by another artifact: the schematic's preference, then the
    /// artifact's own preference, then the explicit version
    PreferenceWithExplicitFallback,
}

impl VersionResolutionStrategy {
    /// `own_preferences` only matters for transitive declarations
    pub fn version(
        self,
        id: &Id,
        explicit: Option<&str>,
        properties: &Properties,
        preferences: &Preferences,
        own_preferences: &Preferences,
    ) -> Result<SemanticVersion> {
        let explicit = || -> Result<Option<SemanticVersion>> {
            explicit
                .map(|version| properties.interpolated(version))
                .filter(|version| !version.is_empty())
                .map(|version| SemanticVersion::parse(&version))
                .transpose()
        };
        let resolved = match self {
            VersionResolutionStrategy::ExplicitWithPreferenceFallback => {
                explicit()?.or_else(|| preferences.version(id).cloned())
            }
            VersionResolutionStrategy::PreferenceWithExplicitFallback => match preferences
                .version(id)
                .or_else(|| own_preferences.version(id))
            {
                Some(version) => Some(version.clone()),
                None => explicit()?,
            },
        };
        resolved.ok_or_else(|| ConveyorError::UnresolvedVersion { id: id.clone() })
    }
}

/// Builds artifact trees from repositories
pub struct ArtifactResolver<'a> {
    loader: &'a HierarchyLoader<'a>,
    repositories: &'a Repositories,
    preferences: &'a Preferences,
    properties: &'a Properties,
    /// Trees already built in this resolver, keyed by what shapes them
    resolved: RefCell<BTreeMap<(Id, SemanticVersion, BTreeSet<Id>), Artifact>>,
}

impl<'a> ArtifactResolver<'a> {
    /// `preferences` and `properties` belong to the schematic under construction
    pub fn new(
        loader: &'a HierarchyLoader<'a>,
        repositories: &'a Repositories,
        preferences: &'a Preferences,
        properties: &'a Properties,
    ) -> Self {
        Self {
            loader,
            repositories,
            preferences,
            properties,
            resolved: RefCell::new(BTreeMap::new()),
        }
    }

    /// Artifact declared directly by the schematic, with its transitive tree
    pub fn direct(&self, id: &Id, version: Option<&str>, exclusions: &BTreeSet<Id>) -> Result<Artifact> {
        let version = VersionResolutionStrategy::ExplicitWithPreferenceFallback.version(
            id,
            version,
            self.properties,
            self.preferences,
            &Preferences::default(),
        )?;
        self.artifact(id, version, exclusions, &mut Vec::new())
    }

    fn artifact(
        &self,
        id: &Id,
        version: SemanticVersion,
        exclusions: &BTreeSet<Id>,
        trail: &mut Vec<(Id, SemanticVersion)>,
    ) -> Result<Artifact> {
        if trail.iter().any(|(seen, seen_version)| seen == id && *seen_version == version) {
            let mut chain: Vec<String> = trail.iter().map(|(id, version)| format!("{id}:{version}")).collect();
            chain.push(format!("{id}:{version}"));
            return Err(ConveyorError::CyclicRequirement { chain });
        }
        let key = (id.clone(), version.clone(), exclusions.clone());
        if let Some(artifact) = self.resolved.borrow().get(&key) {
            return Ok(artifact.clone());
        }
        let location = self.repositories.require(id, &version, Classifier::Module)?;
        let hierarchy = self
            .loader
            .manual_hierarchy(id, version.as_str(), self.repositories)?;
        let own_properties = Properties::new(hierarchy.properties());
        let own_preferences = PreferencesResolver::new(self.loader, self.repositories)
            .resolve(&hierarchy.preferences(), &own_properties)?;

        trail.push((id.clone(), version.clone()));
        let mut dependencies = Vec::new();
        for dependency in hierarchy.dependencies()? {
            let DependencyModel::Artifact {
                id: dependency_id,
                version: declared,
                scope,
                exclusions: declared_exclusions,
            } = dependency
            else {
                continue;
            };
            if scope.unwrap_or_default() == DependencyScope::Test || exclusions.contains(&dependency_id) {
                continue;
            }
            let dependency_version = VersionResolutionStrategy::PreferenceWithExplicitFallback.version(
                &dependency_id,
                declared.as_deref(),
                &own_properties,
                self.preferences,
                &own_preferences,
            )?;
            let mut propagated = exclusions.clone();
            propagated.extend(declared_exclusions);
            trace!(requirer = %id, dependency = %dependency_id, version = %dependency_version, "transitive dependency");
            dependencies.push(self.artifact(&dependency_id, dependency_version, &propagated, trail)?);
        }
        trail.pop();

        let artifact = Artifact::new(id.clone(), version, location).with_dependencies(dependencies);
        self.resolved.borrow_mut().insert(key, artifact.clone());
        Ok(artifact)
    }
}
