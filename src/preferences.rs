//! Version preferences with transitive inclusions

use std::collections::BTreeMap;

use serde::{Serialize, Serializer};

use crate::error::{ConveyorError, Result};
use crate::hierarchy::{HierarchyLoader, PreferencesModel};
use crate::id::Id;
use crate::properties::Properties;
use crate::repository::Repositories;
use crate::version::SemanticVersion;

/// Resolved version pins
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Preferences {
    versions: BTreeMap<Id, SemanticVersion>,
}

/// Serialized as `{ "group:name": "version" }`
impl Serialize for Preferences {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.versions.iter().map(|(id, version)| (id.to_string(), version)))
    }
}

impl Preferences {
    pub fn version(&self, id: &Id) -> Option<&SemanticVersion> {
        self.versions.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &SemanticVersion)> {
        self.versions.iter()
    }

    pub fn len(&self) -> usize {
        self.versions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Pin coming from an inclusion: the highest version wins
    fn include(&mut self, id: Id, version: SemanticVersion) {
        match self.versions.get(&id) {
            Some(existing) if existing.cmp_precedence(&version).is_ge() => {}
            _ => {
                self.versions.insert(id, version);
            }
        }
    }
}

impl FromIterator<(Id, SemanticVersion)> for Preferences {
    fn from_iter<I: IntoIterator<Item = (Id, SemanticVersion)>>(iter: I) -> Self {
        Self {
            versions: iter.into_iter().collect(),
        }
    }
}

/// Follows preference inclusions through manual hierarchies
pub struct PreferencesResolver<'a> {
    loader: &'a HierarchyLoader<'a>,
    repositories: &'a Repositories,
}

impl<'a> PreferencesResolver<'a> {
    pub fn new(loader: &'a HierarchyLoader<'a>, repositories: &'a Repositories) -> Self {
        Self { loader, repositories }
    }

    /// Included pins first, then locally declared pins on top of them
    pub fn resolve(&self, model: &PreferencesModel, properties: &Properties) -> Result<Preferences> {
        self.resolve_with_trail(model, properties, &mut Vec::new())
    }

    fn resolve_with_trail(
        &self,
        model: &PreferencesModel,
        properties: &Properties,
        trail: &mut Vec<(Id, String)>,
    ) -> Result<Preferences> {
        let mut preferences = Preferences::default();
        for inclusion in &model.inclusions {
            let version = properties.interpolated(&inclusion.version);
            let key = (inclusion.id.clone(), version.clone());
            if trail.contains(&key) {
                trail.push(key);
                return Err(ConveyorError::CyclicRequirement {
                    chain: trail.iter().map(|(id, version)| format!("{id}:{version}")).collect(),
                });
            }
            let hierarchy = self
                .loader
                .manual_hierarchy(&inclusion.id, &version, self.repositories)?;
            trail.push(key);
            let included = self.resolve_with_trail(
                &hierarchy.preferences(),
                &Properties::new(hierarchy.properties()),
                trail,
            )?;
            trail.pop();
            for (id, version) in included.versions {
                preferences.include(id, version);
            }
        }
        for artifact in &model.artifacts {
            let version = SemanticVersion::parse(&properties.interpolated(&artifact.version))?;
            preferences.versions.insert(artifact.id.clone(), version);
        }
        Ok(preferences)
    }
}
