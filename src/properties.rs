//! Effective properties, reserved keys and `${key}` interpolation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tracing::warn;

use crate::id::Id;
use crate::paths;

pub const SCHEMATIC_GROUP: &str = "conveyor.schematic.group";
pub const SCHEMATIC_NAME: &str = "conveyor.schematic.name";
pub const SCHEMATIC_VERSION: &str = "conveyor.schematic.version";
pub const DISCOVERY_DIRECTORY: &str = "conveyor.discovery.directory";
pub const CONSTRUCTION_DIRECTORY: &str = "conveyor.construction.directory";
pub const REMOTE_REPOSITORY_CACHE_DIRECTORY: &str = "conveyor.repository.remote.cache.directory";

const DEFAULT_CONSTRUCTION_DIRECTORY: &str = ".conveyor";

fn interpolation_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"\$\{([^}]+)\}").ok())
        .as_ref()
}

/// Property map of one schematic or manual hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Properties {
    all: BTreeMap<String, String>,
}

impl Properties {
    pub fn new(all: BTreeMap<String, String>) -> Self {
        Self { all }
    }

    /// Value as declared, without interpolation
    pub fn raw(&self, key: &str) -> Option<&str> {
        self.all.get(key).map(String::as_str)
    }

    /// Interpolated value of a key
    pub fn get(&self, key: &str) -> Option<String> {
        self.all.get(key).map(|value| self.interpolated(value))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.all.contains_key(key)
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.all.insert(key.into(), value.into());
        self
    }

    /// Set a key only when nothing was declared for it
    pub fn with_default(mut self, key: &str, value: impl Into<String>) -> Self {
        self.all.entry(key.to_string()).or_insert_with(|| value.into());
        self
    }

    /// Replace every `${key}` with the recursively interpolated property value.
    /// Unknown keys become the empty string.
    pub fn interpolated(&self, value: &str) -> String {
        self.interpolate(value, &mut Vec::new())
    }

    /// Interpolate every value of a map, e.g. a plugin configuration
    pub fn interpolated_map(&self, map: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        map.iter()
            .map(|(key, value)| (key.clone(), self.interpolated(value)))
            .collect()
    }

    fn interpolate(&self, value: &str, resolving: &mut Vec<String>) -> String {
        let Some(pattern) = interpolation_pattern() else {
            return value.to_string();
        };
        let mut result = String::with_capacity(value.len());
        let mut last = 0;
        for captures in pattern.captures_iter(value) {
            let (Some(whole), Some(key)) = (captures.get(0), captures.get(1)) else {
                continue;
            };
            result.push_str(&value[last..whole.start()]);
            result.push_str(&self.reference(key.as_str(), resolving));
            last = whole.end();
        }
        result.push_str(&value[last..]);
        result
    }

    fn reference(&self, key: &str, resolving: &mut Vec<String>) -> String {
        if resolving.iter().any(|pending| pending == key) {
            warn!(key, "property references itself, interpolating as empty");
            return String::new();
        }
        match self.all.get(key) {
            Some(value) => {
                resolving.push(key.to_string());
                let interpolated = self.interpolate(value, resolving);
                resolving.pop();
                interpolated
            }
            None => String::new(),
        }
    }

    /// Fill in the reserved keys. Values declared by the user win; relative
    /// directories are resolved against the definition's directory.
    pub fn with_reserved(
        self,
        id: &Id,
        version: &str,
        definition_directory: &Path,
        default_remote_cache: &Path,
    ) -> Self {
        let properties = self
            .with_default(SCHEMATIC_GROUP, id.group.clone())
            .with_default(SCHEMATIC_NAME, id.name.clone())
            .with_default(SCHEMATIC_VERSION, version);
        let discovery = properties
            .directory(DISCOVERY_DIRECTORY, definition_directory)
            .unwrap_or_else(|| definition_directory.to_path_buf());
        let construction = properties
            .directory(CONSTRUCTION_DIRECTORY, definition_directory)
            .unwrap_or_else(|| discovery.join(DEFAULT_CONSTRUCTION_DIRECTORY));
        let cache = properties
            .directory(REMOTE_REPOSITORY_CACHE_DIRECTORY, definition_directory)
            .unwrap_or_else(|| default_remote_cache.to_path_buf());
        properties
            .with(DISCOVERY_DIRECTORY, discovery.to_string_lossy())
            .with(CONSTRUCTION_DIRECTORY, construction.to_string_lossy())
            .with(REMOTE_REPOSITORY_CACHE_DIRECTORY, cache.to_string_lossy())
    }

    fn directory(&self, key: &str, base: &Path) -> Option<PathBuf> {
        self.get(key)
            .filter(|value| !value.is_empty())
            .map(|value| paths::resolve(base, value))
    }

    pub fn discovery_directory(&self) -> Option<PathBuf> {
        self.get(DISCOVERY_DIRECTORY).map(PathBuf::from)
    }

    pub fn construction_directory(&self) -> Option<PathBuf> {
        self.get(CONSTRUCTION_DIRECTORY).map(PathBuf::from)
    }

    pub fn remote_repository_cache_directory(&self) -> Option<PathBuf> {
        self.get(REMOTE_REPOSITORY_CACHE_DIRECTORY).map(PathBuf::from)
    }

    /// Interpolated, read-only view handed to plugins
    pub fn schematic_properties(&self) -> SchematicProperties {
        SchematicProperties {
            values: self
                .all
                .iter()
                .map(|(key, value)| (key.clone(), self.interpolated(value)))
                .filter(|(_, value)| !value.is_empty())
                .collect(),
        }
    }
}

/// Interpolated properties of the schematic under construction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SchematicProperties {
    values: BTreeMap<String, String>,
}

impl SchematicProperties {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value.as_str()))
    }

    pub fn schematic_name(&self) -> Option<&str> {
        self.get(SCHEMATIC_NAME)
    }

    pub fn discovery_directory(&self) -> Option<PathBuf> {
        self.get(DISCOVERY_DIRECTORY).map(PathBuf::from)
    }

    pub fn construction_directory(&self) -> Option<PathBuf> {
        self.get(CONSTRUCTION_DIRECTORY).map(PathBuf::from)
    }
}

impl From<BTreeMap<String, String>> for SchematicProperties {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn properties(pairs: &[(&str, &str)]) -> Properties {
        Properties::new(
            pairs
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_nested_interpolation() {
        let properties = properties(&[("a", "x${b}y"), ("b", "${c}-${c}"), ("c", "1")]);
        assert_eq!(properties.get("a").unwrap(), "x1-1y");
        assert_eq!(properties.interpolated("${a}/${b}"), "x1-1y/1-1");
    }

    #[test]
    fn test_unresolved_reference_is_empty() {
        let properties = properties(&[("a", "prefix-${missing}-suffix")]);
        assert_eq!(properties.get("a").unwrap(), "prefix--suffix");
        assert_eq!(properties.interpolated("${missing}"), "");
    }

    #[test]
    fn test_self_reference_terminates() {
        let properties = properties(&[("a", "${b}"), ("b", "${a}!")]);
        assert_eq!(properties.get("a").unwrap(), "!");
    }

    #[test]
    fn test_text_without_references_is_untouched() {
        assert_eq!(Properties::default().interpolated("$ {plain} $"), "$ {plain} $");
    }

    #[test]
    fn test_interpolation_pattern_compiles() {
        let pattern = interpolation_pattern().unwrap();
        let keys: Vec<&str> = pattern
            .captures_iter("${a}-${b.c}-${}")
            .filter_map(|captures| captures.get(1))
            .map(|key| key.as_str())
            .collect();
        assert_eq!(keys, vec!["a", "b.c"]);
    }

    #[test]
    fn test_reserved_defaults() {
        let properties = Properties::default().with_reserved(
            &Id::new("g", "project"),
            "1.0.0",
            Path::new("/work/project"),
            Path::new("/work/.conveyor-cache/repository"),
        );
        assert_eq!(properties.get(SCHEMATIC_NAME).unwrap(), "project");
        assert_eq!(properties.get(SCHEMATIC_GROUP).unwrap(), "g");
        assert_eq!(properties.get(SCHEMATIC_VERSION).unwrap(), "1.0.0");
        assert_eq!(properties.discovery_directory().unwrap(), PathBuf::from("/work/project"));
        assert_eq!(
            properties.construction_directory().unwrap(),
            PathBuf::from("/work/project/.conveyor")
        );
        assert_eq!(
            properties.remote_repository_cache_directory().unwrap(),
            PathBuf::from("/work/.conveyor-cache/repository")
        );
    }

    #[test]
    fn test_user_declared_reserved_keys_win() {
        let properties = properties(&[
            (SCHEMATIC_NAME, "custom"),
            (DISCOVERY_DIRECTORY, "./temp/../sources"),
            (CONSTRUCTION_DIRECTORY, "${conveyor.discovery.directory}/../out"),
        ])
        .with_reserved(
            &Id::named("project"),
            "1.0.0",
            Path::new("/work/project"),
            Path::new("/cache"),
        );
        assert_eq!(properties.get(SCHEMATIC_NAME).unwrap(), "custom");
        assert_eq!(properties.discovery_directory().unwrap(), PathBuf::from("/work/project/sources"));
        assert_eq!(properties.construction_directory().unwrap(), PathBuf::from("/work/project/out"));
    }

    #[test]
    fn test_schematic_properties_drop_blank_values() {
        let view = properties(&[("kept", "${value}"), ("value", "1"), ("blank", "${missing}")])
            .schematic_properties();
        assert_eq!(view.get("kept"), Some("1"));
        assert_eq!(view.get("blank"), None);
    }
}
