//! Artifact repositories
//!
//! Every repository stores artifacts under the same layout:
//! `<group as directories>/<name>/<version>/<name>-<version>.<extension>`, where the
//! extension is `json` for definitions and `module` for modules.

use std::fmt;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{ConveyorError, Result};
use crate::id::Id;
use crate::version::SemanticVersion;

/// Kind of file stored for an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classifier {
    SchematicDefinition,
    Module,
}

impl Classifier {
    pub fn extension(self) -> &'static str {
        match self {
            Classifier::SchematicDefinition => "json",
            Classifier::Module => "module",
        }
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classifier::SchematicDefinition => write!(f, "SCHEMATIC_DEFINITION"),
            Classifier::Module => write!(f, "MODULE"),
        }
    }
}

/// Relative location of an artifact file inside any repository
fn relative_path(id: &Id, version: &SemanticVersion, classifier: Classifier) -> PathBuf {
    id.path(Path::new(""))
        .join(version.as_str())
        .join(format!("{}-{}.{}", id.name, version, classifier.extension()))
}

/// Lookup contract for artifact storage
pub trait Repository: fmt::Debug {
    fn name(&self) -> &str;

    /// Location of the artifact file, if this repository has it
    fn locate(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> Option<PathBuf>;
}

/// Repository backed by a local directory
#[derive(Debug, Clone)]
pub struct LocalDirectoryRepository {
    name: String,
    root: PathBuf,
    enabled: bool,
}

impl LocalDirectoryRepository {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> PathBuf {
        self.root.join(relative_path(id, version, classifier))
    }

    /// Store bytes at the artifact's location, creating directories as needed
    pub fn store(
        &self,
        id: &Id,
        version: &SemanticVersion,
        classifier: Classifier,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let path = self.path(id, version, classifier);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(path)
    }
}

impl Repository for LocalDirectoryRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        let path = self.path(id, version, classifier);
        path.is_file().then_some(path)
    }
}

/// Repository reached over HTTP, caching downloads in a local directory
#[derive(Debug)]
pub struct RemoteRepository {
    name: String,
    url: String,
    cache: LocalDirectoryRepository,
    enabled: bool,
    agent: ureq::Agent,
}

impl RemoteRepository {
    const TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(name: impl Into<String>, url: impl Into<String>, cache: impl Into<PathBuf>) -> Self {
        let name = name.into();
        Self {
            cache: LocalDirectoryRepository::new(name.clone(), cache),
            name,
            url: url.into(),
            enabled: true,
            agent: ureq::AgentBuilder::new().timeout(Self::TIMEOUT).build(),
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    fn url(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> String {
        let relative = relative_path(id, version, classifier)
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{}", self.url.trim_end_matches('/'), relative)
    }

    fn download(&self, url: &str) -> std::result::Result<Vec<u8>, String> {
        let response = self.agent.get(url).call().map_err(|e| e.to_string())?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut bytes)
            .map_err(|e| e.to_string())?;
        Ok(bytes)
    }
}

impl Repository for RemoteRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn locate(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> Option<PathBuf> {
        if !self.enabled {
            return None;
        }
        if let Some(cached) = self.cache.locate(id, version, classifier) {
            return Some(cached);
        }
        let url = self.url(id, version, classifier);
        info!(repository = %self.name, %url, "downloading");
        let bytes = match self.download(&url) {
            Ok(bytes) => bytes,
            Err(error) => {
                warn!(repository = %self.name, %url, %error, "download failed");
                return None;
            }
        };
        match self.cache.store(id, version, classifier, &bytes) {
            Ok(path) => Some(path),
            Err(error) => {
                warn!(repository = %self.name, %url, %error, "could not cache download");
                None
            }
        }
    }
}

/// Repository declaration after merging through a hierarchy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RepositoryModel {
    /// Local directory, already resolved against the declaring definition
    Local {
        name: String,
        path: PathBuf,
        enabled: bool,
    },
    Remote {
        name: String,
        url: String,
        enabled: bool,
    },
}

impl RepositoryModel {
    pub fn name(&self) -> &str {
        match self {
            RepositoryModel::Local { name, .. } | RepositoryModel::Remote { name, .. } => name,
        }
    }
}

/// Directory next to the root schematic holding remote downloads
pub const CACHE_DIRECTORY: &str = ".conveyor-cache";

/// Remote cache of a schematic whose template chain starts at `root_path`,
/// unless configured or declared otherwise
pub fn default_remote_cache(root_path: &Path) -> PathBuf {
    root_path
        .parent()
        .unwrap_or(Path::new(""))
        .join(CACHE_DIRECTORY)
        .join("repository")
}

/// Settings shared by every repository set built during one construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    /// Where remote downloads are cached
    pub remote_cache: PathBuf,
    /// Skip remote repositories entirely
    pub offline: bool,
}

/// Repositories queried in declared order, first hit wins
#[derive(Debug, Default)]
pub struct Repositories {
    repositories: Vec<Box<dyn Repository>>,
}

impl Repositories {
    pub fn new(repositories: Vec<Box<dyn Repository>>) -> Self {
        Self { repositories }
    }

    pub fn from_models(models: &[RepositoryModel], settings: &RepositorySettings) -> Self {
        let repositories = models
            .iter()
            .map(|model| -> Box<dyn Repository> {
                match model {
                    RepositoryModel::Local { name, path, enabled } => {
                        Box::new(LocalDirectoryRepository::new(name.clone(), path.clone()).enabled(*enabled))
                    }
                    RepositoryModel::Remote { name, url, enabled } => Box::new(
                        RemoteRepository::new(name.clone(), url.clone(), settings.remote_cache.clone())
                            .enabled(*enabled && !settings.offline),
                    ),
                }
            })
            .collect();
        Self { repositories }
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }

    pub fn locate(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> Option<PathBuf> {
        let found = self.repositories.iter().find_map(|repository| {
            repository
                .locate(id, version, classifier)
                .map(|path| (repository.name(), path))
        });
        match found {
            Some((repository, path)) => {
                debug!(%id, %version, %classifier, repository, "located");
                Some(path)
            }
            None => {
                debug!(%id, %version, %classifier, "not found in any repository");
                None
            }
        }
    }

    /// Like [`Repositories::locate`], but absence is an error
    pub fn require(&self, id: &Id, version: &SemanticVersion, classifier: Classifier) -> Result<PathBuf> {
        self.locate(id, version, classifier)
            .ok_or_else(|| ConveyorError::ArtifactNotFound {
                id: id.clone(),
                version: version.to_string(),
            })
    }
}
