//! Artifact identity

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Identity of an artifact, manual or schematic: an optional dotted group plus a name
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id {
    #[serde(default)]
    pub group: String,
    pub name: String,
}

impl Id {
    pub fn new(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            name: name.into(),
        }
    }

    /// Id without a group
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(String::new(), name)
    }

    /// Directory of this id below a repository root: `group/as/dirs/name`
    pub fn path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.group.split('.').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        path.push(&self.name);
        path
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}:{}", self.group, self.name)
        }
    }
}
