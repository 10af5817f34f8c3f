//! Semantic versions of schematics, manuals and artifacts

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use semver::Version;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{ConveyorError, Result};

/// A `major.minor.patch[-prerelease][+build]` version.
///
/// Ordering follows semver precedence: numeric core first, then a release
/// sorts above any of its pre-releases, then pre-release identifiers are
/// compared pairwise. Build metadata never affects precedence; it only breaks
/// ties so that `Ord` stays consistent with `Eq`, which compares the
/// normalized text.
#[derive(Debug, Clone)]
pub struct SemanticVersion {
    raw: String,
    version: Version,
}

impl SemanticVersion {
    /// Parse a version string; malformed input is a hard error
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let version = Version::parse(trimmed).map_err(|source| ConveyorError::InvalidVersion {
            value: raw.to_string(),
            source,
        })?;
        Ok(Self {
            raw: version.to_string(),
            version,
        })
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn minor(&self) -> u64 {
        self.version.minor
    }

    pub fn patch(&self) -> u64 {
        self.version.patch
    }

    /// Whether this version carries pre-release identifiers
    pub fn is_pre_release(&self) -> bool {
        !self.version.pre.is_empty()
    }

    /// Get the normalized version string
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Compare by semver precedence only, ignoring build metadata
    pub fn cmp_precedence(&self, other: &Self) -> Ordering {
        (self.version.major, self.version.minor, self.version.patch)
            .cmp(&(other.version.major, other.version.minor, other.version.patch))
            .then_with(|| self.version.pre.cmp(&other.version.pre))
    }
}

impl fmt::Display for SemanticVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

impl FromStr for SemanticVersion {
    type Err = ConveyorError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl PartialEq for SemanticVersion {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for SemanticVersion {}

impl Hash for SemanticVersion {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_precedence(other)
            .then_with(|| self.version.build.as_str().cmp(other.version.build.as_str()))
    }
}

impl Serialize for SemanticVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(raw: &str) -> SemanticVersion {
        SemanticVersion::parse(raw).unwrap()
    }

    #[test]
    fn test_core_ordering() {
        assert!(v("1.0.0") < v("2.0.0"));
        assert!(v("2.0.0") < v("2.1.0"));
        assert!(v("2.1.0") < v("2.1.1"));
        assert!(v("1.10.0") > v("1.9.0"));
    }

    #[test]
    fn test_pre_release_precedence_table() {
        let ordered = [
            "1.0.0-alpha",
            "1.0.0-alpha.1",
            "1.0.0-alpha.beta",
            "1.0.0-beta",
            "1.0.0-beta.2",
            "1.0.0-beta.11",
            "1.0.0-rc.1",
            "1.0.0",
        ];
        for pair in ordered.windows(2) {
            assert!(v(pair[0]) < v(pair[1]), "{} < {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_build_metadata_ignored_for_precedence() {
        assert_eq!(v("1.0.0+build.5").cmp_precedence(&v("1.0.0")), Ordering::Equal);
        assert!(v("1.0.0-rc.1+build") < v("1.0.0"));
        assert_ne!(v("1.0.0+a"), v("1.0.0+b"));
    }

    #[test]
    fn test_malformed_versions_are_rejected() {
        for raw in ["1", "1.0", "a.b.c", "1.0.x", ""] {
            assert!(
                matches!(SemanticVersion::parse(raw), Err(ConveyorError::InvalidVersion { .. })),
                "{raw} should not parse"
            );
        }
    }

    #[test]
    fn test_equality_on_normalized_form() {
        assert_eq!(v(" 1.2.3 "), v("1.2.3"));
        assert_eq!(v("1.2.3").to_string(), "1.2.3");
    }
}
