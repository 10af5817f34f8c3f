//! Lexical path helpers

use std::path::{Component, Path, PathBuf};

/// Resolve `..` and `.` components without touching the filesystem
pub fn normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match normalized.components().next_back() {
                Some(Component::Normal(_)) => {
                    normalized.pop();
                }
                // `/..` stays `/`
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => normalized.push(".."),
            },
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Resolve `value` against `base` unless it is already absolute
pub fn resolve(base: &Path, value: impl AsRef<Path>) -> PathBuf {
    normalize(&base.join(value))
}

/// Make a path absolute against the current working directory
pub fn absolute(path: &Path) -> std::io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}
