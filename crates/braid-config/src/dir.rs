//! Discovery of the `.beads/` directory.
//!
//! The `.beads/` directory is the root of a project's tracker metadata:
//! `config.yaml`, `routes.jsonl`, `formulas/`, and the issue data
//! directories. It is found by environment override or by walking up the
//! directory tree.

use crate::config::ConfigError;
use std::path::{Path, PathBuf};

/// The name of the tracker metadata directory.
const BEADS_DIR_NAME: &str = ".beads";

/// Environment variables that override the directory search, in priority
/// order.
const DIR_ENV_VARS: &[&str] = &["BEADS_DIR", "BD_DIR"];

/// Walk up the directory tree from `start` looking for a `.beads/`
/// directory.
///
/// The `BEADS_DIR` and `BD_DIR` environment variables are checked first
/// (in that order). Returns `None` when the filesystem root is reached
/// without finding one.
pub fn find_beads_dir(start: &Path) -> Option<PathBuf> {
    for var in DIR_ENV_VARS {
        if let Ok(env_dir) = std::env::var(var) {
            let env_path = PathBuf::from(&env_dir);
            if env_path.is_dir() {
                return Some(env_path);
            }
        }
    }

    let start = start.canonicalize().ok()?;
    let mut current = start.as_path();
    loop {
        let candidate = current.join(BEADS_DIR_NAME);
        if candidate.is_dir() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) if parent != current => current = parent,
            _ => break,
        }
    }

    None
}

/// Like [`find_beads_dir`], but converts `None` into
/// [`ConfigError::BeadsDirNotFound`].
pub fn find_beads_dir_or_error(start: &Path) -> Result<PathBuf, ConfigError> {
    find_beads_dir(start).ok_or(ConfigError::BeadsDirNotFound)
}

/// Ensure a `.beads/` directory exists at the given path, creating it (and
/// parents) when missing. If `path` is not itself named `.beads`, the
/// subdirectory is created under it.
pub fn ensure_beads_dir(path: &Path) -> Result<PathBuf, ConfigError> {
    let beads_dir = if path.ends_with(BEADS_DIR_NAME) {
        path.to_path_buf()
    } else {
        path.join(BEADS_DIR_NAME)
    };

    std::fs::create_dir_all(&beads_dir)?;
    Ok(beads_dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_beads_dir_in_temp() {
        let dir = tempfile::tempdir().unwrap();
        let beads = dir.path().join(".beads");
        std::fs::create_dir(&beads).unwrap();

        let found = find_beads_dir(dir.path()).unwrap();
        // Canonicalize both for comparison (handles /tmp symlinks).
        assert_eq!(
            found.canonicalize().unwrap(),
            beads.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_find_beads_dir_from_nested_child() {
        let dir = tempfile::tempdir().unwrap();
        let beads = dir.path().join(".beads");
        std::fs::create_dir(&beads).unwrap();

        let child = dir.path().join("src").join("deep");
        std::fs::create_dir_all(&child).unwrap();

        let found = find_beads_dir(&child).unwrap();
        assert_eq!(
            found.canonicalize().unwrap(),
            beads.canonicalize().unwrap()
        );
    }

    #[test]
    fn test_find_beads_dir_or_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".beads")).unwrap();
        assert!(find_beads_dir_or_error(dir.path()).is_ok());
    }

    #[test]
    fn test_ensure_beads_dir_creates() {
        let dir = tempfile::tempdir().unwrap();
        let result = ensure_beads_dir(dir.path()).unwrap();
        assert!(result.is_dir());
        assert!(result.ends_with(".beads"));
    }

    #[test]
    fn test_ensure_beads_dir_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let first = ensure_beads_dir(dir.path()).unwrap();
        let second = ensure_beads_dir(dir.path()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_ensure_beads_dir_already_named() {
        let dir = tempfile::tempdir().unwrap();
        let beads = dir.path().join(".beads");
        let result = ensure_beads_dir(&beads).unwrap();
        assert_eq!(result, beads);
    }
}
