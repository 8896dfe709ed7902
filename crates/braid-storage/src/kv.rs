//! Auxiliary key/value store.
//!
//! One directory per namespace (e.g. `slots/`, `agents/`), one file per key.
//! Values are opaque byte strings; the store does not interpret them.
//! Writes are single-writer by atomic rename.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Result, StoreError};

/// A small file-per-key store rooted at one directory.
pub struct KvStore {
    root: PathBuf,
}

impl KvStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn key_path(&self, namespace: &str, key: &str) -> Result<PathBuf> {
        for part in [namespace, key] {
            let charset_ok = part
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_');
            if part.is_empty() || part == "." || part == ".." || !charset_ok {
                return Err(StoreError::Usage(format!("invalid kv name: {part:?}")));
            }
        }
        Ok(self.root.join(namespace).join(key))
    }

    /// Reads the value for `key`, or `NotFound`.
    pub fn get(&self, namespace: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.key_path(namespace, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::not_found(format!("{namespace}/{key}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `value` under `key` atomically (temp file + rename).
    pub fn set(&self, namespace: &str, key: &str, value: &[u8]) -> Result<()> {
        let path = self.key_path(namespace, key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Removes `key`. Absent keys are a no-op.
    pub fn delete(&self, namespace: &str, key: &str) -> Result<()> {
        let path = self.key_path(namespace, key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Lists the keys in a namespace, sorted.
    pub fn list(&self, namespace: &str) -> Result<Vec<String>> {
        let dir = self.root.join(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("tmp") {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                keys.push(name.to_string());
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kv() -> (tempfile::TempDir, KvStore) {
        let dir = tempfile::tempdir().unwrap();
        let kv = KvStore::new(dir.path());
        (dir, kv)
    }

    #[test]
    fn set_get_roundtrip() {
        let (_dir, kv) = kv();
        kv.set("slots", "agent-1", b"bd-abc1").unwrap();
        assert_eq!(kv.get("slots", "agent-1").unwrap(), b"bd-abc1");
    }

    #[test]
    fn get_missing_is_not_found() {
        let (_dir, kv) = kv();
        assert!(kv.get("slots", "nope").unwrap_err().is_not_found());
    }

    #[test]
    fn set_overwrites() {
        let (_dir, kv) = kv();
        kv.set("agents", "a", b"idle").unwrap();
        kv.set("agents", "a", b"working").unwrap();
        assert_eq!(kv.get("agents", "a").unwrap(), b"working");
    }

    #[test]
    fn delete_is_idempotent() {
        let (_dir, kv) = kv();
        kv.set("agents", "a", b"idle").unwrap();
        kv.delete("agents", "a").unwrap();
        kv.delete("agents", "a").unwrap();
        assert!(kv.get("agents", "a").unwrap_err().is_not_found());
    }

    #[test]
    fn list_is_sorted_per_namespace() {
        let (_dir, kv) = kv();
        kv.set("slots", "b", b"2").unwrap();
        kv.set("slots", "a", b"1").unwrap();
        kv.set("agents", "z", b"3").unwrap();

        assert_eq!(kv.list("slots").unwrap(), vec!["a", "b"]);
        assert_eq!(kv.list("agents").unwrap(), vec!["z"]);
        assert!(kv.list("empty").unwrap().is_empty());
    }

    #[test]
    fn rejects_path_traversal_names() {
        let (_dir, kv) = kv();
        assert!(matches!(
            kv.set("slots", "../escape", b"x"),
            Err(StoreError::Usage(_))
        ));
        assert!(matches!(
            kv.set("a/b", "key", b"x"),
            Err(StoreError::Usage(_))
        ));
    }
}
