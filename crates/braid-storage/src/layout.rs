//! On-disk layout of an issue data directory.
//!
//! ```text
//! data_dir/
//!   open/<shard>/<id>.json
//!   closed/<shard>/<id>.json
//!   locks/<id>.lock
//!   quarantine/          (doctor drops undecodable files here)
//! ```
//!
//! The shard is the first two characters of the id after the configured
//! prefix, padded with `_` when the remainder is shorter. Child ids share
//! their root's shard because the dot suffix comes after those characters.

use std::path::{Path, PathBuf};

/// Subtree of non-closed issues.
pub const OPEN_DIR: &str = "open";
/// Subtree of closed issues.
pub const CLOSED_DIR: &str = "closed";
/// Advisory lock files, one per id.
pub const LOCKS_DIR: &str = "locks";
/// Destination for undecodable documents moved aside by the doctor.
pub const QUARANTINE_DIR: &str = "quarantine";

/// Computes the shard directory name for an id.
pub fn shard(prefix: &str, id: &str) -> String {
    let rest = if !prefix.is_empty() && id.starts_with(prefix) {
        &id[prefix.len()..]
    } else if let Some(pos) = id.find('-') {
        &id[pos + 1..]
    } else {
        id
    };

    let mut chars: Vec<char> = rest.chars().take(2).collect();
    while chars.len() < 2 {
        chars.push('_');
    }
    chars.into_iter().collect()
}

/// Path of an issue document inside the given subtree.
pub fn issue_path(data_dir: &Path, subtree: &str, prefix: &str, id: &str) -> PathBuf {
    data_dir
        .join(subtree)
        .join(shard(prefix, id))
        .join(format!("{id}.json"))
}

/// Path of the advisory lock file for an id.
pub fn lock_path(data_dir: &Path, id: &str) -> PathBuf {
    data_dir.join(LOCKS_DIR).join(format!("{id}.lock"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_strips_prefix() {
        assert_eq!(shard("bd-", "bd-abc1"), "ab");
        assert_eq!(shard("bd-", "bd-xyz"), "xy");
    }

    #[test]
    fn shard_of_child_matches_root() {
        assert_eq!(shard("bd-", "bd-abc1.2"), shard("bd-", "bd-abc1"));
    }

    #[test]
    fn shard_pads_short_remainders() {
        assert_eq!(shard("bd-", "bd-a"), "a_");
        assert_eq!(shard("bd-", "bd-"), "__");
    }

    #[test]
    fn shard_of_foreign_prefix_uses_first_hyphen() {
        assert_eq!(shard("bd-", "fe-q7k2"), "q7");
    }

    #[test]
    fn issue_path_shape() {
        let p = issue_path(Path::new("/data"), OPEN_DIR, "bd-", "bd-abc1");
        assert_eq!(p, Path::new("/data/open/ab/bd-abc1.json"));
    }

    #[test]
    fn lock_path_shape() {
        let p = lock_path(Path::new("/data"), "bd-abc1");
        assert_eq!(p, Path::new("/data/locks/bd-abc1.lock"));
    }
}
