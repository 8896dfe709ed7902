//! Route table for cross-project issue lookup.
//!
//! `.beads/routes.jsonl` holds one JSON object per line mapping an id
//! prefix to the data directory of the project that owns it. The service
//! layer consults the table per inbound id; unmatched prefixes fall
//! through to the local store.

use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::config::{ConfigError, Result};

/// A route entry from `routes.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RouteEntry {
    /// The prefix to match, including the hyphen (e.g. `"fe-"`).
    pub prefix: String,
    /// Data directory of the owning project (absolute, or relative to the
    /// `.beads/` directory holding the routes file).
    pub data_dir: String,
}

/// Extract the prefix from an issue ID: the substring up to and including
/// the first hyphen. `None` when the id has no hyphen.
pub fn extract_prefix(issue_id: &str) -> Option<String> {
    let hyphen_idx = issue_id.find('-')?;
    Some(issue_id[..=hyphen_idx].to_string())
}

/// Load route entries from a `routes.jsonl` file.
///
/// Returns an empty vector when the file does not exist. Blank lines are
/// skipped; a malformed line is an error.
pub fn load_routes(routes_path: &Path) -> Result<Vec<RouteEntry>> {
    if !routes_path.is_file() {
        return Ok(Vec::new());
    }

    let file = File::open(routes_path)?;
    let reader = BufReader::new(file);
    let mut routes = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        let entry: RouteEntry =
            serde_json::from_str(&line).map_err(|e| ConfigError::InvalidRoute {
                path: routes_path.display().to_string(),
                line: line_num + 1,
                reason: e.to_string(),
            })?;
        routes.push(entry);
    }

    Ok(routes)
}

/// Find a route entry matching the given prefix.
pub fn find_route<'a>(routes: &'a [RouteEntry], prefix: &str) -> Option<&'a RouteEntry> {
    routes.iter().find(|r| r.prefix == prefix)
}

/// Resolve a route's data directory against the `.beads/` directory that
/// holds the routes file.
pub fn resolve_data_dir(entry: &RouteEntry, beads_dir: &Path) -> PathBuf {
    let path = PathBuf::from(&entry.data_dir);
    if path.is_absolute() {
        path
    } else {
        beads_dir.join(path)
    }
}
