//! Parse formula files (TOML and JSON) and resolve names along a search
//! path.
//!
//! Formulas live in directories searched in decreasing priority (project
//! `.beads/formulas/`, user `~/.beads/formulas/`, orchestrator-supplied
//! extras); a higher-priority file shadows a lower one with the same name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::types::{Formula, FormulaError, Result};

/// Recognised formula file suffixes, in probe order.
const SUFFIXES: &[&str] = &[".formula.json", ".formula.toml"];

/// Parse a formula from a TOML string.
pub fn parse_toml(content: &str) -> Result<Formula> {
    toml::from_str(content).map_err(|e| FormulaError::Parse(e.to_string()))
}

/// Parse a formula from a JSON string.
pub fn parse_json(content: &str) -> Result<Formula> {
    serde_json::from_str(content).map_err(|e| FormulaError::Parse(e.to_string()))
}

/// Serialise a formula as JSON.
pub fn to_json(formula: &Formula) -> Result<String> {
    serde_json::to_string_pretty(formula).map_err(|e| FormulaError::Parse(e.to_string()))
}

/// Serialise a formula as TOML.
pub fn to_toml(formula: &Formula) -> Result<String> {
    toml::to_string_pretty(formula).map_err(|e| FormulaError::Parse(e.to_string()))
}

/// Load a formula from a file path, detecting TOML vs JSON by extension.
pub fn load_formula(path: &Path) -> Result<Formula> {
    let content = std::fs::read_to_string(path)?;
    let mut formula = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => parse_toml(&content)?,
        Some("json") => parse_json(&content)?,
        _ => parse_json(&content).or_else(|_| parse_toml(&content))?,
    };
    formula.source = path.display().to_string();
    Ok(formula)
}

/// Find the highest-priority file for `name` along the search path.
pub fn find_formula(name: &str, search_path: &[PathBuf]) -> Result<PathBuf> {
    for dir in search_path {
        if !dir.is_dir() {
            continue;
        }
        for suffix in SUFFIXES {
            let candidate = dir.join(format!("{name}{suffix}"));
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(FormulaError::NotFound(name.to_string()))
}

/// All formulas visible along the search path, name -> winning file.
/// Higher-priority directories shadow lower ones by name.
pub fn list_formulas(search_path: &[PathBuf]) -> Result<BTreeMap<String, PathBuf>> {
    let mut visible: BTreeMap<String, PathBuf> = BTreeMap::new();
    for dir in search_path {
        if !dir.is_dir() {
            continue;
        }
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = SUFFIXES
                .iter()
                .find_map(|suffix| file_name.strip_suffix(suffix))
            else {
                continue;
            };
            visible.entry(name.to_string()).or_insert(path);
        }
    }
    Ok(visible)
}
