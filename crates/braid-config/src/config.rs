//! Configuration types and loading.
//!
//! The main entry point is [`BraidConfig`], which represents the contents
//! of `.beads/config.yaml`. Configuration is loaded with [`load_config`]
//! and saved with [`save_config`]. All fields use `serde` defaults so a
//! partially-specified YAML file deserializes with sensible values.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors that can occur during configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// The configuration file contained invalid YAML.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// No `.beads/` directory was found.
    #[error("no .beads directory found")]
    BeadsDirNotFound,

    /// A route line could not be parsed.
    #[error("invalid route at {path}:{line}: {reason}")]
    InvalidRoute {
        /// The routes file.
        path: String,
        /// 1-based line number.
        line: usize,
        /// Parse failure description.
        reason: String,
    },
}

/// A specialized `Result` type for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Custom types configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TypesConfig {
    /// Comma-separated list of custom issue types.
    #[serde(default)]
    pub custom: String,
}

/// Custom statuses configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StatusConfig {
    /// Comma-separated list of custom statuses.
    #[serde(default)]
    pub custom: String,
}

/// Hierarchy configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HierarchyConfig {
    /// Maximum parent-hierarchy depth. Absent means unbounded.
    #[serde(default, rename = "max-depth")]
    pub max_depth: Option<u32>,
}

/// Create command configuration section.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CreateConfig {
    /// Whether a description is required when creating issues.
    #[serde(default, rename = "require-description")]
    pub require_description: bool,
}

/// Lock tuning configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocksConfig {
    /// Seconds a writer waits for a per-issue lock before giving up.
    #[serde(default = "default_acquire_timeout", rename = "acquire-timeout-secs")]
    pub acquire_timeout_secs: u64,

    /// Seconds after which an unheld lock file counts as stale.
    #[serde(default = "default_stale_after", rename = "stale-after-secs")]
    pub stale_after_secs: u64,
}

impl Default for LocksConfig {
    fn default() -> Self {
        Self {
            acquire_timeout_secs: default_acquire_timeout(),
            stale_after_secs: default_stale_after(),
        }
    }
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_stale_after() -> u64 {
    600
}

// ---------------------------------------------------------------------------
// Main config struct
// ---------------------------------------------------------------------------

/// The full braid configuration, corresponding to `.beads/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BraidConfig {
    /// Issue ID prefix without the hyphen (e.g. `"bd"`).
    #[serde(default = "default_prefix", rename = "issue-prefix")]
    pub prefix: String,

    /// Name of the issue data directory under `.beads/`.
    #[serde(default = "default_project")]
    pub project: String,

    /// Actor identity override. The literal `"${USER}"` is ignored by the
    /// resolution cascade.
    #[serde(default)]
    pub actor: Option<String>,

    /// Custom issue types.
    #[serde(default)]
    pub types: TypesConfig,

    /// Custom statuses.
    #[serde(default)]
    pub status: StatusConfig,

    /// Hierarchy configuration.
    #[serde(default)]
    pub hierarchy: HierarchyConfig,

    /// Create command configuration.
    #[serde(default)]
    pub create: CreateConfig,

    /// Lock tuning.
    #[serde(default)]
    pub locks: LocksConfig,
}

impl Default for BraidConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            project: default_project(),
            actor: None,
            types: TypesConfig::default(),
            status: StatusConfig::default(),
            hierarchy: HierarchyConfig::default(),
            create: CreateConfig::default(),
            locks: LocksConfig::default(),
        }
    }
}

fn default_prefix() -> String {
    "bd".to_string()
}

fn default_project() -> String {
    "issues".to_string()
}

impl BraidConfig {
    /// The id prefix including the trailing hyphen (e.g. `"bd-"`).
    pub fn id_prefix(&self) -> String {
        format!("{}-", self.prefix)
    }

    /// Custom types as a vector of trimmed, non-empty strings.
    pub fn custom_types(&self) -> Vec<String> {
        parse_comma_list(&self.types.custom)
    }

    /// Custom statuses as a vector of trimmed, non-empty strings.
    pub fn custom_statuses(&self) -> Vec<String> {
        parse_comma_list(&self.status.custom)
    }
}

/// Parse a comma-separated string into a vector of trimmed, non-empty strings.
fn parse_comma_list(s: &str) -> Vec<String> {
    if s.is_empty() {
        return Vec::new();
    }
    s.split(',')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load configuration from `config.yaml` inside the given `.beads/` directory.
///
/// A missing or empty file yields the default [`BraidConfig`].
pub fn load_config(beads_dir: &Path) -> Result<BraidConfig> {
    let config_path = beads_dir.join("config.yaml");

    if !config_path.exists() {
        return Ok(BraidConfig::default());
    }

    let content = std::fs::read_to_string(&config_path)?;
    if content.trim().is_empty() {
        return Ok(BraidConfig::default());
    }

    let config: BraidConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to `config.yaml` inside the given `.beads/` directory,
/// creating the directory if needed.
pub fn save_config(beads_dir: &Path, config: &BraidConfig) -> Result<()> {
    std::fs::create_dir_all(beads_dir)?;

    let config_path = beads_dir.join("config.yaml");
    let yaml = serde_yaml::to_string(config)?;
    std::fs::write(config_path, yaml)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
