//! Formula data model.
//!
//! A formula is a declarative template: variable declarations, a list of
//! steps with inter-step dependencies, and optional inheritance via
//! `extends`. Cooking a formula resolves inheritance, validates and
//! substitutes variables, and yields an in-memory molecule ready to pour.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Default step type.
fn default_step_type() -> String {
    "task".to_string()
}

/// Root structure for `.formula.json` / `.formula.toml` files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Formula {
    /// Unique identifier / name for this formula.
    pub formula: String,

    /// Human-readable description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Formula type: "workflow", "expansion", "aspect". Unset inherits
    /// from `extends` parents, falling back to "workflow".
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Schema version (currently 1).
    #[serde(default)]
    pub version: i32,

    /// Optional workflow phase tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Ordered list of formula names to inherit from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extends: Vec<String>,

    /// Template variables with optional defaults and validation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub vars: BTreeMap<String, VarDef>,

    /// Steps that become issues when the formula is poured.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<Step>,

    /// Reserved for future use; preserved on round-trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compose: Option<serde_json::Value>,

    /// Reserved for future use; preserved on round-trip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advice: Option<serde_json::Value>,

    /// Where this formula was loaded from (set by the parser).
    #[serde(skip)]
    pub source: String,
}

impl Formula {
    /// The effective formula type.
    pub fn effective_kind(&self) -> &str {
        self.kind.as_deref().unwrap_or("workflow")
    }
}

/// Variable definition with optional default and validation constraints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VarDef {
    /// What this variable is for.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Whether the caller must provide the variable.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,

    /// Default value (None = no default).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Allowed values; empty means unconstrained.
    #[serde(default, rename = "enum", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,

    /// Regex the value must match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
}

/// A work-item step that becomes an issue when poured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Unique identifier within this formula.
    pub id: String,

    /// Issue title (supports `{{variable}}` substitution).
    pub title: String,

    /// Issue description (supports substitution).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    /// Issue type: "task", "bug", "feature", "epic", "chore".
    #[serde(default = "default_step_type", rename = "type")]
    pub step_type: String,

    /// Step IDs this step depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

/// The root issue a cooked formula produces.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookedRoot {
    pub title: String,
    pub description: String,
    pub issue_type: String,
}

/// A fully-resolved step ready for issue creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookedStep {
    pub step_id: String,
    pub title: String,
    pub description: String,
    pub issue_type: String,
    pub depends_on: Vec<String>,
}

/// Output of cooking: the tree to pour.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CookedMolecule {
    pub root: CookedRoot,
    pub steps: Vec<CookedStep>,
    /// Origin file path of the resolved formula.
    pub source: String,
}

/// Errors that can occur during formula parsing, resolution, and cooking.
#[derive(Debug, thiserror::Error)]
pub enum FormulaError {
    #[error("parse error: {0}")]
    Parse(String),

    #[error("formula not found: {0}")]
    NotFound(String),

    #[error("missing required variable: {0}")]
    MissingVar(String),

    #[error("unknown variable: {0}")]
    UnknownVar(String),

    #[error("invalid value for variable {name}: {reason}")]
    InvalidVar { name: String, reason: String },

    #[error("step {step} depends on unknown step: {target}")]
    UnknownStep { step: String, target: String },

    #[error("cycle in formula extends chain at {0}")]
    FormulaCycle(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for formula operations.
pub type Result<T> = std::result::Result<T, FormulaError>;
