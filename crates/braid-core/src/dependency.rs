//! Dependency edges between issues.

use serde::{Deserialize, Serialize};

use crate::enums::DependencyType;

/// A forward dependency edge stored on the depending issue.
///
/// Only the forward direction is persisted; dependents are derived by
/// scanning, which keeps symmetric-edge maintenance out of the write path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    /// The issue this edge points at.
    pub target_id: String,

    /// Edge kind (serialised as "type" in JSON).
    #[serde(rename = "type")]
    pub dep_type: DependencyType,
}

impl Dependency {
    pub fn new(target_id: impl Into<String>, dep_type: DependencyType) -> Self {
        Self {
            target_id: target_id.into(),
            dep_type,
        }
    }

    /// A `blocks` edge to `target_id`.
    pub fn blocks(target_id: impl Into<String>) -> Self {
        Self::new(target_id, DependencyType::Blocks)
    }
}
