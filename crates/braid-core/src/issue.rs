//! Issue struct -- the unit of persistence.
//!
//! Each issue serialises to a single self-contained JSON document stored
//! under `open/` or `closed/` depending on its status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::comment::Comment;
use crate::dependency::Dependency;
use crate::enums::{AwaitType, IssueType, MolType, Status};

/// On-disk document shape version. Bumped when the serialised form changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Helper for `skip_serializing_if` on `bool` fields.
fn is_false(b: &bool) -> bool {
    !b
}

/// Helper for `skip_serializing_if` on `Vec` fields.
fn is_empty_vec<T>(v: &Vec<T>) -> bool {
    v.is_empty()
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

/// Represents a trackable work item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    // ===== Identification =====
    #[serde(default)]
    pub id: String,

    // ===== Content =====
    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,

    // ===== Status & Workflow =====
    #[serde(default)]
    pub status: Status,

    /// Priority 0-4 (P0 critical .. P4 backlog). Never skipped: 0 is valid.
    #[serde(default)]
    pub priority: i32,

    #[serde(rename = "type", default)]
    pub issue_type: IssueType,

    #[serde(default, skip_serializing_if = "MolType::is_default")]
    pub mol_type: MolType,

    // ===== Assignment =====
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub assignee: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub owner: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    // ===== Relational data =====
    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub labels: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub dependencies: Vec<Dependency>,

    #[serde(default, skip_serializing_if = "is_empty_vec")]
    pub comments: Vec<Comment>,

    // ===== Timestamps =====
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub close_reason: String,

    // ===== Gate fields (async coordination) =====
    #[serde(default, skip_serializing_if = "AwaitType::is_default")]
    pub await_type: AwaitType,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub await_id: String,

    /// Timer duration, serialised as integer nanoseconds (`timeout_ns`).
    #[serde(
        default,
        rename = "timeout_ns",
        skip_serializing_if = "Option::is_none",
        with = "duration_serde"
    )]
    pub timeout: Option<std::time::Duration>,

    // ===== Behavioural flags =====
    /// Excluded from durable views and eligible for garbage collection.
    #[serde(default, skip_serializing_if = "is_false")]
    pub ephemeral: bool,

    // ===== Versioning =====
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
}

/// Serde helper module for `Option<std::time::Duration>` stored as nanoseconds.
mod duration_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        dur: &Option<std::time::Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match dur {
            Some(d) => serializer.serialize_u64(d.as_nanos() as u64),
            None => serializer.serialize_u64(0),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<std::time::Duration>, D::Error> {
        let ns = u64::deserialize(deserializer)?;
        if ns == 0 {
            Ok(None)
        } else {
            Ok(Some(std::time::Duration::from_nanos(ns)))
        }
    }
}

impl Default for Issue {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            status: Status::Open,
            priority: 2,
            issue_type: IssueType::Task,
            mol_type: MolType::None,
            assignee: String::new(),
            owner: String::new(),
            created_by: String::new(),
            labels: Vec::new(),
            parent: None,
            dependencies: Vec::new(),
            comments: Vec::new(),
            created_at: now,
            updated_at: now,
            closed_at: None,
            close_reason: String::new(),
            await_type: AwaitType::None,
            await_id: String::new(),
            timeout: None,
            ephemeral: false,
            schema_version: SCHEMA_VERSION,
        }
    }
}

impl Issue {
    /// Returns `true` if this issue is a tombstone (soft-deleted id).
    pub fn is_tombstone(&self) -> bool {
        self.status == Status::Tombstone
    }

    /// Forward `blocks` dependency targets.
    pub fn blocking_targets(&self) -> impl Iterator<Item = &str> {
        self.dependencies
            .iter()
            .filter(|d| d.dep_type.affects_readiness())
            .map(|d| d.target_id.as_str())
    }

    /// Adds `label` if not already present, preserving dedup semantics.
    pub fn add_label(&mut self, label: impl Into<String>) {
        let label = label.into();
        if !self.labels.contains(&label) {
            self.labels.push(label);
        }
    }

    /// Next comment id: `max(existing) + 1`, starting at 1.
    pub fn next_comment_id(&self) -> i64 {
        self.comments.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }
}

/// Builder for constructing an [`Issue`] with a fluent API.
pub struct IssueBuilder {
    issue: Issue,
}

impl IssueBuilder {
    /// Creates a new builder with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        let mut issue = Issue::default();
        issue.title = title.into();
        Self { issue }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.issue.id = id.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.issue.description = description.into();
        self
    }

    pub fn status(mut self, status: Status) -> Self {
        self.issue.status = status;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.issue.priority = priority;
        self
    }

    pub fn issue_type(mut self, issue_type: IssueType) -> Self {
        self.issue.issue_type = issue_type;
        self
    }

    pub fn mol_type(mut self, mol_type: MolType) -> Self {
        self.issue.mol_type = mol_type;
        self
    }

    pub fn assignee(mut self, assignee: impl Into<String>) -> Self {
        self.issue.assignee = assignee.into();
        self
    }

    pub fn owner(mut self, owner: impl Into<String>) -> Self {
        self.issue.owner = owner.into();
        self
    }

    pub fn created_by(mut self, by: impl Into<String>) -> Self {
        self.issue.created_by = by.into();
        self
    }

    pub fn created_at(mut self, t: DateTime<Utc>) -> Self {
        self.issue.created_at = t;
        self.issue.updated_at = t;
        self
    }

    pub fn labels(mut self, labels: Vec<String>) -> Self {
        self.issue.labels = labels;
        self
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.issue.parent = Some(parent.into());
        self
    }

    pub fn await_type(mut self, t: AwaitType) -> Self {
        self.issue.await_type = t;
        self
    }

    pub fn await_id(mut self, id: impl Into<String>) -> Self {
        self.issue.await_id = id.into();
        self
    }

    pub fn timeout(mut self, d: std::time::Duration) -> Self {
        self.issue.timeout = Some(d);
        self
    }

    pub fn ephemeral(mut self, ephemeral: bool) -> Self {
        self.issue.ephemeral = ephemeral;
        self
    }

    /// Consumes the builder and returns the constructed [`Issue`].
    pub fn build(self) -> Issue {
        self.issue
    }
}
