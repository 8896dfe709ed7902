//! Filter types for issue queries.

use crate::enums::{IssueType, MolType, Status};
use crate::issue::Issue;

/// Filter for `list` queries.
///
/// The store selects the subtree(s) to scan from `status`, then applies the
/// remaining predicates in memory.
#[derive(Debug, Clone, Default)]
pub struct IssueFilter {
    pub status: Option<Status>,
    pub issue_type: Option<IssueType>,
    pub priority: Option<i32>,

    /// AND semantics: issue must carry ALL of these labels.
    pub labels: Vec<String>,

    pub assignee: Option<String>,
    pub parent: Option<String>,
    pub mol_type: Option<MolType>,
    pub ephemeral: Option<bool>,

    /// Maximum results; `0` means unbounded.
    pub limit: usize,
}

impl IssueFilter {
    /// Whether the `open/` subtree needs scanning for this filter.
    pub fn scans_open(&self) -> bool {
        !matches!(self.status, Some(Status::Closed))
    }

    /// Whether the `closed/` subtree needs scanning for this filter.
    pub fn scans_closed(&self) -> bool {
        matches!(self.status, None | Some(Status::Closed))
    }

    /// Applies the in-memory predicates (everything except subtree choice
    /// and limit).
    pub fn matches(&self, issue: &Issue) -> bool {
        if let Some(ref status) = self.status {
            if issue.status != *status {
                return false;
            }
        }
        if let Some(ref issue_type) = self.issue_type {
            if issue.issue_type != *issue_type {
                return false;
            }
        }
        if let Some(priority) = self.priority {
            if issue.priority != priority {
                return false;
            }
        }
        if !self.labels.iter().all(|l| issue.labels.contains(l)) {
            return false;
        }
        if let Some(ref assignee) = self.assignee {
            if issue.assignee != *assignee {
                return false;
            }
        }
        if let Some(ref parent) = self.parent {
            if issue.parent.as_deref() != Some(parent.as_str()) {
                return false;
            }
        }
        if let Some(ref mol_type) = self.mol_type {
            if issue.mol_type != *mol_type {
                return false;
            }
        }
        if let Some(ephemeral) = self.ephemeral {
            if issue.ephemeral != ephemeral {
                return false;
            }
        }
        true
    }
}
