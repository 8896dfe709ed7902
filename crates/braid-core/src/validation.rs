//! Issue validation rules, applied before every write.

use crate::enums::{AwaitType, IssueType, Status};
use crate::issue::Issue;

/// Error type for validation failures.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("title is required")]
    TitleRequired,

    #[error("title must be 500 characters or less (got {0})")]
    TitleTooLong(usize),

    #[error("description is required")]
    DescriptionRequired,

    #[error("priority must be between 0 and 4 (got {0})")]
    InvalidPriority(i32),

    #[error("invalid status: {0}")]
    InvalidStatus(String),

    #[error("invalid issue type: {0}")]
    InvalidIssueType(String),

    #[error("labels must be non-empty strings")]
    EmptyLabel,

    #[error("malformed dependency target: {0:?}")]
    MalformedDependencyTarget(String),

    #[error("issue cannot depend on itself")]
    SelfDependency,

    #[error("comment ids must be strictly positive (got {0})")]
    NonPositiveCommentId(i64),

    #[error("duplicate comment id: {0}")]
    DuplicateCommentId(i64),

    #[error("gate fields are only valid on gate issues")]
    GateFieldsOnNonGate,

    #[error("gate issues must declare an await type")]
    GateWithoutAwaitType,

    #[error("closed issues must have a closed_at timestamp")]
    ClosedWithoutTimestamp,

    #[error("non-closed issues cannot have a closed_at timestamp")]
    NotClosedWithTimestamp,
}

/// Policy knobs for validation that come from configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationPolicy {
    /// Extra statuses accepted beyond the built-in set.
    pub custom_statuses: Vec<String>,
    /// Extra issue types accepted beyond the built-in set.
    pub custom_types: Vec<String>,
    /// Reject issues with an empty description.
    pub require_description: bool,
}

/// Returns `true` for ids the store will accept as dependency targets:
/// non-empty ASCII made of alphanumerics, `-`, `.`, and `_`.
pub fn is_well_formed_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'.' || b == b'_')
}

/// Validates an issue using built-in rules only.
pub fn validate(issue: &Issue) -> Result<(), ValidationError> {
    validate_with_policy(issue, &ValidationPolicy::default())
}

/// Validates an issue against the configured policy.
pub fn validate_with_policy(issue: &Issue, policy: &ValidationPolicy) -> Result<(), ValidationError> {
    // Title required, bounded.
    if issue.title.is_empty() {
        return Err(ValidationError::TitleRequired);
    }
    if issue.title.len() > 500 {
        return Err(ValidationError::TitleTooLong(issue.title.len()));
    }
    if policy.require_description && issue.description.is_empty() {
        return Err(ValidationError::DescriptionRequired);
    }
    // Priority 0-4.
    if !(0..=4).contains(&issue.priority) {
        return Err(ValidationError::InvalidPriority(issue.priority));
    }
    // Status and type membership: well-known tokens always pass; open
    // tokens must appear in the configured custom sets.
    if let Some(token) = issue.status.custom_token() {
        if !policy.custom_statuses.iter().any(|s| s == token) {
            return Err(ValidationError::InvalidStatus(token.to_owned()));
        }
    }
    if let Some(token) = issue.issue_type.custom_token() {
        if !policy.custom_types.iter().any(|t| t == token) {
            return Err(ValidationError::InvalidIssueType(token.to_owned()));
        }
    }
    // Labels must be non-empty strings.
    if issue.labels.iter().any(String::is_empty) {
        return Err(ValidationError::EmptyLabel);
    }
    // Dependency targets: well-formed ids, never self.
    for dep in &issue.dependencies {
        if !is_well_formed_id(&dep.target_id) {
            return Err(ValidationError::MalformedDependencyTarget(
                dep.target_id.clone(),
            ));
        }
        if dep.target_id == issue.id {
            return Err(ValidationError::SelfDependency);
        }
    }
    // Comment ids: unique, strictly positive.
    let mut seen = std::collections::HashSet::new();
    for comment in &issue.comments {
        if comment.id < 1 {
            return Err(ValidationError::NonPositiveCommentId(comment.id));
        }
        if !seen.insert(comment.id) {
            return Err(ValidationError::DuplicateCommentId(comment.id));
        }
    }
    // Gate fields present iff type = gate.
    if issue.issue_type == IssueType::Gate {
        if issue.await_type == AwaitType::None {
            return Err(ValidationError::GateWithoutAwaitType);
        }
    } else if issue.await_type != AwaitType::None
        || !issue.await_id.is_empty()
        || issue.timeout.is_some()
    {
        return Err(ValidationError::GateFieldsOnNonGate);
    }
    // closed_at iff status = closed.
    if issue.status == Status::Closed && issue.closed_at.is_none() {
        return Err(ValidationError::ClosedWithoutTimestamp);
    }
    if issue.status != Status::Closed && issue.closed_at.is_some() {
        return Err(ValidationError::NotClosedWithTimestamp);
    }

    Ok(())
}
