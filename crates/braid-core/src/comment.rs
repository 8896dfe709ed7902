//! Issue comments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A comment on an issue.
///
/// `id` is a per-issue monotonic integer starting at 1; the store assigns
/// `max(existing) + 1` when appending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub author: String,

    pub text: String,

    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// Creates a comment with an unassigned id; the store fills `id` (and
    /// `created_at` when it is the epoch sentinel) on append.
    pub fn new(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: 0,
            author: author.into(),
            text: text.into(),
            created_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}
