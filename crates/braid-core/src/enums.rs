//! Enum types for the braid issue model.
//!
//! Every enum in the issue document is stored on the wire as a plain
//! string with an open tail: well-known values get a unit variant, any
//! other string lands in the open variant carrying the original text.
//! Serde rides `From<String>` / `Into<String>`, so the document shape is
//! just the token. Whether an open value is acceptable is a policy
//! question answered in `validation`, not here.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Defines a string-token enum with an open catch-all variant.
///
/// `default` names the variant `Default::default()` resolves to; `open`
/// names the catch-all. A token may be the empty string, which is how the
/// "unset" enums model absence.
macro_rules! token_enum {
    (
        $(#[$meta:meta])*
        $name:ident { default = $default:ident, open = $open:ident },
        tokens: { $( $variant:ident => $token:literal ),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $( $variant, )+
            /// Catch-all for strings outside the well-known set.
            $open(String),
        }

        impl $name {
            /// The on-disk token.
            pub fn as_str(&self) -> &str {
                match self {
                    $( Self::$variant => $token, )+
                    Self::$open(s) => s,
                }
            }

            /// Returns `true` if this is the default variant.
            pub fn is_default(&self) -> bool {
                matches!(self, Self::$default)
            }

            /// The payload of the open variant; `None` for well-known
            /// values. Validation decides whether a payload is allowed.
            pub fn custom_token(&self) -> Option<&str> {
                match self {
                    Self::$open(s) => Some(s),
                    _ => None,
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::$default
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        // The single parse path. Well-known tokens are matched without
        // allocating; everything else keeps the caller's string.
        impl From<String> for $name {
            fn from(s: String) -> Self {
                match s.as_str() {
                    $( $token => Self::$variant, )+
                    _ => Self::$open(s),
                }
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::from(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $( $name::$variant => $token.to_owned(), )+
                    $name::$open(s) => s,
                }
            }
        }
    };
}

// ===========================================================================
// Status
// ===========================================================================

token_enum! {
    /// Current state of an issue.
    ///
    /// `Tombstone` marks a soft-deleted id that is retained so the id is
    /// never reused.
    Status { default = Open, open = Custom },
    tokens: {
        Open => "open",
        InProgress => "in_progress",
        Blocked => "blocked",
        Deferred => "deferred",
        Hooked => "hooked",
        Closed => "closed",
        Tombstone => "tombstone",
    }
}

impl Status {
    /// Returns `true` if issues with this status live under `closed/`.
    ///
    /// Everything that is not `closed` lives under `open/`, including
    /// tombstones.
    pub fn is_closed(&self) -> bool {
        *self == Self::Closed
    }
}

// ===========================================================================
// IssueType
// ===========================================================================

token_enum! {
    /// Categorises the kind of work.
    IssueType { default = Task, open = Custom },
    tokens: {
        Task => "task",
        Bug => "bug",
        Feature => "feature",
        Epic => "epic",
        Chore => "chore",
        Gate => "gate",
        Molecule => "molecule",
    }
}

// ===========================================================================
// DependencyType
// ===========================================================================

token_enum! {
    /// Relationship type between issues. Only the forward edge is
    /// persisted; the reverse view is derived on read.
    DependencyType { default = Blocks, open = Custom },
    tokens: {
        Blocks => "blocks",
        ParentChild => "parent-child",
        RelatesTo => "relates-to",
        Tracks => "tracks",
        DiscoveredFrom => "discovered-from",
    }
}

impl DependencyType {
    /// Returns `true` if this edge kind gates readiness.
    ///
    /// Only `blocks` edges do; closing the target of any other edge kind
    /// never changes readiness.
    pub fn affects_readiness(&self) -> bool {
        matches!(self, Self::Blocks)
    }
}

// ===========================================================================
// MolType
// ===========================================================================

token_enum! {
    /// Molecule type for coordination trees. `None` (the empty token) is
    /// the unset state.
    MolType { default = None, open = Custom },
    tokens: {
        None => "",
        Swarm => "swarm",
        Patrol => "patrol",
        Work => "work",
    }
}

// ===========================================================================
// AwaitType
// ===========================================================================

token_enum! {
    /// What an open gate issue is waiting for. `None` (the empty token)
    /// means the issue is not a gate.
    AwaitType { default = None, open = Custom },
    tokens: {
        None => "",
        Human => "human",
        Timer => "timer",
        Bead => "bead",
        GhRun => "gh:run",
        GhPr => "gh:pr",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_default_is_open() {
        assert_eq!(Status::default(), Status::Open);
        assert!(Status::Open.is_default());
        assert!(!Status::Closed.is_default());
    }

    #[test]
    fn status_roundtrip_serde() {
        let s = Status::InProgress;
        let json = serde_json::to_string(&s).unwrap();
        assert_eq!(json, r#""in_progress""#);
        let back: Status = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }

    #[test]
    fn status_tombstone_is_not_closed() {
        assert!(Status::Closed.is_closed());
        assert!(!Status::Tombstone.is_closed());
        assert!(!Status::Open.is_closed());
    }

    #[test]
    fn unknown_token_keeps_its_text() {
        let json = r#""triaged""#;
        let s: Status = serde_json::from_str(json).unwrap();
        assert_eq!(s, Status::Custom("triaged".into()));
        assert_eq!(s.custom_token(), Some("triaged"));
        assert_eq!(serde_json::to_string(&s).unwrap(), json);
    }

    #[test]
    fn well_known_tokens_have_no_custom_payload() {
        assert_eq!(Status::Open.custom_token(), None);
        assert_eq!(IssueType::Gate.custom_token(), None);
        assert_eq!(MolType::None.custom_token(), None);
    }

    #[test]
    fn dependency_type_as_str() {
        assert_eq!(DependencyType::ParentChild.as_str(), "parent-child");
        assert_eq!(DependencyType::DiscoveredFrom.as_str(), "discovered-from");
    }

    #[test]
    fn only_blocks_affects_readiness() {
        assert!(DependencyType::Blocks.affects_readiness());
        assert!(!DependencyType::ParentChild.affects_readiness());
        assert!(!DependencyType::RelatesTo.affects_readiness());
        assert!(!DependencyType::Tracks.affects_readiness());
    }

    #[test]
    fn mol_type_empty_token_is_none() {
        let m: MolType = serde_json::from_str(r#""""#).unwrap();
        assert_eq!(m, MolType::None);
        assert!(m.is_default());
        assert_eq!(serde_json::to_string(&m).unwrap(), r#""""#);
    }

    #[test]
    fn await_type_colon_variants() {
        assert_eq!(AwaitType::from("gh:run"), AwaitType::GhRun);
        assert_eq!(AwaitType::from("gh:pr"), AwaitType::GhPr);
        assert_eq!(AwaitType::GhRun.as_str(), "gh:run");
    }

    #[test]
    fn into_string_matches_as_str() {
        for status in [
            Status::Open,
            Status::Tombstone,
            Status::Custom("triaged".into()),
        ] {
            let token: String = status.clone().into();
            assert_eq!(token, status.as_str());
        }
    }

    #[test]
    fn display_matches_token() {
        assert_eq!(Status::InProgress.to_string(), "in_progress");
        assert_eq!(MolType::None.to_string(), "");
    }
}
