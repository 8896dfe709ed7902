//! Molecule traversal and step classification.
//!
//! A molecule is the tree of issues reachable from a root via parent
//! references. Traversals are read-only and depth-bounded; the on-disk
//! shape is never trusted to be acyclic.

use std::collections::{HashSet, VecDeque};

use braid_core::cancel::CancelToken;
use braid_core::enums::Status;
use braid_core::issue::Issue;
use braid_storage::FsStore;

use crate::analysis::ready;
use crate::error::Result;

/// Traversal bound applied when no maximum depth is configured.
const TRAVERSAL_DEPTH_CEILING: u32 = 64;

/// Classification of a molecule step against the closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    /// Status is closed.
    Done,
    /// Being worked: in_progress or hooked.
    Current,
    /// Open with every `blocks` target closed.
    Ready,
    /// Open with at least one open `blocks` target.
    Blocked,
    /// Anything else (deferred, blocked status, tombstone, ...).
    Pending,
}

/// Steps bucketed by [`StepState`].
#[derive(Debug, Clone, Default)]
pub struct StepBuckets {
    pub done: Vec<Issue>,
    pub current: Vec<Issue>,
    pub ready: Vec<Issue>,
    pub blocked: Vec<Issue>,
    pub pending: Vec<Issue>,
}

/// Progress summary for a molecule.
#[derive(Debug, Clone, PartialEq)]
pub struct MoleculeProgress {
    pub total: usize,
    pub done: usize,
    pub percent: f64,
}

/// BFS over parent references, returning all descendants of `root` (the
/// root itself excluded), bounded by `max_depth` when configured.
pub fn collect_molecule_children(
    store: &FsStore,
    root: &str,
    token: &CancelToken,
) -> Result<Vec<Issue>> {
    let max_depth = store
        .options()
        .max_depth
        .unwrap_or(TRAVERSAL_DEPTH_CEILING);

    let mut seen: HashSet<String> = HashSet::new();
    seen.insert(root.to_string());

    let mut queue: VecDeque<(String, u32)> = VecDeque::new();
    queue.push_back((root.to_string(), 0));

    let mut descendants = Vec::new();
    while let Some((id, depth)) = queue.pop_front() {
        if depth >= max_depth {
            continue;
        }
        for child in store.children_of(&id, token)? {
            if !seen.insert(child.id.clone()) {
                continue;
            }
            queue.push_back((child.id.clone(), depth + 1));
            descendants.push(child);
        }
    }
    Ok(descendants)
}

/// Walks parent references up from `id` until a node without a parent is
/// reached, returning that root id.
pub fn find_molecule_root(store: &FsStore, id: &str, token: &CancelToken) -> Result<String> {
    let chain = store.parent_chain(id, token)?;
    Ok(chain.last().cloned().unwrap_or_else(|| id.to_string()))
}

/// Classifies one step against the closed set.
pub fn classify_step(issue: &Issue, closed: &HashSet<String>) -> StepState {
    match issue.status {
        Status::Closed => StepState::Done,
        Status::InProgress | Status::Hooked => StepState::Current,
        Status::Open => {
            if ready(issue, closed) {
                StepState::Ready
            } else {
                StepState::Blocked
            }
        }
        _ => StepState::Pending,
    }
}

/// Buckets every step by classification.
pub fn classify_steps(children: &[Issue], closed: &HashSet<String>) -> StepBuckets {
    let mut buckets = StepBuckets::default();
    for issue in children {
        let bucket = match classify_step(issue, closed) {
            StepState::Done => &mut buckets.done,
            StepState::Current => &mut buckets.current,
            StepState::Ready => &mut buckets.ready,
            StepState::Blocked => &mut buckets.blocked,
            StepState::Pending => &mut buckets.pending,
        };
        bucket.push(issue.clone());
    }
    buckets
}

/// Returns the first step in `ordered` positioned after `after_id` that is
/// ready; `None` when no such step exists. With `after_id = None` the scan
/// starts at the beginning.
pub fn find_next_step<'a>(
    ordered: &'a [Issue],
    after_id: Option<&str>,
    closed: &HashSet<String>,
) -> Option<&'a Issue> {
    let start = match after_id {
        Some(id) => ordered.iter().position(|i| i.id == id)? + 1,
        None => 0,
    };
    ordered[start..]
        .iter()
        .find(|issue| classify_step(issue, closed) == StepState::Ready)
}

/// Done/total progress for a molecule's steps.
pub fn molecule_progress(children: &[Issue]) -> MoleculeProgress {
    let total = children.len();
    let done = children
        .iter()
        .filter(|i| i.status == Status::Closed)
        .count();
    let percent = if total == 0 {
        0.0
    } else {
        done as f64 * 100.0 / total as f64
    };
    MoleculeProgress {
        total,
        done,
        percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::dependency::Dependency;
    use braid_core::issue::IssueBuilder;
    use braid_storage::StoreOptions;
    use pretty_assertions::assert_eq;

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), StoreOptions::default());
        store.init().unwrap();
        (dir, store)
    }

    fn token() -> CancelToken {
        CancelToken::new()
    }

    fn seed_tree(store: &FsStore) {
        // root -> {a, b}, a -> {a1}
        for id in ["bd-root", "bd-a", "bd-b", "bd-a.1"] {
            store
                .create(IssueBuilder::new(id).id(id).build(), &token())
                .unwrap();
        }
        store.set_parent("bd-a", "bd-root", &token()).unwrap();
        store.set_parent("bd-b", "bd-root", &token()).unwrap();
        store.set_parent("bd-a.1", "bd-a", &token()).unwrap();
    }

    #[test]
    fn collect_children_returns_all_descendants() {
        let (_dir, store) = store();
        seed_tree(&store);

        let children = collect_molecule_children(&store, "bd-root", &token()).unwrap();
        let mut ids: Vec<&str> = children.iter().map(|i| i.id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["bd-a", "bd-a.1", "bd-b"]);
    }

    #[test]
    fn find_root_walks_up() {
        let (_dir, store) = store();
        seed_tree(&store);

        assert_eq!(
            find_molecule_root(&store, "bd-a.1", &token()).unwrap(),
            "bd-root"
        );
        assert_eq!(
            find_molecule_root(&store, "bd-root", &token()).unwrap(),
            "bd-root"
        );
    }

    #[test]
    fn classify_buckets() {
        let closed: HashSet<String> = ["bd-dep".to_string()].into();

        let done = IssueBuilder::new("done")
            .id("bd-done")
            .status(Status::Closed)
            .build();
        let current = IssueBuilder::new("cur")
            .id("bd-cur")
            .status(Status::InProgress)
            .build();
        let mut ready_issue = IssueBuilder::new("rdy").id("bd-rdy").build();
        ready_issue.dependencies.push(Dependency::blocks("bd-dep"));
        let mut blocked = IssueBuilder::new("blk").id("bd-blk").build();
        blocked.dependencies.push(Dependency::blocks("bd-open"));
        let pending = IssueBuilder::new("pnd")
            .id("bd-pnd")
            .status(Status::Deferred)
            .build();

        // closed_at needed for validity is irrelevant here: classification
        // looks only at status and edges.
        let steps = vec![done, current, ready_issue, blocked, pending];
        let buckets = classify_steps(&steps, &closed);

        assert_eq!(buckets.done.len(), 1);
        assert_eq!(buckets.current.len(), 1);
        assert_eq!(buckets.ready.len(), 1);
        assert_eq!(buckets.blocked.len(), 1);
        assert_eq!(buckets.pending.len(), 1);
        assert_eq!(buckets.ready[0].id, "bd-rdy");
    }

    #[test]
    fn next_step_skips_unready() {
        let closed: HashSet<String> = HashSet::new();
        let first = IssueBuilder::new("one").id("bd-1").build();
        let mut gated = IssueBuilder::new("two").id("bd-2").build();
        gated.dependencies.push(Dependency::blocks("bd-1"));
        let third = IssueBuilder::new("three").id("bd-3").build();

        let ordered = vec![first, gated, third];

        let next = find_next_step(&ordered, Some("bd-1"), &closed).unwrap();
        // bd-2 is gated on the still-open bd-1, so bd-3 is next.
        assert_eq!(next.id, "bd-3");

        assert_eq!(
            find_next_step(&ordered, None, &closed).unwrap().id,
            "bd-1"
        );
        assert!(find_next_step(&ordered, Some("bd-3"), &closed).is_none());
        assert!(find_next_step(&ordered, Some("bd-missing"), &closed).is_none());
    }

    #[test]
    fn progress_counts_closed() {
        let done = IssueBuilder::new("d")
            .id("bd-d")
            .status(Status::Closed)
            .build();
        let open = IssueBuilder::new("o").id("bd-o").build();

        let progress = molecule_progress(&[done, open]);
        assert_eq!(
            progress,
            MoleculeProgress {
                total: 2,
                done: 1,
                percent: 50.0
            }
        );

        assert_eq!(molecule_progress(&[]).total, 0);
    }
}
