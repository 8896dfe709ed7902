//! Garbage collection of ephemeral molecules.
//!
//! Removes `ephemeral` molecule roots whose age exceeds a threshold,
//! cascading into descendants (children deleted before their ancestors).

use chrono::Utc;
use tracing::debug;

use braid_core::cancel::CancelToken;
use braid_core::filter::IssueFilter;
use braid_graph::collect_molecule_children;
use braid_storage::FsStore;

use crate::error::Result;

/// Report of one GC pass.
#[derive(Debug, Clone, Default)]
pub struct GcReport {
    /// Every id removed, roots included.
    pub removed: Vec<String>,
}

/// Removes ephemeral molecule roots older than `older_than`, cascading
/// into their descendants.
pub fn gc_ephemeral(
    store: &FsStore,
    older_than: chrono::Duration,
    token: &CancelToken,
) -> Result<GcReport> {
    let cutoff = Utc::now() - older_than;

    let ephemeral = store.list(
        &IssueFilter {
            ephemeral: Some(true),
            ..Default::default()
        },
        token,
    )?;

    let mut report = GcReport::default();
    for root in ephemeral
        .iter()
        .filter(|i| i.parent.is_none() && i.created_at < cutoff)
    {
        let descendants = collect_molecule_children(store, &root.id, token)?;

        // Depth-first-ish: BFS order reversed deletes leaves before their
        // parents.
        for issue in descendants.iter().rev() {
            store.delete(&issue.id, token)?;
            report.removed.push(issue.id.clone());
        }
        store.delete(&root.id, token)?;
        report.removed.push(root.id.clone());
        debug!(root = %root.id, removed = report.removed.len(), "collected ephemeral molecule");
    }

    Ok(report)
}
