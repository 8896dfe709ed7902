//! Permanent removal of closed issues.
//!
//! Compaction deletes `closed/` files matching an age or absolute-date
//! filter. Open issues are never touched; ephemeral-molecule GC lives in
//! the engine because it needs tree traversal.

use chrono::{DateTime, Utc};
use tracing::debug;

use braid_core::cancel::CancelToken;
use braid_core::enums::Status;
use braid_core::filter::IssueFilter;

use crate::error::{Result, StoreError};
use crate::store::FsStore;

/// Filters for a compaction run. Exactly one of `older_than` / `before`
/// must be set.
#[derive(Debug, Clone, Default)]
pub struct CompactOptions {
    /// Delete closed issues whose `closed_at` is older than this duration.
    pub older_than: Option<chrono::Duration>,
    /// Delete closed issues whose `closed_at` precedes this instant.
    pub before: Option<DateTime<Utc>>,
    /// Report candidates without deleting.
    pub dry_run: bool,
}

/// Result of a compaction run.
#[derive(Debug, Clone, Default)]
pub struct CompactReport {
    /// Ids matching the filter (deleted unless `dry_run`).
    pub candidates: Vec<String>,
    /// How many files were actually removed.
    pub deleted: usize,
}

/// Deletes (or, with `dry_run`, reports) closed issues matching the filter.
pub fn compact(store: &FsStore, opts: &CompactOptions, token: &CancelToken) -> Result<CompactReport> {
    let cutoff = match (opts.older_than, opts.before) {
        (Some(_), Some(_)) => {
            return Err(StoreError::Usage(
                "compact accepts either --older-than or --before, not both".into(),
            ));
        }
        (None, None) => {
            return Err(StoreError::Usage(
                "compact requires an --older-than or --before filter".into(),
            ));
        }
        (Some(age), None) => Utc::now() - age,
        (None, Some(instant)) => instant,
    };

    let closed = store.list(
        &IssueFilter {
            status: Some(Status::Closed),
            ..Default::default()
        },
        token,
    )?;

    let mut report = CompactReport::default();
    for issue in closed {
        // closed_at is guaranteed by validation; updated_at covers legacy files.
        let closed_at = issue.closed_at.unwrap_or(issue.updated_at);
        if closed_at >= cutoff {
            continue;
        }
        report.candidates.push(issue.id.clone());
        if !opts.dry_run {
            store.delete(&issue.id, token)?;
            report.deleted += 1;
        }
    }

    debug!(
        candidates = report.candidates.len(),
        deleted = report.deleted,
        dry_run = opts.dry_run,
        "compaction finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOptions;
    use braid_core::issue::IssueBuilder;

    fn store() -> (tempfile::TempDir, FsStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path(), StoreOptions::default());
        store.init().unwrap();
        (dir, store)
    }

    fn close_with_age(store: &FsStore, id: &str, age: chrono::Duration) {
        let token = CancelToken::new();
        store
            .create(IssueBuilder::new(id).id(id).build(), &token)
            .unwrap();
        store
            .modify(id, &token, |issue| {
                issue.status = Status::Closed;
                issue.closed_at = Some(Utc::now() - age);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn both_filters_is_usage_error() {
        let (_dir, store) = store();
        let opts = CompactOptions {
            older_than: Some(chrono::Duration::days(1)),
            before: Some(Utc::now()),
            dry_run: false,
        };
        assert!(matches!(
            compact(&store, &opts, &CancelToken::new()),
            Err(StoreError::Usage(_))
        ));
    }

    #[test]
    fn no_filter_is_usage_error() {
        let (_dir, store) = store();
        assert!(matches!(
            compact(&store, &CompactOptions::default(), &CancelToken::new()),
            Err(StoreError::Usage(_))
        ));
    }

    #[test]
    fn older_than_deletes_only_old_closed() {
        let (_dir, store) = store();
        let token = CancelToken::new();
        close_with_age(&store, "bd-old", chrono::Duration::days(30));
        close_with_age(&store, "bd-new", chrono::Duration::hours(1));
        store
            .create(IssueBuilder::new("open").id("bd-open").build(), &token)
            .unwrap();

        let report = compact(
            &store,
            &CompactOptions {
                older_than: Some(chrono::Duration::days(7)),
                ..Default::default()
            },
            &token,
        )
        .unwrap();

        assert_eq!(report.candidates, vec!["bd-old"]);
        assert_eq!(report.deleted, 1);
        assert!(!store.exists("bd-old"));
        assert!(store.exists("bd-new"));
        assert!(store.exists("bd-open"));
    }

    #[test]
    fn dry_run_reports_without_deleting() {
        let (_dir, store) = store();
        close_with_age(&store, "bd-old", chrono::Duration::days(30));

        let report = compact(
            &store,
            &CompactOptions {
                older_than: Some(chrono::Duration::days(7)),
                dry_run: true,
                ..Default::default()
            },
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.candidates, vec!["bd-old"]);
        assert_eq!(report.deleted, 0);
        assert!(store.exists("bd-old"));
    }

    #[test]
    fn before_filter_uses_absolute_cutoff() {
        let (_dir, store) = store();
        close_with_age(&store, "bd-old", chrono::Duration::days(30));
        close_with_age(&store, "bd-new", chrono::Duration::days(1));

        let report = compact(
            &store,
            &CompactOptions {
                before: Some(Utc::now() - chrono::Duration::days(7)),
                ..Default::default()
            },
            &CancelToken::new(),
        )
        .unwrap();

        assert_eq!(report.candidates, vec!["bd-old"]);
    }
}
