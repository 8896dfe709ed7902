//! Consistency auditor.
//!
//! Scans a store for invariant violations and returns structured findings
//! (never errors). With `fix = true` each finding is repaired where safe:
//! misplaced files move to the status-appropriate subtree, dangling parent
//! references are cleared, stale locks are removed, and undecodable files
//! are quarantined.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use braid_core::cancel::CancelToken;
use braid_core::filter::IssueFilter;
use braid_core::issue::Issue;
use braid_storage::layout::{CLOSED_DIR, OPEN_DIR, QUARANTINE_DIR};
use braid_storage::FsStore;

use crate::error::Result;

/// What kind of inconsistency a finding reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    /// File location disagrees with the document's status.
    MisplacedFile,
    /// `parent` points at a non-existent id.
    DanglingParent,
    /// A dependency target points at a non-existent id.
    DanglingDependency,
    /// Lock file past the stale threshold with no holder.
    StaleLock,
    /// Document fails to decode.
    MalformedDocument,
    /// The same id has a file in both subtrees.
    DuplicateId,
    /// Comment ids collide or are non-positive within one issue.
    CommentIdCollision,
    /// A field value is out of range.
    FieldOutOfRange,
}

/// One human-readable audit finding.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    /// The offending issue id, or a path for file-level findings.
    pub subject: String,
    pub message: String,
    /// Whether a repair was applied during this run.
    pub fixed: bool,
}

impl Finding {
    fn new(kind: FindingKind, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            subject: subject.into(),
            message: message.into(),
            fixed: false,
        }
    }
}

/// Scans the store; with `fix`, repairs each finding where safe.
pub fn doctor(store: &FsStore, fix: bool, token: &CancelToken) -> Result<Vec<Finding>> {
    let mut findings = Vec::new();

    check_decodability(store, fix, token, &mut findings)?;
    check_placement_and_duplicates(store, fix, token, &mut findings)?;
    check_references(store, fix, token, &mut findings)?;
    check_stale_locks(store, fix, token, &mut findings)?;

    for finding in &findings {
        warn!(
            kind = ?finding.kind,
            subject = %finding.subject,
            fixed = finding.fixed,
            "doctor finding"
        );
    }
    Ok(findings)
}

/// Walks every document file in a subtree.
fn walk_subtree(
    store: &FsStore,
    subtree: &str,
    token: &CancelToken,
    mut visit: impl FnMut(&Path, std::result::Result<Issue, String>) -> Result<()>,
) -> Result<()> {
    let dir = store.data_dir().join(subtree);
    if !dir.is_dir() {
        return Ok(());
    }
    for shard in fs::read_dir(&dir).map_err(braid_storage::StoreError::from)? {
        if token.is_cancelled() {
            return Err(braid_storage::StoreError::Cancelled.into());
        }
        let shard_path = shard.map_err(braid_storage::StoreError::from)?.path();
        if !shard_path.is_dir() {
            continue;
        }
        for entry in fs::read_dir(&shard_path).map_err(braid_storage::StoreError::from)? {
            let path = entry.map_err(braid_storage::StoreError::from)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let decoded = fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|data| serde_json::from_str(&data).map_err(|e| e.to_string()));
            visit(&path, decoded)?;
        }
    }
    Ok(())
}

/// Undecodable documents; fix: move to `quarantine/`.
fn check_decodability(
    store: &FsStore,
    fix: bool,
    token: &CancelToken,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    for subtree in [OPEN_DIR, CLOSED_DIR] {
        let mut bad: Vec<(PathBuf, String)> = Vec::new();
        walk_subtree(store, subtree, token, |path, decoded| {
            if let Err(reason) = decoded {
                bad.push((path.to_path_buf(), reason));
            }
            Ok(())
        })?;

        for (path, reason) in bad {
            let mut finding = Finding::new(
                FindingKind::MalformedDocument,
                path.display().to_string(),
                format!("failed to decode: {reason}"),
            );
            if fix {
                let quarantine = store.data_dir().join(QUARANTINE_DIR);
                fs::create_dir_all(&quarantine).map_err(braid_storage::StoreError::from)?;
                if let Some(name) = path.file_name() {
                    let dest = quarantine.join(name);
                    if fs::rename(&path, &dest).is_ok() {
                        finding.fixed = true;
                        finding.message.push_str(" (moved to quarantine)");
                    }
                }
            }
            findings.push(finding);
        }
    }
    Ok(())
}

/// Location/status mismatches and ids present in both subtrees; fix:
/// relocate misplaced files (duplicates are reported, not guessed at).
fn check_placement_and_duplicates(
    store: &FsStore,
    fix: bool,
    token: &CancelToken,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let mut seen: HashMap<String, Vec<&'static str>> = HashMap::new();
    let mut misplaced: Vec<(PathBuf, String, bool)> = Vec::new();

    for subtree in [OPEN_DIR, CLOSED_DIR] {
        walk_subtree(store, subtree, token, |path, decoded| {
            let Ok(issue) = decoded else { return Ok(()) };
            seen.entry(issue.id.clone()).or_default().push(subtree);

            let should_be_closed = issue.status.is_closed();
            let is_in_closed = subtree == CLOSED_DIR;
            if should_be_closed != is_in_closed {
                misplaced.push((path.to_path_buf(), issue.id.clone(), should_be_closed));
            }
            Ok(())
        })?;
    }

    for (id, subtrees) in &seen {
        if subtrees.len() > 1 {
            findings.push(Finding::new(
                FindingKind::DuplicateId,
                id.clone(),
                "id has a file in both open/ and closed/",
            ));
        }
    }

    for (path, id, should_be_closed) in misplaced {
        // A duplicate pair would collide on relocation; report only.
        let duplicated = seen.get(&id).map(|s| s.len() > 1).unwrap_or(false);
        let target_subtree = if should_be_closed { CLOSED_DIR } else { OPEN_DIR };
        let mut finding = Finding::new(
            FindingKind::MisplacedFile,
            id.clone(),
            format!("status belongs under {target_subtree}/ but file is elsewhere"),
        );
        if fix && !duplicated {
            let dest = store.path_in(target_subtree, &id);
            if !dest.exists() {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent).map_err(braid_storage::StoreError::from)?;
                }
                if fs::rename(&path, &dest).is_ok() {
                    finding.fixed = true;
                    finding.message = format!("relocated to {target_subtree}/");
                }
            }
        }
        findings.push(finding);
    }
    Ok(())
}

/// Dangling parent/dependency references, comment-id collisions, and
/// out-of-range fields; fix: clear dangling parents only.
fn check_references(
    store: &FsStore,
    fix: bool,
    token: &CancelToken,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let all = store.list(&IssueFilter::default(), token)?;
    let live_ids: HashSet<&str> = all.iter().map(|i| i.id.as_str()).collect();

    for issue in &all {
        if let Some(ref parent) = issue.parent {
            if !live_ids.contains(parent.as_str()) {
                let mut finding = Finding::new(
                    FindingKind::DanglingParent,
                    issue.id.clone(),
                    format!("parent {parent} does not exist"),
                );
                if fix {
                    store.modify(&issue.id, token, |i| {
                        i.parent = None;
                        Ok(())
                    })?;
                    finding.fixed = true;
                    finding.message.push_str(" (cleared)");
                }
                findings.push(finding);
            }
        }

        for dep in &issue.dependencies {
            if !live_ids.contains(dep.target_id.as_str()) {
                findings.push(Finding::new(
                    FindingKind::DanglingDependency,
                    issue.id.clone(),
                    format!("dependency target {} does not exist", dep.target_id),
                ));
            }
        }

        let mut comment_ids = HashSet::new();
        for comment in &issue.comments {
            if comment.id < 1 || !comment_ids.insert(comment.id) {
                findings.push(Finding::new(
                    FindingKind::CommentIdCollision,
                    issue.id.clone(),
                    format!("comment id {} is colliding or non-positive", comment.id),
                ));
            }
        }

        if !(0..=4).contains(&issue.priority) {
            findings.push(Finding::new(
                FindingKind::FieldOutOfRange,
                issue.id.clone(),
                format!("priority {} outside 0..=4", issue.priority),
            ));
        }
    }
    Ok(())
}

/// Stale lock files; fix: remove them.
fn check_stale_locks(
    store: &FsStore,
    fix: bool,
    token: &CancelToken,
    findings: &mut Vec<Finding>,
) -> Result<()> {
    let locks_dir = store.data_dir().join("locks");
    if !locks_dir.is_dir() {
        return Ok(());
    }
    for entry in fs::read_dir(&locks_dir).map_err(braid_storage::StoreError::from)? {
        if token.is_cancelled() {
            return Err(braid_storage::StoreError::Cancelled.into());
        }
        let path = entry.map_err(braid_storage::StoreError::from)?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("lock") {
            continue;
        }
        if braid_lockfile::is_stale(&path, store.options().stale_lock_age) {
            let mut finding = Finding::new(
                FindingKind::StaleLock,
                path.display().to_string(),
                "lock is stale with no holder",
            );
            if fix {
                let _ = fs::remove_file(&path);
                finding.fixed = true;
                finding.message.push_str(" (removed)");
            }
            findings.push(finding);
        }
    }
    Ok(())
}
