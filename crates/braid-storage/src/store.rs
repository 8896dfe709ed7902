//! Filesystem-backed issue store.
//!
//! Each issue is one JSON document under `open/` or `closed/`. Writers hold
//! an in-process per-id mutex stacked under an OS advisory lock file, and
//! every write goes through write-to-temp-then-rename so readers never
//! observe a torn document.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, warn};

use braid_core::cancel::CancelToken;
use braid_core::comment::Comment;
use braid_core::dependency::Dependency;
use braid_core::enums::{DependencyType, Status};
use braid_core::filter::IssueFilter;
use braid_core::idgen;
use braid_core::issue::Issue;
use braid_core::validation::{self, ValidationPolicy};

use braid_lockfile::LockFile;

use crate::error::{Result, StoreError};
use crate::layout::{self, CLOSED_DIR, LOCKS_DIR, OPEN_DIR};

/// Tuning and policy for a store instance.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Issue id prefix including the trailing hyphen (e.g. `"bd-"`).
    pub prefix: String,
    /// Maximum parent-hierarchy depth; `None` is explicitly unbounded.
    pub max_depth: Option<u32>,
    /// How long a writer waits for the per-issue lock before `Busy`.
    pub lock_timeout: Duration,
    /// Age past which an unheld lock file counts as stale.
    pub stale_lock_age: Duration,
    /// Validation policy (custom statuses/types, description requirement).
    pub policy: ValidationPolicy,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            prefix: "bd-".to_string(),
            max_depth: None,
            lock_timeout: Duration::from_secs(30),
            stale_lock_age: Duration::from_secs(600),
            policy: ValidationPolicy::default(),
        }
    }
}

/// A filesystem issue store rooted at one data directory.
pub struct FsStore {
    data_dir: PathBuf,
    opts: StoreOptions,
    /// In-process per-id locks, stacked under the on-disk advisory locks so
    /// that threads sharing this instance serialise before touching files.
    id_mutexes: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl FsStore {
    /// Opens a store at `data_dir` with the given options. Does not touch
    /// the filesystem; call [`FsStore::init`] to create the directory tree.
    pub fn new(data_dir: impl Into<PathBuf>, opts: StoreOptions) -> Self {
        Self {
            data_dir: data_dir.into(),
            opts,
            id_mutexes: Mutex::new(HashMap::new()),
        }
    }

    /// The store's data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The store's options.
    pub fn options(&self) -> &StoreOptions {
        &self.opts
    }

    /// Idempotently creates the `open/`, `closed/`, and `locks/` tree.
    pub fn init(&self) -> Result<()> {
        for sub in [OPEN_DIR, CLOSED_DIR, LOCKS_DIR] {
            fs::create_dir_all(self.data_dir.join(sub))?;
        }
        Ok(())
    }

    // -- Lookup --------------------------------------------------------------

    /// Path the issue would occupy in the given subtree.
    pub fn path_in(&self, subtree: &str, id: &str) -> PathBuf {
        layout::issue_path(&self.data_dir, subtree, &self.opts.prefix, id)
    }

    /// Finds the file for `id`, searching `open/` then `closed/`.
    fn locate(&self, id: &str) -> Option<(PathBuf, bool)> {
        let open = self.path_in(OPEN_DIR, id);
        if open.exists() {
            return Some((open, false));
        }
        let closed = self.path_in(CLOSED_DIR, id);
        if closed.exists() {
            return Some((closed, true));
        }
        None
    }

    /// Retrieves an issue by id.
    pub fn get(&self, id: &str, token: &CancelToken) -> Result<Issue> {
        check(token)?;
        let (path, _) = self.locate(id).ok_or_else(|| StoreError::not_found(id))?;
        self.read_issue(&path)
    }

    /// Returns `true` when a live file exists for `id` in either subtree.
    pub fn exists(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    fn read_issue(&self, path: &Path) -> Result<Issue> {
        let data = fs::read_to_string(path)?;
        serde_json::from_str(&data).map_err(|e| StoreError::malformed(path, e.to_string()))
    }

    // -- Create --------------------------------------------------------------

    /// Creates a new issue, assigning an id when the caller did not supply
    /// one, and returns the id.
    pub fn create(&self, mut issue: Issue, token: &CancelToken) -> Result<String> {
        check(token)?;

        if issue.id.is_empty() {
            issue.id = self.generate_id(&issue)?;
        } else {
            if !validation::is_well_formed_id(&issue.id) {
                return Err(StoreError::Usage(format!("malformed id: {:?}", issue.id)));
            }
            if self.exists(&issue.id) {
                return Err(StoreError::already_exists(&issue.id));
            }
        }

        validation::validate_with_policy(&issue, &self.opts.policy)?;

        let id = issue.id.clone();
        self.with_id_lock(&id, token, |store| {
            // Re-check under the lock: a racing creator may have won.
            if store.exists(&id) {
                return Err(StoreError::already_exists(&id));
            }
            let subtree = if issue.status.is_closed() { CLOSED_DIR } else { OPEN_DIR };
            let path = store.path_in(subtree, &id);
            store.write_atomic(&path, &issue, token)?;
            debug!(id = %id, "created issue");
            Ok(())
        })?;

        Ok(id)
    }

    /// Runs the adaptive-length + nonce collision protocol from the id
    /// generator: ten nonces per length, escalating length on exhaustion.
    fn generate_id(&self, issue: &Issue) -> Result<String> {
        let population = self.count_issues()?;
        let start = idgen::compute_adaptive_length(
            population,
            idgen::adaptive_defaults::MIN_LENGTH,
            idgen::adaptive_defaults::MAX_LENGTH,
            idgen::adaptive_defaults::MAX_COLLISION_PROB,
        );

        for length in start..=idgen::adaptive_defaults::MAX_LENGTH {
            for nonce in 0..idgen::adaptive_defaults::NONCE_ATTEMPTS {
                let candidate = idgen::hash_id(
                    &self.opts.prefix,
                    &issue.title,
                    &issue.description,
                    &issue.created_by,
                    issue.created_at,
                    nonce,
                    length,
                );
                if !self.exists(&candidate) {
                    return Ok(candidate);
                }
            }
        }

        Err(StoreError::Internal(format!(
            "id space exhausted for prefix {:?} at population {population}",
            self.opts.prefix
        )))
    }

    // -- List ----------------------------------------------------------------

    /// Lists issues matching `filter`, sorted by `(priority asc, created_at
    /// desc)` and truncated to `filter.limit` when it is non-zero.
    ///
    /// Files that fail to decode are skipped with a warning; the doctor
    /// reports them as findings.
    pub fn list(&self, filter: &IssueFilter, token: &CancelToken) -> Result<Vec<Issue>> {
        let mut results = Vec::new();
        if filter.scans_open() {
            self.scan_subtree(OPEN_DIR, filter, token, &mut results)?;
        }
        if filter.scans_closed() {
            self.scan_subtree(CLOSED_DIR, filter, token, &mut results)?;
        }

        results.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.created_at.cmp(&a.created_at))
        });

        if filter.limit > 0 {
            results.truncate(filter.limit);
        }
        Ok(results)
    }

    fn scan_subtree(
        &self,
        subtree: &str,
        filter: &IssueFilter,
        token: &CancelToken,
        out: &mut Vec<Issue>,
    ) -> Result<()> {
        let dir = self.data_dir.join(subtree);
        if !dir.is_dir() {
            return Ok(());
        }
        for shard in fs::read_dir(&dir)? {
            check(token)?;
            let shard_path = shard?.path();
            if !shard_path.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard_path)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                match self.read_issue(&path) {
                    Ok(issue) => {
                        if filter.matches(&issue) {
                            out.push(issue);
                        }
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "skipping undecodable issue file");
                    }
                }
            }
        }
        Ok(())
    }

    /// Ids present in a subtree (file stems, no decoding).
    fn scan_ids(&self, subtree: &str, token: &CancelToken) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let dir = self.data_dir.join(subtree);
        if !dir.is_dir() {
            return Ok(ids);
        }
        for shard in fs::read_dir(&dir)? {
            check(token)?;
            let shard_path = shard?.path();
            if !shard_path.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard_path)? {
                let path = entry?.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Total live documents across both subtrees.
    pub fn count_issues(&self) -> Result<usize> {
        let token = CancelToken::new();
        Ok(self.scan_ids(OPEN_DIR, &token)?.len() + self.scan_ids(CLOSED_DIR, &token)?.len())
    }

    /// The set of ids whose file lives under `closed/`.
    pub fn closed_ids(&self, token: &CancelToken) -> Result<HashSet<String>> {
        Ok(self.scan_ids(CLOSED_DIR, token)?.into_iter().collect())
    }

    // -- Mutation ------------------------------------------------------------

    /// The primary mutator: read, transform, validate, and atomically write
    /// back under the per-id lock. Status transitions from/to `closed` move
    /// the file between subtrees. The transform may return an error to
    /// abort with nothing written.
    pub fn modify<F>(&self, id: &str, token: &CancelToken, f: F) -> Result<Issue>
    where
        F: FnOnce(&mut Issue) -> Result<()>,
    {
        self.with_id_lock(id, token, |store| {
            let (path, was_closed) =
                store.locate(id).ok_or_else(|| StoreError::not_found(id))?;
            let mut issue = store.read_issue(&path)?;

            f(&mut issue)?;
            issue.id = id.to_string();
            issue.updated_at = Utc::now();

            validation::validate_with_policy(&issue, &store.opts.policy)?;
            store.write_replacement(id, &path, was_closed, &issue, token)?;
            Ok(issue)
        })
    }

    /// Overwrites an existing issue wholesale. Prefer [`FsStore::modify`]
    /// unless a full replacement is intended.
    pub fn update(&self, issue: &Issue, token: &CancelToken) -> Result<()> {
        let id = issue.id.clone();
        let mut replacement = issue.clone();
        self.with_id_lock(&id, token, |store| {
            let (path, was_closed) =
                store.locate(&id).ok_or_else(|| StoreError::not_found(&id))?;
            replacement.updated_at = Utc::now();
            validation::validate_with_policy(&replacement, &store.opts.policy)?;
            store.write_replacement(&id, &path, was_closed, &replacement, token)
        })
    }

    /// Permanently removes the issue file. Does not cascade.
    pub fn delete(&self, id: &str, token: &CancelToken) -> Result<()> {
        self.with_id_lock(id, token, |store| {
            let (path, _) = store.locate(id).ok_or_else(|| StoreError::not_found(id))?;
            fs::remove_file(&path)?;
            debug!(id = %id, "deleted issue");
            Ok(())
        })
    }

    /// Closes an issue: sets status, `closed_at`, and the close reason.
    pub fn close(&self, id: &str, reason: &str, token: &CancelToken) -> Result<Issue> {
        self.modify(id, token, |issue| {
            issue.status = Status::Closed;
            issue.closed_at = Some(Utc::now());
            issue.close_reason = reason.to_string();
            Ok(())
        })
    }

    /// Reopens a closed issue, clearing `closed_at` and the close reason.
    pub fn reopen(&self, id: &str, token: &CancelToken) -> Result<Issue> {
        self.modify(id, token, |issue| {
            issue.status = Status::Open;
            issue.closed_at = None;
            issue.close_reason = String::new();
            Ok(())
        })
    }

    /// Soft-deletes an id by transitioning it to a tombstone. The file is
    /// retained (under `open/`) so the id is never reused.
    pub fn soft_delete(&self, id: &str, token: &CancelToken) -> Result<Issue> {
        self.modify(id, token, |issue| {
            issue.status = Status::Tombstone;
            issue.closed_at = None;
            Ok(())
        })
    }

    /// Appends a comment, assigning the next per-issue id and stamping
    /// `created_at` when the caller left it unset.
    pub fn add_comment(&self, id: &str, mut comment: Comment, token: &CancelToken) -> Result<Comment> {
        let mut assigned = None;
        self.modify(id, token, |issue| {
            comment.id = issue.next_comment_id();
            if comment.created_at == chrono::DateTime::<Utc>::UNIX_EPOCH {
                comment.created_at = Utc::now();
            }
            assigned = Some(comment.clone());
            issue.comments.push(comment.clone());
            Ok(())
        })?;
        assigned.ok_or_else(|| StoreError::Internal("comment transform did not run".into()))
    }

    // -- Dependencies --------------------------------------------------------

    /// Adds a forward dependency edge on `from`. Re-adding an identical
    /// edge is a no-op. `blocks` edges are cycle-checked before the write.
    pub fn add_dependency(
        &self,
        from: &str,
        to: &str,
        dep_type: DependencyType,
        token: &CancelToken,
    ) -> Result<()> {
        if !validation::is_well_formed_id(to) {
            return Err(StoreError::Usage(format!("malformed dependency target: {to:?}")));
        }
        if from == to {
            return Err(StoreError::InvalidField(
                braid_core::validation::ValidationError::SelfDependency,
            ));
        }
        if dep_type.affects_readiness() && self.blocks_path_exists(to, from, token)? {
            return Err(StoreError::Cycle { id: to.to_string() });
        }

        self.modify(from, token, |issue| {
            let edge = Dependency::new(to, dep_type);
            if !issue.dependencies.contains(&edge) {
                issue.dependencies.push(edge);
            }
            Ok(())
        })?;
        Ok(())
    }

    /// Removes a forward dependency edge on `from`. Absent edges are a
    /// no-op.
    pub fn remove_dependency(
        &self,
        from: &str,
        to: &str,
        dep_type: DependencyType,
        token: &CancelToken,
    ) -> Result<()> {
        self.modify(from, token, |issue| {
            issue
                .dependencies
                .retain(|d| !(d.target_id == to && d.dep_type == dep_type));
            Ok(())
        })?;
        Ok(())
    }

    /// Returns `true` if a `blocks` path exists from `start` to `needle`.
    ///
    /// Lock-free read; missing targets are leaves. The on-disk shape is not
    /// trusted: a visited set bounds the walk even if a cycle already
    /// exists.
    fn blocks_path_exists(&self, start: &str, needle: &str, token: &CancelToken) -> Result<bool> {
        let mut visited = HashSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(id) = stack.pop() {
            check(token)?;
            if id == needle {
                return Ok(true);
            }
            if !visited.insert(id.clone()) {
                continue;
            }
            let Some((path, _)) = self.locate(&id) else {
                continue;
            };
            let Ok(issue) = self.read_issue(&path) else {
                continue;
            };
            for target in issue.blocking_targets() {
                stack.push(target.to_string());
            }
        }
        Ok(false)
    }

    /// Issues whose dependency list points at `id` (the derived reverse
    /// view; nothing on disk stores it).
    pub fn dependents_of(&self, id: &str, token: &CancelToken) -> Result<Vec<Issue>> {
        let all = self.list(&IssueFilter::default(), token)?;
        Ok(all
            .into_iter()
            .filter(|i| i.dependencies.iter().any(|d| d.target_id == id))
            .collect())
    }

    // -- Parent / children ---------------------------------------------------

    /// Sets `parent` on `child` after cycle and depth checks.
    pub fn set_parent(&self, child: &str, parent: &str, token: &CancelToken) -> Result<()> {
        if child == parent {
            return Err(StoreError::Cycle {
                id: child.to_string(),
            });
        }
        if !self.exists(parent) {
            return Err(StoreError::not_found(parent));
        }

        // Chain from the new parent up to its root.
        let chain = self.parent_chain(parent, token)?;
        if chain.contains(&child.to_string()) {
            return Err(StoreError::Cycle {
                id: child.to_string(),
            });
        }
        if let Some(max) = self.opts.max_depth {
            let depth = chain.len() as u32; // child sits below the whole chain
            if depth + 1 > max {
                return Err(StoreError::DepthExceeded {
                    depth: depth + 1,
                    max,
                });
            }
        }

        self.modify(child, token, |issue| {
            issue.parent = Some(parent.to_string());
            Ok(())
        })?;
        Ok(())
    }

    /// Clears the parent reference on `child`.
    pub fn remove_parent(&self, child: &str, token: &CancelToken) -> Result<()> {
        self.modify(child, token, |issue| {
            issue.parent = None;
            Ok(())
        })?;
        Ok(())
    }

    /// The chain `[id, id's parent, ...]` walking up to the root. Repeated
    /// ids terminate the walk so a corrupt on-disk cycle cannot loop.
    pub fn parent_chain(&self, id: &str, token: &CancelToken) -> Result<Vec<String>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = id.to_string();
        loop {
            check(token)?;
            if !seen.insert(current.clone()) {
                break;
            }
            chain.push(current.clone());
            let Some((path, _)) = self.locate(&current) else {
                break;
            };
            let Ok(issue) = self.read_issue(&path) else {
                break;
            };
            match issue.parent {
                Some(p) => current = p,
                None => break,
            }
        }
        Ok(chain)
    }

    /// Direct children of `id` via the persisted parent reference.
    pub fn children_of(&self, id: &str, token: &CancelToken) -> Result<Vec<Issue>> {
        let filter = IssueFilter {
            parent: Some(id.to_string()),
            ..Default::default()
        };
        self.list(&filter, token)
    }

    /// Returns the next free `<parent>.<base36>` child id.
    pub fn next_child_id(&self, parent: &str, token: &CancelToken) -> Result<String> {
        if !self.exists(parent) {
            return Err(StoreError::not_found(parent));
        }
        let mut ids = self.scan_ids(OPEN_DIR, token)?;
        ids.extend(self.scan_ids(CLOSED_DIR, token)?);

        let dot_prefix = format!("{parent}.");
        let suffixes: Vec<&str> = ids
            .iter()
            .filter_map(|id| id.strip_prefix(dot_prefix.as_str()))
            .filter(|suffix| !suffix.contains('.'))
            .collect();

        let suffix = idgen::next_child_suffix(suffixes);
        Ok(idgen::child_id(parent, &suffix))
    }

    // -- Locks ---------------------------------------------------------------

    /// Removes lock files older than the stale threshold with no live
    /// holder. Returns the removed paths.
    pub fn cleanup_stale_locks(&self, token: &CancelToken) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();
        let dir = self.data_dir.join(LOCKS_DIR);
        if !dir.is_dir() {
            return Ok(removed);
        }
        for entry in fs::read_dir(&dir)? {
            check(token)?;
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("lock") {
                continue;
            }
            if braid_lockfile::is_stale(&path, self.opts.stale_lock_age) {
                warn!(path = %path.display(), "removing stale lock");
                let _ = fs::remove_file(&path);
                removed.push(path);
            }
        }
        Ok(removed)
    }

    fn with_id_lock<T, F>(&self, id: &str, token: &CancelToken, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        check(token)?;

        let id_mutex = {
            let mut registry = self
                .id_mutexes
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            registry
                .entry(id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _in_process = id_mutex
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        check(token)?;
        let lock_path = layout::lock_path(&self.data_dir, id);
        let _on_disk =
            LockFile::acquire(&lock_path, self.opts.lock_timeout).map_err(|e| match e {
                braid_lockfile::LockError::Busy { .. } => StoreError::Busy { id: id.to_string() },
                other => other.into(),
            })?;

        check(token)?;
        f(self)
    }

    // -- Write protocol ------------------------------------------------------

    /// Serialises `issue` to a temp file in the destination directory, then
    /// renames it into place. Cancellation between the two steps removes
    /// the temp file and leaves the original untouched.
    fn write_atomic(&self, path: &Path, issue: &Issue, token: &CancelToken) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(issue)?;

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json)?;
        if token.is_cancelled() {
            let _ = fs::remove_file(&tmp);
            return Err(StoreError::Cancelled);
        }
        fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Writes the replacement document, moving it between subtrees when the
    /// status class changed. The destination must not already hold a file:
    /// that is a [`StoreError::Conflict`].
    fn write_replacement(
        &self,
        id: &str,
        old_path: &Path,
        was_closed: bool,
        issue: &Issue,
        token: &CancelToken,
    ) -> Result<()> {
        let now_closed = issue.status.is_closed();
        if now_closed == was_closed {
            return self.write_atomic(old_path, issue, token);
        }

        let dest_subtree = if now_closed { CLOSED_DIR } else { OPEN_DIR };
        let dest = self.path_in(dest_subtree, id);
        if dest.exists() {
            return Err(StoreError::Conflict { path: dest });
        }
        self.write_atomic(&dest, issue, token)?;
        fs::remove_file(old_path)?;
        debug!(id = %id, closed = now_closed, "moved issue between subtrees");
        Ok(())
    }
}

fn check(token: &CancelToken) -> Result<()> {
    if token.is_cancelled() {
        Err(StoreError::Cancelled)
    } else {
        Ok(())
    }
}
