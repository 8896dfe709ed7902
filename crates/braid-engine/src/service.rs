//! Issue service: the routing coordinator.
//!
//! Higher-layer code speaks only to [`IssueService`]. For each inbound id
//! the service consults the route table (`prefix -> data_dir`) and
//! dispatches to the owning store; unmatched prefixes fall through to the
//! local store. Errors are forwarded unchanged.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::debug;

use braid_config::routes::{self, RouteEntry};
use braid_config::{BraidConfig, actor, config, dir};
use braid_core::cancel::CancelToken;
use braid_core::comment::Comment;
use braid_core::enums::DependencyType;
use braid_core::filter::IssueFilter;
use braid_core::issue::Issue;
use braid_core::validation::ValidationPolicy;
use braid_storage::{FsStore, StoreOptions};

use crate::error::Result;

/// The routing coordinator over one local store and any routed stores.
pub struct IssueService {
    local: Arc<FsStore>,
    beads_dir: PathBuf,
    route_table: Vec<RouteEntry>,
    routed: Mutex<HashMap<String, Arc<FsStore>>>,
    actor: String,
}

impl IssueService {
    /// Builds a service from already-constructed parts.
    pub fn new(
        local: FsStore,
        beads_dir: impl Into<PathBuf>,
        route_table: Vec<RouteEntry>,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            local: Arc::new(local),
            beads_dir: beads_dir.into(),
            route_table,
            routed: Mutex::new(HashMap::new()),
            actor: actor.into(),
        }
    }

    /// Opens the service for a `.beads/` directory: loads `config.yaml`,
    /// builds the local store under the configured project directory,
    /// loads `routes.jsonl`, and resolves the actor identity.
    pub fn open(beads_dir: &Path) -> Result<Self> {
        let cfg = config::load_config(beads_dir)?;
        let local = FsStore::new(beads_dir.join(&cfg.project), store_options(&cfg));
        local.init()?;

        let route_table = routes::load_routes(&beads_dir.join("routes.jsonl"))?;
        let who = actor::resolve_actor(&cfg);

        Ok(Self::new(local, beads_dir, route_table, who))
    }

    /// Opens the service by discovering `.beads/` upward from `start`.
    pub fn discover(start: &Path) -> Result<Self> {
        let beads_dir = dir::find_beads_dir_or_error(start)?;
        Self::open(&beads_dir)
    }

    /// The local store.
    pub fn local(&self) -> &FsStore {
        &self.local
    }

    /// The resolved actor identity.
    pub fn actor(&self) -> &str {
        &self.actor
    }

    /// The `.beads/` directory this service was opened on.
    pub fn beads_dir(&self) -> &Path {
        &self.beads_dir
    }

    /// Default formula search path: project `.beads/formulas/`, then the
    /// user-level `~/.beads/formulas/`.
    pub fn formula_search_path(&self) -> Vec<PathBuf> {
        let mut path = vec![self.beads_dir.join("formulas")];
        if let Ok(home) = std::env::var("HOME") {
            path.push(PathBuf::from(home).join(".beads").join("formulas"));
        }
        path
    }

    /// Resolves the store owning `id`: a routed store when the prefix has
    /// a route entry, the local store otherwise.
    pub fn store_for(&self, id: &str) -> Result<Arc<FsStore>> {
        let Some(prefix) = routes::extract_prefix(id) else {
            return Ok(Arc::clone(&self.local));
        };
        let Some(entry) = routes::find_route(&self.route_table, &prefix) else {
            return Ok(Arc::clone(&self.local));
        };

        let mut cache = self
            .routed
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(store) = cache.get(&prefix) {
            return Ok(Arc::clone(store));
        }

        let data_dir = routes::resolve_data_dir(entry, &self.beads_dir);
        debug!(prefix = %prefix, data_dir = %data_dir.display(), "opening routed store");

        let mut opts = self.local.options().clone();
        opts.prefix = prefix.clone();
        let store = Arc::new(FsStore::new(data_dir, opts));
        store.init()?;
        cache.insert(prefix, Arc::clone(&store));
        Ok(store)
    }

    // -- Forwarding API ------------------------------------------------------

    /// Creates an issue in the owning store (by its id prefix when the
    /// caller supplied an id, locally otherwise), stamping `created_by`.
    pub fn create(&self, mut issue: Issue, token: &CancelToken) -> Result<String> {
        if issue.created_by.is_empty() {
            issue.created_by = self.actor.clone();
        }
        let store = if issue.id.is_empty() {
            Arc::clone(&self.local)
        } else {
            self.store_for(&issue.id)?
        };
        Ok(store.create(issue, token)?)
    }

    pub fn get(&self, id: &str, token: &CancelToken) -> Result<Issue> {
        Ok(self.store_for(id)?.get(id, token)?)
    }

    /// Lists issues in the local store.
    pub fn list(&self, filter: &IssueFilter, token: &CancelToken) -> Result<Vec<Issue>> {
        Ok(self.local.list(filter, token)?)
    }

    pub fn modify<F>(&self, id: &str, token: &CancelToken, f: F) -> Result<Issue>
    where
        F: FnOnce(&mut Issue) -> braid_storage::Result<()>,
    {
        Ok(self.store_for(id)?.modify(id, token, f)?)
    }

    pub fn close(&self, id: &str, reason: &str, token: &CancelToken) -> Result<Issue> {
        Ok(self.store_for(id)?.close(id, reason, token)?)
    }

    pub fn reopen(&self, id: &str, token: &CancelToken) -> Result<Issue> {
        Ok(self.store_for(id)?.reopen(id, token)?)
    }

    pub fn delete(&self, id: &str, token: &CancelToken) -> Result<()> {
        Ok(self.store_for(id)?.delete(id, token)?)
    }

    pub fn soft_delete(&self, id: &str, token: &CancelToken) -> Result<Issue> {
        Ok(self.store_for(id)?.soft_delete(id, token)?)
    }

    pub fn add_comment(&self, id: &str, text: &str, token: &CancelToken) -> Result<Comment> {
        let comment = Comment::new(self.actor.clone(), text);
        Ok(self.store_for(id)?.add_comment(id, comment, token)?)
    }

    pub fn add_dependency(
        &self,
        from: &str,
        to: &str,
        dep_type: DependencyType,
        token: &CancelToken,
    ) -> Result<()> {
        Ok(self.store_for(from)?.add_dependency(from, to, dep_type, token)?)
    }

    pub fn remove_dependency(
        &self,
        from: &str,
        to: &str,
        dep_type: DependencyType,
        token: &CancelToken,
    ) -> Result<()> {
        Ok(self
            .store_for(from)?
            .remove_dependency(from, to, dep_type, token)?)
    }

    pub fn set_parent(&self, child: &str, parent: &str, token: &CancelToken) -> Result<()> {
        Ok(self.store_for(child)?.set_parent(child, parent, token)?)
    }

    pub fn remove_parent(&self, child: &str, token: &CancelToken) -> Result<()> {
        Ok(self.store_for(child)?.remove_parent(child, token)?)
    }

    pub fn next_child_id(&self, parent: &str, token: &CancelToken) -> Result<String> {
        Ok(self.store_for(parent)?.next_child_id(parent, token)?)
    }
}

/// Maps configuration onto store options.
pub fn store_options(cfg: &BraidConfig) -> StoreOptions {
    StoreOptions {
        prefix: cfg.id_prefix(),
        max_depth: cfg.hierarchy.max_depth,
        lock_timeout: std::time::Duration::from_secs(cfg.locks.acquire_timeout_secs),
        stale_lock_age: std::time::Duration::from_secs(cfg.locks.stale_after_secs),
        policy: ValidationPolicy {
            custom_statuses: cfg.custom_statuses(),
            custom_types: cfg.custom_types(),
            require_description: cfg.create.require_description,
        },
    }
}
