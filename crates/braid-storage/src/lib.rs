//! Filesystem issue store for the braid issue tracker.
//!
//! Issues live one-per-file under `open/<shard>/` and `closed/<shard>/`,
//! guarded by per-id advisory locks and written with temp-then-rename so a
//! reader never observes a torn document. The auxiliary [`kv::KvStore`]
//! carries small coordination records (agent state, slots) beside the
//! issue tree.

pub mod compact;
pub mod error;
pub mod kv;
pub mod layout;
pub mod store;

pub use error::{Result, StoreError};
pub use kv::KvStore;
pub use store::{FsStore, StoreOptions};
