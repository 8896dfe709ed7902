//! Configuration management for the braid issue tracker.
//!
//! Handles `.beads/config.yaml` loading and saving, `.beads/` directory
//! discovery, the `routes.jsonl` prefix routing table, and actor/owner
//! identity resolution.

pub mod actor;
pub mod config;
pub mod dir;
pub mod routes;

pub use config::{BraidConfig, ConfigError};
pub use routes::RouteEntry;
