//! Core types for the braid issue tracker.
//!
//! This crate contains the domain model shared by every other braid crate:
//! the issue document, its enums, filters, validation rules, content-hash
//! ID generation, and the cancellation token threaded through store
//! operations.

pub mod cancel;
pub mod comment;
pub mod dependency;
pub mod enums;
pub mod filter;
pub mod idgen;
pub mod issue;
pub mod validation;
