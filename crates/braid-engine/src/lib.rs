//! Engine layer for the braid issue tracker.
//!
//! Ties the lower crates together: the [`service::IssueService`] routing
//! coordinator, the formula [`pour`] engine, the [`gate`] evaluator, the
//! consistency [`doctor`], ephemeral-molecule [`gc`], and agent
//! coordination records.

pub mod agent;
pub mod doctor;
pub mod error;
pub mod gate;
pub mod gc;
pub mod pour;
pub mod service;

pub use doctor::{Finding, FindingKind, doctor};
pub use error::{EngineError, Result};
pub use gate::{GateDisposition, GateEvaluator, GateOutcome, GateRunOptions, HostedGitCli, SystemGh};
pub use gc::gc_ephemeral;
pub use pour::{PourOptions, PourOutcome, pour};
pub use service::IssueService;
