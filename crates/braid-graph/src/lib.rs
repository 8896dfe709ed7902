//! Dependency graph services for the braid issue tracker.
//!
//! Read-only, lock-free analyses over store snapshots: readiness, cycle
//! detection, topological order and waves, molecule traversal, and step
//! classification. Callers that need a consistent snapshot should `list`
//! once and analyse the result.

pub mod analysis;
pub mod error;
pub mod molecule;

pub use analysis::{closed_set, is_cycle, ready, topological_order, topological_waves};
pub use error::{GraphError, Result};
pub use molecule::{
    MoleculeProgress, StepBuckets, StepState, classify_step, classify_steps,
    collect_molecule_children, find_molecule_root, find_next_step, molecule_progress,
};
