//! Engine error type.
//!
//! The engine is a library surface: lower-layer errors are forwarded
//! unchanged inside typed variants, never retried transparently.

use braid_config::ConfigError;
use braid_formula::FormulaError;
use braid_graph::GraphError;
use braid_storage::StoreError;

/// Errors surfaced by the engine layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Formula(#[from] FormulaError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An external helper CLI invocation failed.
    #[error("external command failed: {0}")]
    External(String),
}

/// Convenience alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// Returns `true` if the underlying cause is a missing issue.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}
