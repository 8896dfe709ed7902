//! Graph error types.

use braid_storage::StoreError;

/// Errors from graph analysis.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The analysed subgraph contains a cycle.
    #[error("dependency graph contains a cycle")]
    Cycle,

    /// An underlying store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Convenience alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;
