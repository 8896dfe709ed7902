//! Caller-supplied cancellation tokens.
//!
//! Store operations check the token between filesystem steps and unwind
//! (releasing locks, removing temp files) when it has been cancelled.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A clonable cancellation flag shared between a caller and the operations
/// it drives. Cloning is cheap; all clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
