//! Per-listener reject gate.
//!
//! Written once by the shutdown sequence, read by every request task. The
//! flag only ever moves from open to rejecting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag deciding whether new requests are admitted.
#[derive(Debug, Clone, Default)]
pub struct RejectGate {
    rejecting: Arc<AtomicBool>,
}

impl RejectGate {
    /// Create an open gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start rejecting. Returns `true` only for the call that flipped the gate.
    pub fn reject(&self) -> bool {
        !self.rejecting.swap(true, Ordering::SeqCst)
    }

    /// Whether new requests must be refused.
    pub fn is_rejecting(&self) -> bool {
        self.rejecting.load(Ordering::SeqCst)
    }
}
