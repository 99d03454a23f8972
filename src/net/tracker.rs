//! In-flight request tracking.
//!
//! # Responsibilities
//! - Count requests admitted past the reject gate
//! - Release the slot when the request finishes (or its future is dropped)
//! - Expose the count to the drain phase of the shutdown sequence
//!
//! # Design Decisions
//! - One tracker per listener, shared with its admission middleware
//! - Guards decrement on drop, so a panicking handler still releases its slot

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Global counter for request IDs.
/// Relaxed ordering is enough, IDs only need to be unique.
static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier attached to a tracked request, carried in admission logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestId(u64);

impl RequestId {
    /// Generate a new unique request ID.
    pub fn new() -> Self {
        Self(REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "req-{}", self.0)
    }
}

/// Tracks requests currently being served by one listener.
#[derive(Debug, Clone, Default)]
pub struct InFlightTracker {
    active_count: Arc<AtomicU64>,
}

impl InFlightTracker {
    /// Create a new tracker with no requests in flight.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly admitted request. Returns a guard that releases it on drop.
    pub fn track(&self) -> RequestGuard {
        self.active_count.fetch_add(1, Ordering::SeqCst);
        let id = RequestId::new();
        tracing::trace!(request_id = %id, "Request admitted");
        RequestGuard {
            active_count: Arc::clone(&self.active_count),
            id,
        }
    }

    /// Number of admitted requests that have not finished yet.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// True when no admitted request is still running.
    pub fn is_idle(&self) -> bool {
        self.active_count() == 0
    }
}

/// Guard held for the lifetime of one admitted request.
#[derive(Debug)]
pub struct RequestGuard {
    active_count: Arc<AtomicU64>,
    id: RequestId,
}

impl RequestGuard {
    /// Get this request's ID.
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        self.active_count.fetch_sub(1, Ordering::SeqCst);
        tracing::trace!(request_id = %self.id, "Request finished");
    }
}
