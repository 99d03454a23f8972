//! Listener contract driven by the shutdown coordinator.
//!
//! # Responsibilities
//! - Define the start / reject / stop contract every hosted listener honours
//! - Report admitted in-flight requests so the coordinator can drain them
//! - Describe listener failures
//!
//! # Design Decisions
//! - Object safe (boxed futures) so heterogeneous listeners share one set
//! - `start` resolving to `Ok(())` means "closed normally via `stop`"
//! - No timeout wraps `stop`; the coordinator's total budget bounds it

use futures_util::future::BoxFuture;
use thiserror::Error;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Failed to bind to the configured address.
    #[error("listener {name} failed to bind {address}: {source}")]
    Bind {
        name: String,
        address: String,
        #[source]
        source: std::io::Error,
    },

    /// Serving stopped with an I/O error instead of a requested stop.
    #[error("listener {name} exited abnormally: {source}")]
    Serve {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// `start` was called a second time.
    #[error("listener {name} was already started")]
    AlreadyStarted { name: String },

    /// `stop` was called on a listener that is not serving.
    #[error("listener {name} is not running")]
    NotRunning { name: String },
}

/// A network listener whose lifetime is managed by the coordinator.
pub trait Listener: Send + Sync + 'static {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Configured bind address.
    fn address(&self) -> &str;

    /// Serve until stopped. `Ok(())` means the listener was closed by `stop`.
    fn start(&self) -> BoxFuture<'_, Result<(), ServerError>>;

    /// Refuse every request arriving from now on. Idempotent.
    fn reject_requests(&self);

    /// Stop accepting and wait for the listener's own stop handshake.
    fn stop(&self) -> BoxFuture<'_, Result<(), ServerError>>;

    /// Requests admitted before rejection that are still running.
    fn in_flight(&self) -> u64 {
        0
    }
}
