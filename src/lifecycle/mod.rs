//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Coordinator::run → one task per listener
//!
//! Signals (signals.rs):
//!     first SIGINT/SIGTERM/SIGHUP/SIGQUIT/SIGABRT/SIGSYS → graceful shutdown
//!     any later one                                     → force quit
//!
//! Shutdown (shutdown.rs):
//!     reject (gate.rs) → drain → stop listeners → callbacks (callbacks.rs) → release
//!     raced against the total timeout and force quit
//! ```
//!
//! # Design Decisions
//! - Phases are strictly ordered, work inside a phase is concurrent
//! - Shutdown has a total budget: forced exit after the deadline
//! - Only the total timeout and force quit are fatal; phase errors are logged

pub mod callbacks;
pub mod gate;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use callbacks::{CallbackContext, CallbackOutcome, CallbackSummary, ShutdownCallback};
pub use gate::RejectGate;
pub use shutdown::{Coordinator, DrainOutcome, ExitStatus, ShutdownOptions};
pub use signals::{channel, ChannelSource, SignalSource, Termination, TerminationHandle, TerminationSource};
