//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → reject gate (lifecycle::gate)
//!     → tracker.rs (admitted requests counted until they finish)
//!     → listener handler
//!
//! Listener States:
//!     Idle → Starting → Serving → Stopped | Failed
//! ```
//!
//! # Design Decisions
//! - listener.rs holds the contract, http::server holds the axum implementation
//! - Each admitted request is tracked for the drain phase

pub mod listener;
pub mod tracker;

pub use listener::{Listener, ServerError};
pub use tracker::{InFlightTracker, RequestGuard, RequestId};
