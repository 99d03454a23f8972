//! HTTP listener implementation.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum serve loop, graceful stop)
//!     → middleware/admission.rs (reject gate, in-flight tracking)
//!     → registered handler
//!     → response.rs (fixed 503 while shutting down)
//! ```

pub mod middleware;
pub mod response;
pub mod server;

pub use response::UNAVAILABLE_BODY;
pub use server::{HttpListener, ServeState};
