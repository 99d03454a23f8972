//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Listeners, coordinator, callbacks produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (rejections, phase durations, exit outcome)
//!
//! Consumers:
//!     → stdout
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```

pub mod logging;
pub mod metrics;
