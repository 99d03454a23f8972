//! Graceful shutdown for processes hosting several listeners.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::AppConfig;
pub use http::HttpListener;
pub use lifecycle::{CallbackContext, Coordinator, ExitStatus, ShutdownCallback, ShutdownOptions};
pub use net::{Listener, ServerError};
