//! Listener startup.
//!
//! # Responsibilities
//! - Start every listener on its own task
//! - Log how each listener's serve loop ended
//!
//! # Design Decisions
//! - A listener that fails to start is logged, never fatal to the process
//! - Startup does not wait for binding; the coordinator only needs the tasks

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::net::listener::Listener;

/// Spawn one serving task per listener, in registration order.
pub fn spawn_listeners(listeners: &[Arc<dyn Listener>]) -> Vec<JoinHandle<()>> {
    listeners
        .iter()
        .map(|listener| {
            let listener = Arc::clone(listener);
            tokio::spawn(async move {
                match listener.start().await {
                    Ok(()) => tracing::info!(listener = %listener.name(), "Listener shut down"),
                    Err(e) => tracing::error!(
                        listener = %listener.name(),
                        address = %listener.address(),
                        error = %e,
                        "Listener exited abnormally"
                    ),
                }
            })
        })
        .collect()
}
