//! HTTP listener hosted by the shutdown coordinator.
//!
//! # Responsibilities
//! - Collect handler registrations before the listener is started
//! - Bind the configured address and serve with axum
//! - Wrap every route with the admission middleware (reject gate + tracking)
//! - Stop on request and report when serving has fully ended
//!
//! # Design Decisions
//! - Registration takes `self` by value; once shared behind `Arc` the route
//!   table is frozen
//! - Run state is published on a watch channel so `stop` can wait for the
//!   serve loop to finish without polling
//! - Stop requests are a second watch channel, so a stop issued before the
//!   serve loop subscribes is never lost

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use axum::{
    handler::Handler,
    middleware,
    routing::{any, MethodRouter},
    Router,
};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use crate::http::middleware::{admission_middleware, AdmissionState};
use crate::lifecycle::gate::RejectGate;
use crate::net::listener::{Listener, ServerError};
use crate::net::tracker::InFlightTracker;

/// Lifecycle of one HTTP listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeState {
    /// Constructed, `start` not called yet.
    Idle,
    /// `start` called, socket not bound yet.
    Starting,
    /// Accepting connections.
    Serving,
    /// Closed by `stop`.
    Stopped,
    /// Failed to bind or exited with an error.
    Failed,
}

impl ServeState {
    fn is_finished(self) -> bool {
        matches!(self, ServeState::Stopped | ServeState::Failed)
    }
}

/// An axum server wrapped with a reject gate.
pub struct HttpListener {
    name: Arc<str>,
    address: String,
    router: Mutex<Option<Router>>,
    gate: RejectGate,
    tracker: InFlightTracker,
    local_addr: OnceLock<SocketAddr>,
    state_tx: watch::Sender<ServeState>,
    stop_tx: watch::Sender<bool>,
}

impl HttpListener {
    /// Create a listener that will bind `address` when started.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        let name: String = name.into();
        let (state_tx, _) = watch::channel(ServeState::Idle);
        let (stop_tx, _) = watch::channel(false);
        Self {
            name: Arc::from(name),
            address: address.into(),
            router: Mutex::new(Some(Router::new())),
            gate: RejectGate::new(),
            tracker: InFlightTracker::new(),
            local_addr: OnceLock::new(),
            state_tx,
            stop_tx,
        }
    }

    /// Register a method router for `path`.
    pub fn route(mut self, path: &str, method_router: MethodRouter) -> Self {
        let slot = self.router.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(router) = slot.take() {
            *slot = Some(router.route(path, method_router));
        }
        self
    }

    /// Register a handler answering every method on `path`.
    pub fn handle<H, T>(self, path: &str, handler: H) -> Self
    where
        H: Handler<T, ()>,
        T: 'static,
    {
        self.route(path, any(handler))
    }

    /// Address actually bound, once serving (useful with port 0).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ServeState {
        *self.state_tx.borrow()
    }

    /// Wait until the listener is serving or has given up.
    pub async fn wait_until_serving(&self) -> Option<SocketAddr> {
        let mut state_rx = self.state_tx.subscribe();
        let ready = state_rx
            .wait_for(|state| matches!(state, ServeState::Serving) || state.is_finished())
            .await
            .map(|state| *state == ServeState::Serving)
            .unwrap_or(false);
        if ready {
            self.local_addr()
        } else {
            None
        }
    }

    async fn serve(&self) -> Result<(), ServerError> {
        let router = self
            .router
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(router) = router else {
            return Err(ServerError::AlreadyStarted {
                name: self.name.to_string(),
            });
        };
        if *self.stop_tx.borrow() {
            self.state_tx.send_replace(ServeState::Stopped);
            tracing::info!(listener = %self.name, "Listener stopped before it started serving");
            return Ok(());
        }
        self.state_tx.send_replace(ServeState::Starting);

        let listener = match TcpListener::bind(&self.address).await {
            Ok(listener) => listener,
            Err(source) => {
                self.state_tx.send_replace(ServeState::Failed);
                return Err(ServerError::Bind {
                    name: self.name.to_string(),
                    address: self.address.clone(),
                    source,
                });
            }
        };
        if let Ok(addr) = listener.local_addr() {
            let _ = self.local_addr.set(addr);
        }

        let admission = AdmissionState {
            listener: Arc::clone(&self.name),
            gate: self.gate.clone(),
            tracker: self.tracker.clone(),
        };
        let app = router
            .layer(middleware::from_fn_with_state(admission, admission_middleware))
            .layer(TraceLayer::new_for_http());

        let mut stop_rx = self.stop_tx.subscribe();
        let stop_requested = async move {
            let _ = stop_rx.wait_for(|stop| *stop).await;
        };

        self.state_tx.send_replace(ServeState::Serving);
        tracing::info!(
            listener = %self.name,
            address = %self.local_addr().map(|a| a.to_string()).unwrap_or_else(|| self.address.clone()),
            "Listener serving"
        );

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(stop_requested)
            .await;

        match result {
            Ok(()) => {
                self.state_tx.send_replace(ServeState::Stopped);
                tracing::info!(listener = %self.name, "Listener closed");
                Ok(())
            }
            Err(source) => {
                self.state_tx.send_replace(ServeState::Failed);
                Err(ServerError::Serve {
                    name: self.name.to_string(),
                    source,
                })
            }
        }
    }

    async fn shutdown(&self) -> Result<(), ServerError> {
        if matches!(self.state(), ServeState::Idle | ServeState::Failed) {
            // a start that has not been polled yet must not serve after this
            self.stop_tx.send_replace(true);
            return Err(ServerError::NotRunning {
                name: self.name.to_string(),
            });
        }

        tracing::info!(listener = %self.name, address = %self.address, "Stopping listener");
        self.stop_tx.send_replace(true);

        let mut state_rx = self.state_tx.subscribe();
        let stopped = state_rx
            .wait_for(|state| state.is_finished())
            .await
            .map(|state| *state == ServeState::Stopped)
            .unwrap_or(false);

        if stopped {
            Ok(())
        } else {
            Err(ServerError::NotRunning {
                name: self.name.to_string(),
            })
        }
    }
}

impl Listener for HttpListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn address(&self) -> &str {
        &self.address
    }

    fn start(&self) -> BoxFuture<'_, Result<(), ServerError>> {
        self.serve().boxed()
    }

    fn reject_requests(&self) {
        if self.gate.reject() {
            tracing::info!(listener = %self.name, "Listener rejecting new requests");
        }
    }

    fn stop(&self) -> BoxFuture<'_, Result<(), ServerError>> {
        self.shutdown().boxed()
    }

    fn in_flight(&self) -> u64 {
        self.tracker.active_count()
    }
}

impl std::fmt::Debug for HttpListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpListener")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("state", &self.state())
            .field("rejecting", &self.gate.is_rejecting())
            .finish()
    }
}
