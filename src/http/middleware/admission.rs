//! Admission middleware.
//! Applies the reject gate at the dispatch boundary and tracks admitted requests.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::http::response::unavailable;
use crate::lifecycle::gate::RejectGate;
use crate::net::tracker::InFlightTracker;
use crate::observability::metrics;

/// State shared between a listener and its admission middleware.
#[derive(Clone, Debug)]
pub struct AdmissionState {
    pub listener: Arc<str>,
    pub gate: RejectGate,
    pub tracker: InFlightTracker,
}

/// Refuse requests once the gate is rejecting, forward everything else unchanged.
pub async fn admission_middleware(
    State(state): State<AdmissionState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // Count before reading the gate: a request that sees the gate open is
    // already visible to the drain phase.
    let guard = state.tracker.track();

    let request_id = guard.id();

    if state.gate.is_rejecting() {
        drop(guard);
        tracing::debug!(
            listener = %state.listener,
            request_id = %request_id,
            method = %request.method(),
            path = %request.uri().path(),
            "Listener is shutting down, rejecting request"
        );
        metrics::record_rejected(&state.listener);
        return unavailable();
    }

    let response = next.run(request).await;
    drop(guard);
    tracing::trace!(
        listener = %state.listener,
        request_id = %request_id,
        status = response.status().as_u16(),
        "Request served"
    );
    response
}
