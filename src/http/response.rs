//! Fixed responses produced by the listener itself.
//!
//! # Responsibilities
//! - Build the "service unavailable" reply sent while a listener is rejecting
//!
//! # Design Decisions
//! - Body is constant so clients and tests can recognise it
//! - `Connection: close` so keep-alive clients reconnect elsewhere

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::Response,
};

/// Body of every request refused during shutdown.
pub const UNAVAILABLE_BODY: &str = "Service is shutting down";

/// Response returned for requests arriving after the reject gate flipped.
pub fn unavailable() -> Response {
    let mut response = Response::new(Body::from(UNAVAILABLE_BODY));
    *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
