//! Backend responses on their way back to the client.

use axum::body::Body;
use axum::http::Response;
use hyper::body::Incoming;

use crate::http::headers::strip_hop_by_hop;

/// Relay status and body unchanged; only hop-by-hop headers are dropped.
pub fn relay(response: Response<Incoming>) -> Response<Body> {
    let (mut parts, body) = response.into_parts();
    strip_hop_by_hop(&mut parts.headers);
    Response::from_parts(parts, Body::new(body))
}
