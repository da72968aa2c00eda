//! Checkpoint evaluation around the proxy handler.

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::http::request::request_id;
use crate::http::server::AppState;
use crate::waf::{Phase, Verdict, WafRequest, WafResponse};

/// Evaluate the request phase before the handler and the response phase after it.
/// A `Block` verdict in either phase turns into a 403.
pub async fn waf_middleware(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let runtime = state.runtime();
    if !runtime.waf.is_enabled() {
        return next.run(request).await;
    }

    let waf_request = WafRequest::from_head(request.method(), request.uri(), request.headers(), peer);
    let id = request_id(request.headers());

    if runtime.waf.inspect(Phase::Request, &waf_request, None) == Verdict::Block {
        tracing::warn!(request_id = %id, path = %request.uri().path(), "Request blocked by WAF");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    let response = next.run(request).await;

    let waf_response = WafResponse::new(response.status(), response.headers().clone());
    if runtime.waf.inspect(Phase::Response, &waf_request, Some(&waf_response)) == Verdict::Block {
        tracing::warn!(request_id = %id, status = %response.status(), "Response blocked by WAF");
        return (StatusCode::FORBIDDEN, "Forbidden").into_response();
    }

    response
}
