//! Protocol bridge: the HTTP path to a backend.
//!
//! WebSocket sessions live in [`crate::http::websocket`]; they reuse
//! [`Bridge::forward_http`] for the emulation mode.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{self, HeaderValue};
use axum::http::{Method, Request, Response};
use hyper::body::{Body as HttpBody, Incoming};

use crate::error::ProxyError;
use crate::http::context::RequestContext;
use crate::http::{headers, response};
use crate::load_balancer::{Backend, BackendPool};

#[derive(Debug, Clone)]
pub struct Bridge {
    pool: Arc<BackendPool>,
    request_timeout: Duration,
}

impl Bridge {
    pub fn new(pool: Arc<BackendPool>, request_timeout: Duration) -> Self {
        Self { pool, request_timeout }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        &self.pool
    }

    /// Deadline for one backend exchange. Emulated websocket messages use it
    /// since they run outside the HTTP timeout layer.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Proxy a plain HTTP request and relay the backend response.
    pub async fn proxy_http(
        &self,
        ctx: &RequestContext,
        method: Method,
        body: Body,
    ) -> Result<Response<Body>, ProxyError> {
        self.forward_http(ctx, method, body).await.map(response::relay)
    }

    /// Send one request to the context's backend.
    ///
    /// Connect failures count against the backend before the error is returned.
    pub async fn forward_http(
        &self,
        ctx: &RequestContext,
        method: Method,
        body: Body,
    ) -> Result<Response<Incoming>, ProxyError> {
        let backend = ctx
            .backend
            .clone()
            .ok_or_else(|| ProxyError::NoBackend(ctx.backend_group.clone().unwrap_or_default()))?;

        let _guard = backend.acquire();
        let request = upstream_request(ctx, &backend, method, body)?;

        tracing::debug!(
            request_id = %ctx.request_id,
            backend = %backend.name,
            uri = %request.uri(),
            "Forwarding request"
        );

        match backend.client().request(request).await {
            Ok(response) => Ok(response),
            Err(e) => {
                if e.is_connect() {
                    self.pool.increase_fails(&backend, ctx.failure_scope());
                }
                Err(ProxyError::Upstream(format!("{}: {}", backend.address, e)))
            }
        }
    }
}

fn upstream_request(
    ctx: &RequestContext,
    backend: &Backend,
    method: Method,
    body: Body,
) -> Result<Request<Body>, ProxyError> {
    let uri = format!("{}://{}{}", backend.scheme.http(), backend.address, ctx.request_uri());

    let mut headers = ctx.headers.clone();
    headers::strip_hop_by_hop(&mut headers);

    if let Some(host) = backend.host.as_deref() {
        let host = ctx.format(host);
        match HeaderValue::from_str(&host) {
            Ok(value) => {
                headers.insert(header::HOST, value);
            }
            Err(_) => tracing::warn!(backend = %backend.name, host = %host, "Invalid host override"),
        }
    }

    headers::set_proxy_headers(&mut headers, ctx);
    headers::apply_custom_headers(&mut headers, ctx);

    // The body may not be the one the inbound headers describe.
    match HttpBody::size_hint(&body).exact() {
        Some(0) => {
            headers.remove(header::CONTENT_LENGTH);
        }
        Some(len) => {
            headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
        }
        None => {}
    }

    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .body(body)
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;
    *request.headers_mut() = headers;
    Ok(request)
}
