//! WebSocket bridging.
//!
//! # Data Flow
//! ```text
//! Upgrade request
//!     → upgrade.rs (origin check, header normalisation, accept key)
//!     → DirectTunnel: admission + backend dial → tunnel.rs relay
//!     → HttpEmulation: emulation.rs queue + worker → Bridge::forward_http
//!     → 101 returned, session continues on its own task
//! ```
//!
//! # Design Decisions
//! - Admission and the backend dial happen before the client is answered,
//!   so those failures are plain HTTP errors
//! - The forward mode is fixed when the session starts

pub mod emulation;
pub mod tunnel;
pub mod upgrade;

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::request::Parts;
use axum::http::Response;
use hyper::upgrade::{OnUpgrade, Upgraded};
use hyper_util::rt::TokioIo;
use tokio_tungstenite::tungstenite::protocol::Role;
use tokio_tungstenite::WebSocketStream;

use crate::config::ForwardMode;
use crate::error::ProxyError;
use crate::http::bridge::Bridge;
use crate::http::context::RequestContext;
use crate::observability::metrics;

pub use upgrade::is_upgrade_request;

type ClientSocket = WebSocketStream<TokioIo<Upgraded>>;

/// Accept a websocket session for `ctx` and start bridging it in the background.
pub async fn serve(bridge: &Bridge, ctx: Arc<RequestContext>, mut parts: Parts) -> Result<Response<Body>, ProxyError> {
    let ws = ctx
        .websocket
        .clone()
        .ok_or_else(|| ProxyError::Upgrade("route does not accept websockets".into()))?;
    let backend = ctx
        .backend
        .clone()
        .ok_or_else(|| ProxyError::NoBackend(ctx.backend_group.clone().unwrap_or_default()))?;

    upgrade::normalize_upgrade_headers(&mut parts.headers);
    upgrade::check_origin(&ws, &parts.headers)?;
    let accept = upgrade::accept_key(&parts.method, &parts.headers)?;
    let on_upgrade = parts
        .extensions
        .remove::<OnUpgrade>()
        .ok_or_else(|| ProxyError::Upgrade("connection cannot be upgraded".into()))?;

    let mode = ws.forward_mode;
    let handshake_timeout = ws.handshake_timeout();

    match mode {
        ForwardMode::DirectTunnel => {
            let guard = backend
                .try_acquire()
                .ok_or_else(|| ProxyError::AdmissionRejected(backend.name.clone()))?;

            let backend_socket = match tunnel::connect_backend(&ctx, &backend).await {
                Ok(socket) => socket,
                Err(e) => {
                    if e.is_backend_failure() {
                        bridge.pool().increase_fails(&backend, ctx.failure_scope());
                    }
                    return Err(e);
                }
            };

            metrics::record_websocket_open(mode.as_str());
            tokio::spawn(async move {
                let _guard = guard;
                if let Some(client) = accept_client(on_upgrade, handshake_timeout, &ctx).await {
                    tunnel::relay(client, backend_socket, ctx).await;
                }
                metrics::record_websocket_closed();
            });
        }
        ForwardMode::HttpEmulation => {
            let forwarder = emulation::HttpForwarder::new(bridge.clone(), ctx.clone());
            let deadline = bridge.request_timeout();

            metrics::record_websocket_open(mode.as_str());
            tokio::spawn(async move {
                if let Some(client) = accept_client(on_upgrade, handshake_timeout, &ctx).await {
                    emulation::run(client, forwarder, deadline, ctx).await;
                }
                metrics::record_websocket_closed();
            });
        }
    }

    tracing::debug!(backend = %backend.name, mode = mode.as_str(), "Websocket session accepted");
    Ok(upgrade::switching_protocols(accept))
}

async fn accept_client(on_upgrade: OnUpgrade, deadline: Duration, ctx: &RequestContext) -> Option<ClientSocket> {
    match tokio::time::timeout(deadline, on_upgrade).await {
        Ok(Ok(upgraded)) => Some(WebSocketStream::from_raw_socket(TokioIo::new(upgraded), Role::Server, None).await),
        Ok(Err(e)) => {
            ctx.add_error(format!("client upgrade failed: {}", e));
            None
        }
        Err(_) => {
            ctx.add_error(format!("client upgrade timed out after {:?}", deadline));
            None
        }
    }
}
