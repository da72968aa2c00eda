//! DirectTunnel mode: one backend websocket per client session.
//!
//! ```text
//! client ──(pump, spawned)──▶ backend
//! client ◀──(pump, inline)─── backend
//! ```
//!
//! Either pump ending stops the other and closes both sockets. Each socket is
//! closed at most once, arbitrated by [`CloseState`].

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{watch, Mutex};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{client_async, WebSocketStream};

use crate::error::ProxyError;
use crate::http::context::RequestContext;
use crate::http::headers;
use crate::load_balancer::Backend;
use crate::net::dial::{dial, BackendStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Backend,
}

impl Side {
    fn bit(self) -> u8 {
        match self {
            Side::Client => 0b01,
            Side::Backend => 0b10,
        }
    }
}

/// Two-side close state in a single atomic.
#[derive(Debug, Default)]
pub struct CloseState(AtomicU8);

impl CloseState {
    /// Claim the close of `side`. Only the first caller per side gets `true`.
    pub fn claim(&self, side: Side) -> bool {
        self.0.fetch_or(side.bit(), Ordering::AcqRel) & side.bit() == 0
    }

    pub fn is_closed(&self, side: Side) -> bool {
        self.0.load(Ordering::Acquire) & side.bit() != 0
    }
}

/// Open the backend websocket for `ctx`. Dial and handshake share the backend's fail timeout.
pub async fn connect_backend(
    ctx: &RequestContext,
    backend: &Backend,
) -> Result<WebSocketStream<BackendStream>, ProxyError> {
    let host = match backend.host.as_deref() {
        Some(host) => ctx.format(host),
        None => ctx.host(),
    };
    let host = if host.is_empty() { backend.address.clone() } else { host };

    let url = format!("{}://{}{}", backend.scheme.ws(), host, ctx.request_uri());
    let mut request = url
        .as_str()
        .into_client_request()
        .map_err(|e| ProxyError::InvalidRequest(format!("{}: {}", url, e)))?;

    let outbound = request.headers_mut();
    headers::copy_tunnel_headers(&ctx.headers, outbound);
    headers::set_proxy_headers(outbound, ctx);
    headers::apply_custom_headers(outbound, ctx);

    let stream = dial(&backend.address, backend.fail_timeout, backend.tls_target(&host)).await?;

    let (socket, _response) = timeout(backend.fail_timeout, client_async(request, stream))
        .await
        .map_err(|_| ProxyError::Handshake(format!("{}: timed out", backend.address)))?
        .map_err(|e| ProxyError::Handshake(format!("{}: {}", backend.address, e)))?;

    Ok(socket)
}

type WsSink<S> = futures_util::stream::SplitSink<WebSocketStream<S>, Message>;

struct Session<C, B> {
    client: Mutex<WsSink<C>>,
    backend: Mutex<WsSink<B>>,
    closed: CloseState,
    stop: watch::Sender<bool>,
}

impl<C, B> Session<C, B>
where
    C: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    /// Stop both pumps, then close each side if nobody has yet.
    async fn shutdown(&self) {
        self.stop.send_replace(true);
        self.close(Side::Client).await;
        self.close(Side::Backend).await;
    }

    async fn close(&self, side: Side) {
        if !self.closed.claim(side) {
            return;
        }
        let result = match side {
            Side::Client => self.client.lock().await.close().await,
            Side::Backend => self.backend.lock().await.close().await,
        };
        if let Err(e) = result {
            if !is_closed_error(&e) {
                tracing::debug!(?side, error = %e, "Websocket close failed");
            }
        }
    }
}

/// Relay frames between `client` and `backend` until either side ends.
pub async fn relay<C, B>(client: WebSocketStream<C>, backend: WebSocketStream<B>, ctx: Arc<RequestContext>)
where
    C: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    B: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (client_tx, client_rx) = client.split();
    let (backend_tx, backend_rx) = backend.split();
    let (stop, _) = watch::channel(false);

    let session = Arc::new(Session {
        client: Mutex::new(client_tx),
        backend: Mutex::new(backend_tx),
        closed: CloseState::default(),
        stop,
    });

    let upstream = {
        let session = session.clone();
        let ctx = ctx.clone();
        let stop = session.stop.subscribe();
        tokio::spawn(async move {
            pump(client_rx, &session.backend, stop, &ctx, "client").await;
            session.shutdown().await;
        })
    };

    let stop = session.stop.subscribe();
    pump(backend_rx, &session.client, stop, &ctx, "backend").await;
    session.shutdown().await;

    if let Err(e) = upstream.await {
        tracing::error!(request_id = %ctx.request_id, error = %e, "Client pump panicked");
    }

    tracing::debug!(request_id = %ctx.request_id, "Tunnel closed");
}

/// Copy text and binary frames from `source` into `target` until the source
/// ends, a write fails, or the session is stopped.
async fn pump<S, T>(
    mut source: S,
    target: &Mutex<T>,
    mut stop: watch::Receiver<bool>,
    ctx: &RequestContext,
    from: &'static str,
) where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
    T: Sink<Message, Error = WsError> + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = stop.changed() => break,
            next = source.next() => next,
        };

        let message = match next {
            Some(Ok(message @ (Message::Text(_) | Message::Binary(_)))) => message,
            Some(Ok(Message::Close(frame))) => {
                record_close(ctx, from, frame.as_ref());
                break;
            }
            Some(Ok(_)) => continue,
            Some(Err(e)) => {
                if !is_closed_error(&e) {
                    ctx.add_error(format!("{} read: {}", from, e));
                }
                break;
            }
            None => break,
        };

        let sent = tokio::select! {
            biased;
            _ = stop.changed() => break,
            sent = async { target.lock().await.send(message).await } => sent,
        };
        if let Err(e) = sent {
            if !is_closed_error(&e) {
                ctx.add_error(format!("{} write: {}", from, e));
            }
            break;
        }
    }
}

/// Going-away closes are routine; every other code is kept.
pub(crate) fn record_close(ctx: &RequestContext, from: &str, frame: Option<&CloseFrame>) {
    let code = frame.map(|f| f.code).unwrap_or(CloseCode::Status);
    if code != CloseCode::Away {
        ctx.add_error(format!("{} closed with code {}", from, u16::from(code)));
    }
}

pub(crate) fn is_closed_error(error: &WsError) -> bool {
    matches!(error, WsError::ConnectionClosed | WsError::AlreadyClosed)
}
