//! HttpEmulation mode: each client message becomes one backend `PUT`.
//!
//! The client-read loop feeds a bounded queue; a single worker drains it in
//! order. A full queue blocks the reader, which in turn stops reading from the
//! client socket.
//!
//! Each backend call is bounded by a deadline and abandoned as soon as the
//! client side quits, so a stalled backend cannot pin the session.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Method, StatusCode};
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::{SinkExt, StreamExt};
use http_body_util::BodyExt;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::error::ProxyError;
use crate::http::bridge::Bridge;
use crate::http::context::RequestContext;
use crate::http::websocket::tunnel::{is_closed_error, record_close};

pub const QUEUE_CAPACITY: usize = 1024;

/// Delivers one queued message to the backend and returns its status and body.
pub trait MessageForwarder: Send + Sync + 'static {
    fn forward(&self, message: Bytes) -> BoxFuture<'_, Result<(StatusCode, Bytes), ProxyError>>;
}

/// Forwards through the regular HTTP path.
pub struct HttpForwarder {
    bridge: Bridge,
    ctx: Arc<RequestContext>,
}

impl HttpForwarder {
    pub fn new(bridge: Bridge, ctx: Arc<RequestContext>) -> Self {
        Self { bridge, ctx }
    }
}

impl MessageForwarder for HttpForwarder {
    fn forward(&self, message: Bytes) -> BoxFuture<'_, Result<(StatusCode, Bytes), ProxyError>> {
        Box::pin(async move {
            let response = self
                .bridge
                .forward_http(&self.ctx, Method::PUT, Body::from(message))
                .await?;
            let status = response.status();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| ProxyError::Upstream(e.to_string()))?
                .to_bytes();
            Ok((status, body))
        })
    }
}

/// Run an emulated session. Messages not answered within `deadline` are dropped and recorded.
pub async fn run<S, F>(client: WebSocketStream<S>, forwarder: F, deadline: Duration, ctx: Arc<RequestContext>)
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: MessageForwarder,
{
    run_with_capacity(client, forwarder, deadline, ctx, QUEUE_CAPACITY).await
}

pub(crate) async fn run_with_capacity<S, F>(
    client: WebSocketStream<S>,
    forwarder: F,
    deadline: Duration,
    ctx: Arc<RequestContext>,
    capacity: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    F: MessageForwarder,
{
    let (mut client_tx, mut client_rx) = client.split();
    let (queue_tx, mut queue_rx) = mpsc::channel::<Bytes>(capacity);
    let (quit_tx, mut quit_rx) = oneshot::channel::<()>();

    let worker = {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            loop {
                let message = tokio::select! {
                    Some(message) = queue_rx.recv() => message,
                    _ = &mut quit_rx => break,
                };

                let outcome = tokio::select! {
                    _ = &mut quit_rx => break,
                    outcome = tokio::time::timeout(deadline, forwarder.forward(message)) => outcome,
                };

                let Ok(result) = outcome else {
                    ctx.add_error(format!(
                        "{}: no response from backend within {:?}",
                        ctx.request_uri(),
                        deadline
                    ));
                    continue;
                };

                match result {
                    Ok((status, body)) if status == StatusCode::OK => {
                        let reply = Message::text(String::from_utf8_lossy(&body).into_owned());
                        if let Err(e) = client_tx.send(reply).await {
                            if !is_closed_error(&e) {
                                ctx.add_error(format!("client write: {}", e));
                            }
                        }
                    }
                    Ok((status, _)) => {
                        ctx.add_error(format!("{}: invalid response from backend: {}", ctx.request_uri(), status));
                    }
                    Err(e) => ctx.add_error(e),
                }
            }

            if let Err(e) = client_tx.close().await {
                if !is_closed_error(&e) {
                    tracing::debug!(request_id = %ctx.request_id, error = %e, "Websocket close failed");
                }
            }
        })
    };

    while let Some(next) = client_rx.next().await {
        let message = match next {
            Ok(Message::Text(text)) => Bytes::copy_from_slice(text.as_bytes()),
            Ok(Message::Binary(data)) => data,
            Ok(Message::Close(frame)) => {
                record_close(&ctx, "client", frame.as_ref());
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                if !is_closed_error(&e) {
                    ctx.add_error(format!("client read: {}", e));
                }
                break;
            }
        };
        if queue_tx.send(message).await.is_err() {
            break;
        }
    }

    let _ = quit_tx.send(());
    if let Err(e) = worker.await {
        tracing::error!(request_id = %ctx.request_id, error = %e, "Emulation worker panicked");
    }
    tracing::debug!(request_id = %ctx.request_id, "Emulated session closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::context::test_support::context;
    use crate::observability::sink::test_support::RecordingSink;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::DuplexStream;
    use tokio::sync::Semaphore;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
    use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Role};

    /// Answers `fail` with a 500, never answers `hang`, and answers anything
    /// else with `200 echo:<msg>`. Each call waits for a permit from `gate`.
    struct Echo {
        gate: Arc<Semaphore>,
        calls: Arc<AtomicUsize>,
    }

    impl MessageForwarder for Echo {
        fn forward(&self, message: Bytes) -> BoxFuture<'_, Result<(StatusCode, Bytes), ProxyError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                self.gate
                    .acquire()
                    .await
                    .map_err(|e| ProxyError::Upstream(e.to_string()))?
                    .forget();
                if message.as_ref() == b"hang" {
                    return std::future::pending().await;
                }
                if message.as_ref() == b"fail" {
                    return Ok((StatusCode::INTERNAL_SERVER_ERROR, Bytes::from_static(b"boom")));
                }
                let mut body = b"echo:".to_vec();
                body.extend_from_slice(&message);
                Ok((StatusCode::OK, Bytes::from(body)))
            })
        }
    }

    struct Harness {
        client: WebSocketStream<DuplexStream>,
        ctx: Arc<RequestContext>,
        gate: Arc<Semaphore>,
        calls: Arc<AtomicUsize>,
        session: tokio::task::JoinHandle<()>,
    }

    async fn harness(capacity: usize, permits: usize) -> Harness {
        harness_with_deadline(capacity, permits, Duration::from_secs(30)).await
    }

    async fn harness_with_deadline(capacity: usize, permits: usize, deadline: Duration) -> Harness {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let proxy = WebSocketStream::from_raw_socket(a, Role::Server, None).await;
        let client = WebSocketStream::from_raw_socket(b, Role::Client, None).await;
        let ctx = Arc::new(context("/ws", &[], Arc::new(RecordingSink::default())));
        let gate = Arc::new(Semaphore::new(permits));
        let calls = Arc::new(AtomicUsize::new(0));
        let forwarder = Echo { gate: gate.clone(), calls: calls.clone() };
        let session = tokio::spawn(run_with_capacity(proxy, forwarder, deadline, ctx.clone(), capacity));
        Harness { client, ctx, gate, calls, session }
    }

    async fn recv_text(client: &mut WebSocketStream<DuplexStream>) -> String {
        let message = tokio::time::timeout(Duration::from_secs(2), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        message.into_text().unwrap().as_str().to_string()
    }

    async fn finish(mut h: Harness) {
        h.client
            .close(Some(CloseFrame { code: CloseCode::Away, reason: "".into() }))
            .await
            .unwrap();
        while let Ok(Some(Ok(_))) = tokio::time::timeout(Duration::from_secs(2), h.client.next()).await {}
        tokio::time::timeout(Duration::from_secs(2), h.session).await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_ok_response_relayed_as_text() {
        let mut h = harness(QUEUE_CAPACITY, 100).await;

        h.client.send(Message::text("ping")).await.unwrap();
        assert_eq!(recv_text(&mut h.client).await, "echo:ping");

        h.client.send(Message::binary(b"raw".to_vec())).await.unwrap();
        assert_eq!(recv_text(&mut h.client).await, "echo:raw");

        let ctx = h.ctx.clone();
        finish(h).await;
        assert!(ctx.errors().is_empty());
    }

    #[tokio::test]
    async fn test_error_response_dropped_and_recorded() {
        let mut h = harness(QUEUE_CAPACITY, 100).await;

        h.client.send(Message::text("fail")).await.unwrap();
        h.client.send(Message::text("after")).await.unwrap();

        // The failed message produces no frame; the next reply is for "after".
        assert_eq!(recv_text(&mut h.client).await, "echo:after");

        let errors = h.ctx.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("500"), "unexpected {:?}", errors);
        finish(h).await;
    }

    #[tokio::test]
    async fn test_full_queue_holds_messages_in_order() {
        let mut h = harness(1, 0).await;

        for i in 0..4 {
            h.client.send(Message::text(format!("m{}", i))).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
        // One message in flight, the rest waiting behind the bounded queue.
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        h.gate.add_permits(4);
        for i in 0..4 {
            assert_eq!(recv_text(&mut h.client).await, format!("echo:m{}", i));
        }
        assert_eq!(h.calls.load(Ordering::SeqCst), 4);
        finish(h).await;
    }

    #[tokio::test]
    async fn test_stalled_backend_dropped_after_deadline() {
        let mut h = harness_with_deadline(QUEUE_CAPACITY, 100, Duration::from_millis(50)).await;

        h.client.send(Message::text("hang")).await.unwrap();
        h.client.send(Message::text("next")).await.unwrap();
        assert_eq!(recv_text(&mut h.client).await, "echo:next");

        let errors = h.ctx.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("no response from backend"), "unexpected {:?}", errors);
        finish(h).await;
    }

    #[tokio::test]
    async fn test_client_close_ends_session_while_backend_stalls() {
        let mut h = harness(QUEUE_CAPACITY, 100).await;

        h.client.send(Message::text("hang")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);

        // The worker is still waiting on the backend; closing must not wait for it.
        finish(h).await;
    }
}
