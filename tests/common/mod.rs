//! Shared utilities for integration tests: mock backends and a gateway launcher.

#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::HeaderMap;

use ws_gateway::config::{BackendConfig, BackendScheme, ProxyConfig, RouteConfig, WebsocketConfig};
use ws_gateway::health::notify::{DownNotifier, TracingNotifier};
use ws_gateway::http::GatewayRuntime;
use ws_gateway::observability::sink::TracingErrorSink;
use ws_gateway::waf::PassThrough;
use ws_gateway::{HttpServer, Shutdown};

/// One request as seen by a mock backend.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// An address nothing listens on.
pub async fn dead_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start an HTTP backend whose responses come from `f`.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn(RecordedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let f = f.clone();
            tokio::spawn(async move {
                let Some(request) = read_request(&mut socket).await else {
                    return;
                };
                let (status, body) = f(request).await;
                let status_text = match status {
                    200 => "200 OK",
                    404 => "404 Not Found",
                    500 => "500 Internal Server Error",
                    502 => "502 Bad Gateway",
                    503 => "503 Service Unavailable",
                    _ => "200 OK",
                };
                let response = format!(
                    "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status_text,
                    body.len(),
                    body
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    addr
}

/// Start an HTTP backend that records every request and answers `200 ok`.
pub async fn start_recording_backend() -> (SocketAddr, Arc<Mutex<Vec<RecordedRequest>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = seen.clone();
    let addr = start_programmable_backend(move |req| {
        let log = log.clone();
        async move {
            log.lock().unwrap().push(req);
            (200, "ok".to_string())
        }
    })
    .await;
    (addr, seen)
}

async fn read_request(socket: &mut TcpStream) -> Option<RecordedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos;
        }
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split(' ');
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: Vec<(String, String)> = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(n, v)| (n.trim().to_string(), v.trim().to_string()))
        .collect();

    let length = headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);

    let body_start = head_end + 4;
    while buf.len() < body_start + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body_end = buf.len().min(body_start + length);

    Some(RecordedRequest {
        method,
        path,
        headers,
        body: String::from_utf8_lossy(&buf[body_start..body_end]).to_string(),
    })
}

/// Start a websocket backend that echoes text and binary frames and records handshake headers.
pub async fn start_ws_echo_backend() -> (SocketAddr, Arc<Mutex<Vec<HeaderMap>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handshakes = Arc::new(Mutex::new(Vec::new()));
    let seen = handshakes.clone();

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let seen = seen.clone();
            tokio::spawn(async move {
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    seen.lock().unwrap().push(req.headers().clone());
                    Ok(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(socket, callback).await else {
                    return;
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_text() || message.is_binary() {
                        if ws.send(message).await.is_err() {
                            break;
                        }
                    }
                }
            });
        }
    });

    (addr, handshakes)
}

pub fn backend(name: &str, group: &str, address: SocketAddr) -> BackendConfig {
    BackendConfig {
        name: name.into(),
        group: group.into(),
        address: address.to_string(),
        scheme: BackendScheme::Http,
        host: None,
        max_conns: 0,
        max_fails: 0,
        fail_timeout_secs: 2,
        cert: None,
    }
}

pub fn route(name: &str, group: &str, prefix: &str) -> RouteConfig {
    RouteConfig {
        name: name.into(),
        host: None,
        path_prefix: Some(prefix.into()),
        backend_group: group.into(),
        priority: 0,
        websocket: None,
        request_headers: Vec::new(),
    }
}

pub fn ws_route(name: &str, group: &str, prefix: &str, websocket: WebsocketConfig) -> RouteConfig {
    RouteConfig {
        websocket: Some(websocket),
        ..route(name, group, prefix)
    }
}

pub fn base_config() -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.listener.bind_address = "127.0.0.1:0".into();
    config.observability.metrics_enabled = false;
    config.health_check.enabled = false;
    config
}

/// A gateway running on an ephemeral port.
pub struct Gateway {
    pub addr: SocketAddr,
    pub runtime: Arc<ArcSwap<GatewayRuntime>>,
    pub updates: mpsc::UnboundedSender<ProxyConfig>,
    shutdown: Shutdown,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn ws_url(&self, path: &str) -> String {
        format!("ws://{}{}", self.addr, path)
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

pub async fn start_gateway(config: ProxyConfig) -> Gateway {
    start_gateway_with(config, Arc::new(TracingNotifier)).await
}

pub async fn start_gateway_with(config: ProxyConfig, notifier: Arc<dyn DownNotifier>) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = HttpServer::with_collaborators(config, notifier, Arc::new(TracingErrorSink), Arc::new(PassThrough));
    let runtime = server.runtime_handle();
    let (updates, config_updates) = mpsc::unbounded_channel();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    Gateway {
        addr,
        runtime,
        updates,
        shutdown,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
