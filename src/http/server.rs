//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the proxy handler
//! - Wire up middleware (request id, tracing, limits, timeouts, WAF)
//! - Hold the swappable runtime (routes, pool, WAF) and apply config reloads
//! - Serve plain or TLS listeners with graceful shutdown

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    middleware,
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::health::active::{BackendSource, RecoveryMonitor};
use crate::health::notify::{DownNotifier, TracingNotifier};
use crate::http::bridge::Bridge;
use crate::http::context::RequestContext;
use crate::http::middleware::waf_middleware;
use crate::http::request::MakeRequestUuid;
use crate::http::websocket;
use crate::load_balancer::{Backend, BackendPool};
use crate::net::tls::load_tls_config;
use crate::observability::metrics;
use crate::observability::sink::{ErrorSink, TracingErrorSink};
use crate::routing::Router as ProxyRouter;
use crate::waf::{CheckpointRegistry, PassThrough, RuleEngine, WafFrontend};

/// Everything rebuilt from a config snapshot.
#[derive(Debug)]
pub struct GatewayRuntime {
    pub router: ProxyRouter,
    pub bridge: Bridge,
    pub waf: WafFrontend,
}

impl GatewayRuntime {
    pub fn build(
        config: &ProxyConfig,
        notifier: Arc<dyn DownNotifier>,
        registry: &CheckpointRegistry,
        engine: Arc<dyn RuleEngine>,
    ) -> Self {
        let pool = Arc::new(BackendPool::new(&config.backends, notifier));
        Self {
            router: ProxyRouter::from_config(config.routes.clone()),
            bridge: Bridge::new(pool, Duration::from_secs(config.timeouts.request_secs)),
            waf: WafFrontend::new(&config.waf, registry, engine),
        }
    }

    pub fn pool(&self) -> &Arc<BackendPool> {
        self.bridge.pool()
    }
}

impl BackendSource for ArcSwap<GatewayRuntime> {
    fn backends(&self) -> Vec<Arc<Backend>> {
        self.load().pool().all_backends()
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    runtime: Arc<ArcSwap<GatewayRuntime>>,
    sink: Arc<dyn ErrorSink>,
    server_addr: Arc<str>,
    scheme: &'static str,
}

impl AppState {
    pub(crate) fn runtime(&self) -> Arc<GatewayRuntime> {
        self.runtime.load_full()
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    config: ProxyConfig,
    runtime: Arc<ArcSwap<GatewayRuntime>>,
    notifier: Arc<dyn DownNotifier>,
    sink: Arc<dyn ErrorSink>,
    registry: Arc<CheckpointRegistry>,
    engine: Arc<dyn RuleEngine>,
}

impl HttpServer {
    /// Create a server with the tracing-backed notifier and sink and a pass-through rule engine.
    pub fn new(config: ProxyConfig) -> Self {
        Self::with_collaborators(
            config,
            Arc::new(TracingNotifier),
            Arc::new(TracingErrorSink),
            Arc::new(PassThrough),
        )
    }

    pub fn with_collaborators(
        config: ProxyConfig,
        notifier: Arc<dyn DownNotifier>,
        sink: Arc<dyn ErrorSink>,
        engine: Arc<dyn RuleEngine>,
    ) -> Self {
        let registry = Arc::new(CheckpointRegistry::with_defaults());
        let runtime = GatewayRuntime::build(&config, notifier.clone(), &registry, engine.clone());
        Self {
            config,
            runtime: Arc::new(ArcSwap::from_pointee(runtime)),
            notifier,
            sink,
            registry,
            engine,
        }
    }

    /// Current runtime snapshot.
    pub fn runtime(&self) -> Arc<GatewayRuntime> {
        self.runtime.load_full()
    }

    /// Shared handle to the runtime, valid across reloads.
    pub fn runtime_handle(&self) -> Arc<ArcSwap<GatewayRuntime>> {
        self.runtime.clone()
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(&self, state: AppState) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .layer(middleware::from_fn_with_state(state.clone(), waf_middleware))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(self.config.timeouts.request_secs)))
            .layer(RequestBodyLimitLayer::new(self.config.listener.max_body_size))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires. New configs arriving on
    /// `config_updates` replace the runtime; listener settings are fixed at start.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        let tls = self.config.listener.tls.clone();
        let scheme = if tls.is_some() { "https" } else { "http" };

        tracing::info!(address = %addr, scheme, "HTTP server starting");

        let state = AppState {
            runtime: self.runtime.clone(),
            sink: self.sink.clone(),
            server_addr: Arc::from(addr.to_string()),
            scheme,
        };
        let app = self.build_router(state);

        let reload_task = {
            let runtime = self.runtime.clone();
            let notifier = self.notifier.clone();
            let registry = self.registry.clone();
            let engine = self.engine.clone();
            tokio::spawn(async move {
                while let Some(config) = config_updates.recv().await {
                    let next = GatewayRuntime::build(&config, notifier.clone(), &registry, engine.clone());
                    runtime.store(Arc::new(next));
                    tracing::info!(
                        routes = config.routes.len(),
                        backends = config.backends.len(),
                        "Runtime reloaded"
                    );
                }
            })
        };

        if self.config.health_check.enabled {
            let source: Arc<dyn BackendSource> = self.runtime.clone();
            let monitor = RecoveryMonitor::new(source, self.config.health_check.clone());
            tokio::spawn(monitor.run(shutdown.resubscribe()));
        }

        let service = app.into_make_service_with_connect_info::<SocketAddr>();

        match tls {
            None => {
                axum::serve(listener, service)
                    .with_graceful_shutdown(async move {
                        let _ = shutdown.recv().await;
                        tracing::info!("Shutdown signal received");
                    })
                    .await?;
            }
            Some(tls) => {
                let rustls = load_tls_config(Path::new(&tls.cert_path), Path::new(&tls.key_path)).await?;
                let handle = axum_server::Handle::new();
                let shutdown_handle = handle.clone();
                tokio::spawn(async move {
                    let _ = shutdown.recv().await;
                    tracing::info!("Shutdown signal received");
                    shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });
                axum_server::from_tcp_rustls(listener.into_std()?, rustls)
                    .handle(handle)
                    .serve(service)
                    .await?;
            }
        }

        reload_task.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main proxy handler.
/// Matches a route, selects a backend, then bridges HTTP or WebSocket.
async fn proxy_handler(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let runtime = state.runtime();
    let method = request.method().to_string();

    let Some(route) = runtime.router.match_request(&request) else {
        let err = ProxyError::NoRoute(request.uri().path().to_string());
        tracing::warn!(path = %request.uri().path(), "No route matched");
        metrics::record_request(&method, err.status().as_u16(), "none", start);
        return err.into_response();
    };

    let backend = runtime.pool().select(&route.backend_group);
    let backend_label = backend
        .as_ref()
        .map(|b| b.name.clone())
        .unwrap_or_else(|| "none".to_string());

    let (parts, body) = request.into_parts();
    let ctx = Arc::new(
        RequestContext::new(&parts, peer, state.sink.clone())
            .with_listener(state.server_addr.as_ref(), state.scheme)
            .with_route(route)
            .with_backend(backend),
    );

    tracing::debug!(
        request_id = %ctx.request_id,
        method = %method,
        path = %parts.uri.path(),
        route = %route.name,
        backend = %backend_label,
        "Proxying request"
    );

    let result = if route.websocket.is_some() && websocket::is_upgrade_request(&parts.headers) {
        websocket::serve(&runtime.bridge, ctx.clone(), parts).await
    } else {
        runtime.bridge.proxy_http(&ctx, parts.method.clone(), body).await
    };

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            ctx.add_error(&e);
            e.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), &backend_label, start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    use crate::config::{BackendConfig, BackendScheme, CheckpointRef, RouteConfig};
    use crate::http::request::X_REQUEST_ID;
    use crate::waf::frontend::test_support::BlockValue;

    fn app(server: &HttpServer) -> Router {
        let state = AppState {
            runtime: server.runtime_handle(),
            sink: Arc::new(TracingErrorSink),
            server_addr: Arc::from("127.0.0.1:8080"),
            scheme: "http",
        };
        server
            .build_router(state)
            .layer(MockConnectInfo(SocketAddr::from(([127, 0, 0, 1], 40000))))
    }

    fn config_with_empty_group() -> ProxyConfig {
        let mut config = ProxyConfig::default();
        config.backends.push(BackendConfig {
            name: "b1".into(),
            group: "other".into(),
            address: "127.0.0.1:1".into(),
            scheme: BackendScheme::Http,
            host: None,
            max_conns: 0,
            max_fails: 0,
            fail_timeout_secs: 1,
            cert: None,
        });
        config.routes.push(RouteConfig {
            name: "api".into(),
            host: None,
            path_prefix: Some("/api".into()),
            backend_group: "empty".into(),
            priority: 0,
            websocket: None,
            request_headers: Vec::new(),
        });
        config
    }

    fn get(path: &str) -> Request<Body> {
        Request::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unmatched_path_is_404_with_request_id() {
        let server = HttpServer::new(config_with_empty_group());
        let response = app(&server).oneshot(get("/nothing")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(response.headers().contains_key(X_REQUEST_ID));
    }

    #[tokio::test]
    async fn test_empty_group_is_503() {
        let server = HttpServer::new(config_with_empty_group());
        let response = app(&server).oneshot(get("/api/items")).await.unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_waf_block_short_circuits() {
        let mut config = config_with_empty_group();
        config.waf.enabled = true;
        config.waf.checkpoints.push(CheckpointRef {
            name: "remoteAddr".into(),
            param: String::new(),
            options: Default::default(),
        });
        let server = HttpServer::with_collaborators(
            config,
            Arc::new(TracingNotifier),
            Arc::new(TracingErrorSink),
            Arc::new(BlockValue("6.6.6.6")),
        );

        let blocked = Request::builder()
            .uri("/api/items")
            .header("x-forwarded-for", "6.6.6.6, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        let response = app(&server).oneshot(blocked).await.unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let response = app(&server).oneshot(get("/api/items")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_reload_store_is_visible_to_router() {
        let server = HttpServer::new(config_with_empty_group());
        let router = app(&server);

        let mut config = config_with_empty_group();
        config.routes[0].path_prefix = Some("/v2".into());
        let next = GatewayRuntime::build(
            &config,
            Arc::new(TracingNotifier),
            &CheckpointRegistry::with_defaults(),
            Arc::new(PassThrough),
        );
        server.runtime_handle().store(Arc::new(next));

        let response = router.clone().oneshot(get("/api/items")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = router.oneshot(get("/v2/items")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
