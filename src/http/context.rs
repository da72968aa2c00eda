//! Per-request state shared by the bridge and its session tasks.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::http::request::Parts;
use axum::http::{header, HeaderMap, Method, Uri};

use crate::config::{HeaderConfig, WebsocketConfig};
use crate::http::request::request_id;
use crate::http::template;
use crate::load_balancer::pool::FailureScope;
use crate::load_balancer::Backend;
use crate::observability::sink::ErrorSink;
use crate::routing::Route;
use crate::waf::remote_addr::{resolve_remote_addr, strip_port};
use crate::waf::WafRequest;

/// Everything the bridge needs to know about one inbound request.
///
/// Immutable once built apart from the error list, so session tasks share it
/// behind an `Arc`.
#[derive(Debug)]
pub struct RequestContext {
    pub request_id: String,
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub peer: SocketAddr,
    /// Local address of the listener that accepted the request.
    pub server_addr: String,
    /// Inbound scheme, `http` or `https`.
    pub scheme: &'static str,
    pub route: Option<String>,
    pub backend_group: Option<String>,
    pub backend: Option<Arc<Backend>>,
    pub websocket: Option<WebsocketConfig>,
    pub request_headers: Vec<HeaderConfig>,
    errors: Mutex<Vec<String>>,
    sink: Arc<dyn ErrorSink>,
}

impl RequestContext {
    pub fn new(parts: &Parts, peer: SocketAddr, sink: Arc<dyn ErrorSink>) -> Self {
        Self {
            request_id: request_id(&parts.headers),
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            peer,
            server_addr: String::new(),
            scheme: "http",
            route: None,
            backend_group: None,
            backend: None,
            websocket: None,
            request_headers: Vec::new(),
            errors: Mutex::new(Vec::new()),
            sink,
        }
    }

    pub fn with_listener(mut self, server_addr: impl Into<String>, scheme: &'static str) -> Self {
        self.server_addr = server_addr.into();
        self.scheme = scheme;
        self
    }

    pub fn with_route(mut self, route: &Route) -> Self {
        self.route = Some(route.name.clone());
        self.backend_group = Some(route.backend_group.clone());
        self.websocket = route.websocket.clone();
        self.request_headers = route.request_headers.clone();
        self
    }

    pub fn with_backend(mut self, backend: Option<Arc<Backend>>) -> Self {
        self.backend = backend;
        self
    }

    /// Record a non-fatal error on this request and forward it to the sink.
    pub fn add_error(&self, error: impl Display) {
        let message = error.to_string();
        self.sink.report(&self.request_id, self.uri.path(), &message);
        if let Ok(mut errors) = self.errors.lock() {
            errors.push(message);
        }
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Path plus query, `/` when empty.
    pub fn request_uri(&self) -> &str {
        self.uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/")
    }

    /// Inbound Host header, falling back to the URI authority.
    pub fn host(&self) -> String {
        self.headers
            .get(header::HOST)
            .and_then(|h| h.to_str().ok())
            .map(str::to_string)
            .or_else(|| self.uri.authority().map(|a| a.to_string()))
            .unwrap_or_default()
    }

    /// Client address with forwarding headers taken into account.
    pub fn remote_addr(&self) -> String {
        resolve_remote_addr(&WafRequest::from_head(&self.method, &self.uri, &self.headers, self.peer))
    }

    pub fn failure_scope(&self) -> FailureScope<'_> {
        FailureScope {
            route: self.route.as_deref(),
            forward_mode: self.websocket.as_ref().map(|ws| ws.forward_mode),
        }
    }

    /// Value of a template variable.
    pub fn variable(&self, name: &str) -> Option<String> {
        if let Some(arg) = name.strip_prefix("arg.") {
            let query = self.uri.query()?;
            return url::form_urlencoded::parse(query.as_bytes())
                .find(|(k, _)| k == arg)
                .map(|(_, v)| v.into_owned());
        }
        if let Some(name) = name.strip_prefix("header.") {
            return self
                .headers
                .get(name)
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());
        }

        let value = match name {
            "remoteAddr" => self.remote_addr(),
            "rawRemoteAddr" => self.peer.ip().to_string(),
            "remotePort" => self.peer.port().to_string(),
            "host" => self.host(),
            "serverName" => strip_port(&self.host()).to_string(),
            "serverAddr" => self.server_addr.clone(),
            "requestURI" => self.request_uri().to_string(),
            "requestPath" => self.uri.path().to_string(),
            "requestMethod" => self.method.to_string(),
            "scheme" => self.scheme.to_string(),
            "requestId" => self.request_id.clone(),
            "backendAddress" => self.backend.as_ref()?.address.clone(),
            _ => return None,
        };
        Some(value)
    }

    /// Expand `${name}` variables against this request.
    pub fn format(&self, template: &str) -> String {
        template::expand(template, |name| self.variable(name))
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use axum::http::Request;

    /// Context for `GET {uri}` from `9.9.9.9:54321`, reporting into `sink`.
    pub fn context(uri: &str, headers: &[(&str, &str)], sink: Arc<dyn ErrorSink>) -> RequestContext {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, _) = builder.body(()).unwrap().into_parts();
        RequestContext::new(&parts, "9.9.9.9:54321".parse().unwrap(), sink).with_listener("10.0.0.1:8080", "http")
    }
}
