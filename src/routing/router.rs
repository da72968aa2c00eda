//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up matching route for request
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) scan in priority order (acceptable for typical route counts)
//! - Explicit NoMatch rather than silent default

use axum::body::Body;
use axum::http::Request;

use crate::config::{HeaderConfig, RouteConfig, WebsocketConfig};
use crate::routing::matcher::{Condition, RouteMatcher};

/// A compiled route.
#[derive(Debug)]
pub struct Route {
    pub name: String,
    pub backend_group: String,
    pub websocket: Option<WebsocketConfig>,
    pub request_headers: Vec<HeaderConfig>,
    matcher: RouteMatcher,
}

#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    /// Compile routes, highest priority first. Equal priorities keep config order.
    pub fn from_config(mut configs: Vec<RouteConfig>) -> Self {
        configs.sort_by(|a, b| b.priority.cmp(&a.priority));

        let routes = configs
            .into_iter()
            .map(|config| {
                let mut conditions = Vec::new();
                if let Some(host) = config.host.filter(|h| !h.trim().is_empty()) {
                    conditions.push(Condition::host(host));
                }
                if let Some(prefix) = config.path_prefix.filter(|p| !p.is_empty()) {
                    conditions.push(Condition::path_prefix(prefix));
                }
                Route {
                    name: config.name,
                    backend_group: config.backend_group,
                    websocket: config.websocket,
                    request_headers: config.request_headers,
                    matcher: RouteMatcher::new(conditions),
                }
            })
            .collect();

        Self { routes }
    }

    pub fn match_request(&self, req: &Request<Body>) -> Option<&Route> {
        self.routes
            .iter()
            .find(|route| route.matcher.matches(req.uri(), req.headers()))
    }
}
