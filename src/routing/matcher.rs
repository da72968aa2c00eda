//! Route match conditions.
//!
//! # Design Decisions
//! - Host comparison is case-insensitive; a pattern without a port matches any port
//! - Path prefixes are case-sensitive
//! - A route with no conditions matches everything
//! - Prefix comparison only, no regex

use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Host(String),
    PathPrefix(String),
}

impl Condition {
    pub fn host(host: impl Into<String>) -> Self {
        Condition::Host(host.into().trim().to_lowercase())
    }

    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        Condition::PathPrefix(prefix.into())
    }

    fn holds(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        match self {
            Condition::Host(expected) => request_host(uri, headers)
                .map(|host| host_matches(expected, &host))
                .unwrap_or(false),
            Condition::PathPrefix(prefix) => uri.path().starts_with(prefix.as_str()),
        }
    }
}

/// All conditions of one route.
#[derive(Debug, Clone, Default)]
pub struct RouteMatcher {
    conditions: Vec<Condition>,
}

impl RouteMatcher {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn matches(&self, uri: &Uri, headers: &HeaderMap) -> bool {
        self.conditions.iter().all(|c| c.holds(uri, headers))
    }
}

/// Host header first, then the URI authority (HTTP/2 and absolute-form requests).
fn request_host(uri: &Uri, headers: &HeaderMap) -> Option<String> {
    headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| uri.authority().map(|a| a.as_str()))
        .map(str::to_lowercase)
}

fn host_matches(expected: &str, actual: &str) -> bool {
    if expected == actual {
        return true;
    }
    if expected.contains(':') {
        return false;
    }
    actual.rsplit_once(':').map(|(name, _)| name) == Some(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(host: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(HOST, host.parse().unwrap());
        headers
    }

    #[test]
    fn test_host_condition() {
        let cond = Condition::host("Example.com");
        let uri: Uri = "/".parse().unwrap();

        assert!(cond.holds(&uri, &headers("example.com")));
        assert!(cond.holds(&uri, &headers("EXAMPLE.COM")));
        assert!(cond.holds(&uri, &headers("example.com:8080")));
        assert!(!cond.holds(&uri, &headers("other.com")));
        assert!(!cond.holds(&uri, &HeaderMap::new()));

        let with_port = Condition::host("example.com:8080");
        assert!(!with_port.holds(&uri, &headers("example.com:9090")));
    }

    #[test]
    fn test_host_from_authority() {
        let cond = Condition::host("example.com");
        let uri: Uri = "https://example.com/ws".parse().unwrap();
        assert!(cond.holds(&uri, &HeaderMap::new()));
    }

    #[test]
    fn test_all_conditions_required() {
        let matcher = RouteMatcher::new(vec![Condition::host("example.com"), Condition::path_prefix("/ws")]);
        let host = headers("example.com");

        assert!(matcher.matches(&"/ws/chat".parse().unwrap(), &host));
        assert!(!matcher.matches(&"/api".parse().unwrap(), &host));
        assert!(!matcher.matches(&"/ws/chat".parse().unwrap(), &headers("other.com")));
        assert!(RouteMatcher::default().matches(&"/anything".parse().unwrap(), &HeaderMap::new()));
    }
}
