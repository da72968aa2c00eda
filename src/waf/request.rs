//! Request and response views handed to checkpoints.
//!
//! Header names are stored in canonical form (`X-Real-Ip`) unless a caller
//! inserts them verbatim. [`WafRequest::header`] folds case; [`WafRequest::header_exact`]
//! does not, so `X-Real-IP` and `X-Real-Ip` are distinct keys there.

use std::net::SocketAddr;

use axum::http::{HeaderMap, Method, StatusCode, Uri};

#[derive(Debug, Clone)]
pub struct WafRequest {
    pub method: Method,
    pub uri: Uri,
    /// Transport peer, usually `ip:port`.
    pub remote_addr: String,
    headers: Vec<(String, String)>,
}

impl WafRequest {
    pub fn new(method: Method, uri: Uri, remote_addr: impl Into<String>) -> Self {
        Self {
            method,
            uri,
            remote_addr: remote_addr.into(),
            headers: Vec::new(),
        }
    }

    /// Build from an inbound request head. Names are canonicalised.
    pub fn from_head(method: &Method, uri: &Uri, headers: &HeaderMap, peer: SocketAddr) -> Self {
        let mut req = Self::new(method.clone(), uri.clone(), peer.to_string());
        for (name, value) in headers {
            req.headers.push((
                canonical_header_name(name.as_str()),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            ));
        }
        req
    }

    /// Append a header with its name kept exactly as given.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First value of a header, name compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All values stored under exactly `name`.
    pub fn header_exact(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// First value of a query argument.
    pub fn query_arg(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }
}

#[derive(Debug, Clone)]
pub struct WafResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
}

impl WafResponse {
    pub fn new(status: StatusCode, headers: HeaderMap) -> Self {
        Self { status, headers }
    }
}

/// `x-real-ip` → `X-Real-Ip`.
pub fn canonical_header_name(name: &str) -> String {
    name.split('-')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + &chars.as_str().to_ascii_lowercase(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names() {
        assert_eq!(canonical_header_name("x-real-ip"), "X-Real-Ip");
        assert_eq!(canonical_header_name("X-FORWARDED-FOR"), "X-Forwarded-For");
        assert_eq!(canonical_header_name("host"), "Host");
    }

    #[test]
    fn test_header_lookups() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", "1.1.1.1".parse().unwrap());
        let req = WafRequest::from_head(
            &Method::GET,
            &"/a?b=c&b=d".parse().unwrap(),
            &headers,
            "10.0.0.1:4000".parse().unwrap(),
        );

        assert_eq!(req.header("X-REAL-IP"), Some("1.1.1.1"));
        assert_eq!(req.header_exact("X-Real-Ip"), vec!["1.1.1.1"]);
        assert!(req.header_exact("X-Real-IP").is_empty());
        assert_eq!(req.query_arg("b").as_deref(), Some("c"));
        assert_eq!(req.remote_addr, "10.0.0.1:4000");
    }
}
