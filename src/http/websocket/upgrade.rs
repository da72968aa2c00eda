//! Client-side upgrade negotiation.

use axum::body::Body;
use axum::http::header::{self, HeaderMap, HeaderValue};
use axum::http::{Method, Response, StatusCode};
use tokio_tungstenite::tungstenite::handshake::derive_accept_key;

use crate::config::WebsocketConfig;
use crate::error::ProxyError;

/// True when the request asks for a websocket upgrade.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    headers
        .get(header::UPGRADE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().eq_ignore_ascii_case("websocket"))
        .unwrap_or(false)
}

/// Clients sometimes send `Connection: keep-alive, Upgrade`; settle on the canonical pair.
pub fn normalize_upgrade_headers(headers: &mut HeaderMap) {
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
}

pub fn check_origin(config: &WebsocketConfig, headers: &HeaderMap) -> Result<(), ProxyError> {
    if config.allow_all_origins {
        return Ok(());
    }
    let origin = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if config.match_origin(origin) {
        Ok(())
    } else {
        Err(ProxyError::OriginRejected(origin.to_string()))
    }
}

/// Validate the handshake and derive `Sec-WebSocket-Accept`.
pub fn accept_key(method: &Method, headers: &HeaderMap) -> Result<HeaderValue, ProxyError> {
    if method != Method::GET {
        return Err(ProxyError::Upgrade(format!("method {} cannot upgrade", method)));
    }

    let version = headers
        .get(header::SEC_WEBSOCKET_VERSION)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);
    if version != Some("13") {
        return Err(ProxyError::Upgrade("unsupported Sec-WebSocket-Version".into()));
    }

    let key = headers
        .get(header::SEC_WEBSOCKET_KEY)
        .ok_or_else(|| ProxyError::Upgrade("missing Sec-WebSocket-Key".into()))?;

    HeaderValue::from_str(&derive_accept_key(key.as_bytes())).map_err(|e| ProxyError::Upgrade(e.to_string()))
}

pub fn switching_protocols(accept: HeaderValue) -> Response<Body> {
    let mut response = Response::new(Body::empty());
    *response.status_mut() = StatusCode::SWITCHING_PROTOCOLS;
    let headers = response.headers_mut();
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::SEC_WEBSOCKET_ACCEPT, accept);
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handshake() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("connection", "keep-alive, Upgrade".parse().unwrap());
        headers.insert("upgrade", "WebSocket".parse().unwrap());
        headers.insert("sec-websocket-version", "13".parse().unwrap());
        headers.insert("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==".parse().unwrap());
        headers
    }

    #[test]
    fn test_detect_and_normalize() {
        let mut headers = handshake();
        assert!(is_upgrade_request(&headers));
        normalize_upgrade_headers(&mut headers);
        assert_eq!(headers["connection"], "Upgrade");
        assert_eq!(headers["upgrade"], "websocket");
        assert!(!is_upgrade_request(&HeaderMap::new()));
    }

    #[test]
    fn test_accept_key() {
        let accept = accept_key(&Method::GET, &handshake()).unwrap();
        assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");

        assert!(matches!(accept_key(&Method::POST, &handshake()), Err(ProxyError::Upgrade(_))));

        let mut old = handshake();
        old.insert("sec-websocket-version", "8".parse().unwrap());
        assert!(matches!(accept_key(&Method::GET, &old), Err(ProxyError::Upgrade(_))));
    }

    #[test]
    fn test_origin_check() {
        let config = WebsocketConfig {
            allow_all_origins: false,
            origins: vec!["*.example.com".into()],
            ..WebsocketConfig::default()
        };

        let mut headers = handshake();
        assert!(matches!(check_origin(&config, &headers), Err(ProxyError::OriginRejected(_))));

        headers.insert("origin", "https://app.example.com".parse().unwrap());
        assert!(check_origin(&config, &headers).is_ok());

        headers.insert("origin", "https://evil.test".parse().unwrap());
        assert!(check_origin(&config, &headers).is_err());

        assert!(check_origin(&WebsocketConfig::default(), &HeaderMap::new()).is_ok());
    }
}
