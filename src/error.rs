//! Errors surfaced by the protocol bridge.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::net::dial::DialError;

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("no route matches {0}")]
    NoRoute(String),

    #[error("no available backend in group '{0}'")]
    NoBackend(String),

    #[error("backend '{0}' is at its connection limit")]
    AdmissionRejected(String),

    #[error(transparent)]
    Dial(#[from] DialError),

    #[error("backend websocket handshake failed: {0}")]
    Handshake(String),

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("origin '{0}' is not allowed")]
    OriginRejected(String),

    #[error("websocket upgrade failed: {0}")]
    Upgrade(String),

    #[error("failed to build upstream request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    pub fn status(&self) -> StatusCode {
        match self {
            ProxyError::NoRoute(_) => StatusCode::NOT_FOUND,
            ProxyError::NoBackend(_) | ProxyError::AdmissionRejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            ProxyError::Dial(_) | ProxyError::Handshake(_) | ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::OriginRejected(_) => StatusCode::FORBIDDEN,
            ProxyError::Upgrade(_) => StatusCode::BAD_REQUEST,
            ProxyError::InvalidRequest(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True when the failure counts against the backend.
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, ProxyError::Dial(_) | ProxyError::Handshake(_))
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Detail stays in the logs; clients only get the reason phrase.
        let body = status.canonical_reason().unwrap_or("Proxy Error");
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ProxyError::NoBackend("web".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ProxyError::AdmissionRejected("b1".into()).status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(ProxyError::OriginRejected("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(ProxyError::Upgrade("x".into()).status(), StatusCode::BAD_REQUEST);

        let dial = ProxyError::from(DialError::Timeout {
            addr: "10.0.0.1:80".into(),
            timeout: Duration::from_secs(1),
        });
        assert_eq!(dial.status(), StatusCode::BAD_GATEWAY);
        assert!(dial.is_backend_failure());
        assert!(!ProxyError::Upstream("reset".into()).is_backend_failure());
    }

    #[test]
    fn test_response_hides_detail() {
        let response = ProxyError::NoBackend("internal-group".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
