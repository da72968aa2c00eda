//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Dial/handshake deadline used when a backend leaves `fail_timeout_secs` at 0.
pub const DEFAULT_FAIL_TIMEOUT: Duration = Duration::from_secs(15);

/// Client upgrade deadline used when a websocket leaves `handshake_timeout_secs` at 0.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Route definitions mapping requests to backend groups.
    pub routes: Vec<RouteConfig>,

    /// Backend server definitions.
    pub backends: Vec<BackendConfig>,

    /// Recovery probe settings.
    pub health_check: HealthCheckConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Checkpoint evaluation settings.
    pub waf: WafConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
            max_body_size: 2 * 1024 * 1024,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Route configuration mapping requests to backend groups.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Backend group name to forward to.
    pub backend_group: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,

    /// WebSocket handling for upgrade requests on this route.
    #[serde(default)]
    pub websocket: Option<WebsocketConfig>,

    /// Custom headers added to every request forwarded on this route.
    #[serde(default)]
    pub request_headers: Vec<HeaderConfig>,
}

/// Backend transport scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendScheme {
    #[default]
    Http,
    Https,
}

impl BackendScheme {
    pub fn http(&self) -> &'static str {
        match self {
            BackendScheme::Http => "http",
            BackendScheme::Https => "https",
        }
    }

    pub fn ws(&self) -> &'static str {
        match self {
            BackendScheme::Http => "ws",
            BackendScheme::Https => "wss",
        }
    }
}

/// Backend server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendConfig {
    /// Unique backend identifier.
    pub name: String,

    /// Backend group this server belongs to.
    pub group: String,

    /// Backend address (e.g., "127.0.0.1:3000").
    pub address: String,

    /// Plain or TLS transport.
    #[serde(default)]
    pub scheme: BackendScheme,

    /// Host presented to the backend instead of the inbound Host. May contain variables.
    #[serde(default)]
    pub host: Option<String>,

    /// Maximum concurrent tunnel sessions (0 = unlimited).
    #[serde(default)]
    pub max_conns: usize,

    /// Consecutive failures before the backend is marked down (0 = never).
    #[serde(default)]
    pub max_fails: u32,

    /// Dial and handshake deadline in seconds (0 = 15s).
    #[serde(default)]
    pub fail_timeout_secs: u64,

    /// Client certificate presented to TLS backends.
    #[serde(default)]
    pub cert: Option<BackendCertConfig>,
}

impl BackendConfig {
    /// Dial deadline, falling back to [`DEFAULT_FAIL_TIMEOUT`].
    pub fn fail_timeout(&self) -> Duration {
        if self.fail_timeout_secs == 0 {
            DEFAULT_FAIL_TIMEOUT
        } else {
            Duration::from_secs(self.fail_timeout_secs)
        }
    }
}

/// Client certificate used for mutual TLS with a backend.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BackendCertConfig {
    /// Path to certificate chain (PEM).
    pub cert_path: String,

    /// Path to private key (PEM).
    pub key_path: String,

    /// SNI / verification name override.
    #[serde(default)]
    pub server_name: Option<String>,
}

/// How upgraded WebSocket sessions reach the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ForwardMode {
    /// Persistent backend socket, frames relayed in both directions.
    #[default]
    DirectTunnel,
    /// Each client message becomes one backend HTTP call.
    HttpEmulation,
}

impl ForwardMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ForwardMode::DirectTunnel => "direct_tunnel",
            ForwardMode::HttpEmulation => "http_emulation",
        }
    }
}

/// WebSocket handling for a route.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebsocketConfig {
    /// Deadline for the client upgrade in seconds (0 = 5s).
    pub handshake_timeout_secs: u64,

    /// Skip the origin check.
    pub allow_all_origins: bool,

    /// Accepted origins: `*`, `*.example.com`, `example.com` or a full `https://example.com`.
    pub origins: Vec<String>,

    pub forward_mode: ForwardMode,
}

impl Default for WebsocketConfig {
    fn default() -> Self {
        Self {
            handshake_timeout_secs: 0,
            allow_all_origins: true,
            origins: Vec::new(),
            forward_mode: ForwardMode::DirectTunnel,
        }
    }
}

impl WebsocketConfig {
    pub fn handshake_timeout(&self) -> Duration {
        if self.handshake_timeout_secs == 0 {
            DEFAULT_HANDSHAKE_TIMEOUT
        } else {
            Duration::from_secs(self.handshake_timeout_secs)
        }
    }

    /// Return true if `origin` matches one of the configured patterns.
    pub fn match_origin(&self, origin: &str) -> bool {
        let origin = origin.trim().trim_end_matches('/');
        if origin.is_empty() {
            return false;
        }

        let host = url::Url::parse(origin)
            .ok()
            .and_then(|u| u.host_str().map(str::to_lowercase))
            .unwrap_or_else(|| origin.to_lowercase());

        self.origins.iter().any(|pattern| {
            let pattern = pattern.trim().trim_end_matches('/');
            if pattern == "*" {
                true
            } else if pattern.contains("://") {
                pattern.eq_ignore_ascii_case(origin)
            } else if let Some(suffix) = pattern.strip_prefix("*.") {
                let suffix = suffix.to_lowercase();
                host == suffix || host.ends_with(&format!(".{}", suffix))
            } else {
                pattern.eq_ignore_ascii_case(&host)
            }
        })
    }
}

/// A custom request header rule.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HeaderConfig {
    /// Disabled rules are skipped.
    #[serde(default = "default_on")]
    pub on: bool,

    pub name: String,

    /// Literal value or a template such as `${remoteAddr}`.
    pub value: String,
}

fn default_on() -> bool {
    true
}

impl HeaderConfig {
    pub fn has_variables(&self) -> bool {
        self.value.contains("${")
    }
}

/// Recovery probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HealthCheckConfig {
    /// Enable probing of down backends.
    pub enabled: bool,

    /// Probe interval in seconds.
    pub interval_secs: u64,

    /// Probe timeout in seconds.
    pub timeout_secs: u64,

    /// Path to probe.
    pub path: String,
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 10,
            timeout_secs: 5,
            path: "/health".to_string(),
        }
    }
}

/// Timeout configuration for plain HTTP requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Checkpoint evaluation configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WafConfig {
    /// Run checkpoints on every request.
    pub enabled: bool,

    /// Checkpoints to evaluate, in order.
    pub checkpoints: Vec<CheckpointRef>,
}

/// Reference to a registered checkpoint with its parameter and options.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CheckpointRef {
    /// Registered checkpoint name (e.g. `remoteAddr`).
    pub name: String,

    #[serde(default)]
    pub param: String,

    #[serde(default)]
    pub options: HashMap<String, String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ws(origins: &[&str]) -> WebsocketConfig {
        WebsocketConfig {
            allow_all_origins: false,
            origins: origins.iter().map(|s| s.to_string()).collect(),
            ..WebsocketConfig::default()
        }
    }

    #[test]
    fn test_origin_patterns() {
        let cfg = ws(&["*.example.com", "other.org", "https://exact.net"]);
        assert!(cfg.match_origin("https://app.example.com"));
        assert!(cfg.match_origin("http://example.com:8080"));
        assert!(cfg.match_origin("https://OTHER.org"));
        assert!(cfg.match_origin("https://exact.net/"));
        assert!(!cfg.match_origin("http://exact.net"));
        assert!(!cfg.match_origin("https://badexample.com"));
        assert!(!cfg.match_origin(""));
    }

    #[test]
    fn test_wildcard_origin() {
        assert!(ws(&["*"]).match_origin("null"));
        assert!(!ws(&[]).match_origin("https://example.com"));
    }

    #[test]
    fn test_default_timeouts() {
        let backend: BackendConfig = toml::from_str(
            r#"
            name = "b1"
            group = "web"
            address = "127.0.0.1:3000"
            "#,
        )
        .unwrap();
        assert_eq!(backend.fail_timeout(), DEFAULT_FAIL_TIMEOUT);
        assert_eq!(backend.scheme, BackendScheme::Http);
        assert_eq!(WebsocketConfig::default().handshake_timeout(), DEFAULT_HANDSHAKE_TIMEOUT);
    }

    #[test]
    fn test_forward_mode_names() {
        let cfg: WebsocketConfig = toml::from_str(r#"forward_mode = "http_emulation""#).unwrap();
        assert_eq!(cfg.forward_mode, ForwardMode::HttpEmulation);
    }
}
