//! WebSocket-aware reverse-proxy gateway.
//!
//! Routes HTTP and WebSocket traffic to backend pools, tracks backend health
//! for failover, bridges WebSocket sessions either as a direct tunnel or as
//! per-message HTTP calls, and extracts WAF checkpoint values for an external
//! rule engine.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;
pub mod waf;

// Traffic management
pub mod health;
pub mod load_balancer;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
