//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, request id, tracing, limits)
//!     → middleware/waf.rs (checkpoint evaluation)
//!     → routing + pool selection (server.rs proxy_handler)
//!     → context.rs (per-request state, error list)
//!     → bridge.rs (plain HTTP) or websocket/ (upgrade + tunnel)
//!     → response.rs (relay backend response)
//! ```

pub mod bridge;
pub mod context;
pub mod headers;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;
pub mod template;
pub mod websocket;

pub use bridge::Bridge;
pub use context::RequestContext;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::{GatewayRuntime, HttpServer};
