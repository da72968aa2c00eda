//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ProxyConfig (validated, immutable)
//!     → compiled into a gateway runtime (router + backend pool)
//!
//! On file change (watched through the parent directory):
//!     watcher.rs filters events for the config file, skips unchanged text
//!     → loader.rs parses and validates
//!     → only a valid config is sent to the server
//!     → server swaps the runtime; old backends are dropped
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::{
    BackendCertConfig, BackendConfig, BackendScheme, CheckpointRef, ForwardMode, HeaderConfig,
    HealthCheckConfig, ListenerConfig, ProxyConfig, RouteConfig, WafConfig, WebsocketConfig,
};
