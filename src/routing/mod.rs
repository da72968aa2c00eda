//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request (Host header or URI authority, path)
//!     → router.rs: scan routes, highest priority first
//!     → matcher.rs: every Condition of the route must hold
//!     → Route (backend group, websocket settings, header rules) or None → 404
//! ```
//!
//! Routes are compiled from `RouteConfig` at startup and on every reload and
//! are never mutated afterwards.

pub mod matcher;
pub mod router;

pub use router::{Route, Router};
