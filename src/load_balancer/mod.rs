//! Load balancing subsystem.
//!
//! # Data Flow
//! ```text
//! Route matched → backend_group identified
//!     → pool.rs (group lookup)
//!     → round_robin.rs (rotate through backends that are not down)
//!     → backend.rs (connection guard, failure accounting)
//!     → Return backend or none
//! ```
//!
//! # Design Decisions
//! - Load balancer is stateless apart from its cursor; backends track their own counters
//! - Down backends are excluded from selection
//! - Failure accounting and down notification go through the pool

use std::sync::Arc;

pub mod backend;
pub mod pool;
pub mod round_robin;

pub use backend::{Backend, BackendStatus, ConnectionGuard};
pub use pool::BackendPool;

/// Selection strategy over one backend group.
pub trait LoadBalancer: Send + Sync + std::fmt::Debug {
    fn next_server(&self, backends: &[Arc<Backend>]) -> Option<Arc<Backend>>;
}
