//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build runtime → Start listener
//!
//! Shutdown (shutdown.rs):
//!     Ctrl+C / SIGTERM → broadcast → stop accepting → drain → exit
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - Open WebSocket sessions end with their connections

pub mod shutdown;

pub use shutdown::Shutdown;
