//! Backend health subsystem.
//!
//! # Data Flow
//! ```text
//! Failed dial/handshake (bridge)
//!     → BackendPool::increase_fails
//!     → threshold reached → Backend::mark_down (single winner)
//!     → notify.rs (DownNotifier hook, once per transition)
//!
//! Recovery (active.rs, optional):
//!     Periodic timer
//!     → Probe backends that have been down for at least their fail timeout
//!     → Backend::recover on success
//! ```
//!
//! # Design Decisions
//! - The request path only ever marks backends down
//! - Bringing a backend back is the job of an external collaborator;
//!   the bundled probe is one such collaborator and is off by default

pub mod active;
pub mod notify;
