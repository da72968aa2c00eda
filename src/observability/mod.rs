//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms)
//!     → sink.rs (request-scoped transport errors, injected into the bridge)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through all subsystems
//! - Metrics are cheap (atomic increments) and no-ops until a recorder is installed
//! - The error sink is passed in at construction, not reached through a global

pub mod logging;
pub mod metrics;
pub mod sink;
