//! WAF checkpoint framework.
//!
//! # Data Flow
//! ```text
//! Inbound request (+ response for the response phase)
//!     → request.rs (WafRequest / WafResponse views)
//!     → frontend.rs (configured checkpoint list)
//!     → registry.rs (name → Checkpoint)
//!     → checkpoint.rs (request_value / response_value)
//!     → values handed to the rule engine
//! ```
//!
//! # Design Decisions
//! - Checkpoints are stateless and shared across requests
//! - System faults and caller-input problems are separate error variants
//! - Rule matching is not done here; a `RuleEngine` consumes the values

pub mod checkpoint;
pub mod frontend;
pub mod registry;
pub mod remote_addr;
pub mod request;
pub mod request_attrs;
pub mod response_attrs;

pub use checkpoint::{Checkpoint, CheckpointError, CheckpointResult, Options};
pub use frontend::{Evaluation, Phase, PassThrough, RuleEngine, Verdict, WafFrontend};
pub use registry::CheckpointRegistry;
pub use request::{WafRequest, WafResponse};
