//! The checkpoint capability.

use std::collections::HashMap;
use std::fmt::Debug;

use serde_json::Value;
use thiserror::Error;

use crate::waf::request::{WafRequest, WafResponse};

/// Per-rule checkpoint options.
pub type Options = HashMap<String, String>;

/// `Ok(None)` means the checkpoint has no value for this request.
pub type CheckpointResult = Result<Option<Value>, CheckpointError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CheckpointError {
    /// The checkpoint itself is broken or saw malformed state.
    #[error("checkpoint fault: {0}")]
    System(String),

    /// The parameter or options supplied by the rule are unusable.
    #[error("invalid checkpoint input: {0}")]
    User(String),
}

impl CheckpointError {
    pub fn kind(&self) -> &'static str {
        match self {
            CheckpointError::System(_) => "system",
            CheckpointError::User(_) => "user",
        }
    }
}

/// Extracts one comparable value from a request/response pair.
pub trait Checkpoint: Send + Sync + Debug {
    /// Registry key, e.g. `remoteAddr`.
    fn name(&self) -> &'static str;

    /// Request-scoped checkpoints answer the response phase with their request value.
    fn is_request(&self) -> bool {
        true
    }

    fn request_value(&self, req: &WafRequest, param: &str, options: &Options) -> CheckpointResult;

    fn response_value(
        &self,
        req: &WafRequest,
        _resp: &WafResponse,
        param: &str,
        options: &Options,
    ) -> CheckpointResult {
        if self.is_request() {
            self.request_value(req, param, options)
        } else {
            Ok(None)
        }
    }
}

/// Reject an empty parameter with a user error.
pub(crate) fn require_param<'a>(checkpoint: &str, param: &'a str) -> Result<&'a str, CheckpointError> {
    let param = param.trim();
    if param.is_empty() {
        return Err(CheckpointError::User(format!("{} requires a parameter", checkpoint)));
    }
    Ok(param)
}
