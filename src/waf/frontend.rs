//! Checkpoint evaluation ahead of the bridge.
//!
//! The frontend runs the configured checkpoints for a phase and hands the
//! values to a [`RuleEngine`]. Checkpoint failures never abort the request;
//! they are logged by kind and the engine sees them in the evaluation list.

use std::fmt::Debug;
use std::sync::Arc;

use crate::config::{CheckpointRef, WafConfig};
use crate::observability::metrics;
use crate::waf::checkpoint::{Checkpoint, CheckpointError, CheckpointResult};
use crate::waf::registry::CheckpointRegistry;
use crate::waf::request::{WafRequest, WafResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Block,
}

/// One checkpoint's outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub checkpoint: String,
    pub param: String,
    pub result: CheckpointResult,
}

/// Consumer of checkpoint values. Matching and scoring live behind this trait.
pub trait RuleEngine: Send + Sync + Debug {
    fn decide(&self, phase: Phase, req: &WafRequest, evaluations: &[Evaluation]) -> Verdict;
}

/// Allows everything and traces the extracted values.
#[derive(Debug, Default)]
pub struct PassThrough;

impl RuleEngine for PassThrough {
    fn decide(&self, phase: Phase, req: &WafRequest, evaluations: &[Evaluation]) -> Verdict {
        for evaluation in evaluations {
            if let Ok(Some(value)) = &evaluation.result {
                tracing::trace!(
                    ?phase,
                    path = %req.uri.path(),
                    checkpoint = %evaluation.checkpoint,
                    param = %evaluation.param,
                    value = %value,
                    "Checkpoint value"
                );
            }
        }
        Verdict::Allow
    }
}

#[derive(Debug, Clone)]
struct Configured {
    checkpoint: Arc<dyn Checkpoint>,
    entry: CheckpointRef,
}

#[derive(Debug, Clone)]
pub struct WafFrontend {
    enabled: bool,
    checkpoints: Vec<Configured>,
    engine: Arc<dyn RuleEngine>,
}

impl WafFrontend {
    /// Resolve configured names against the registry. Unknown names are skipped.
    pub fn new(config: &WafConfig, registry: &CheckpointRegistry, engine: Arc<dyn RuleEngine>) -> Self {
        let checkpoints = config
            .checkpoints
            .iter()
            .filter_map(|entry| match registry.get(&entry.name) {
                Some(checkpoint) => Some(Configured {
                    checkpoint,
                    entry: entry.clone(),
                }),
                None => {
                    tracing::warn!(checkpoint = %entry.name, "Unknown checkpoint, skipping");
                    None
                }
            })
            .collect();

        Self {
            enabled: config.enabled,
            checkpoints,
            engine,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            checkpoints: Vec::new(),
            engine: Arc::new(PassThrough),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.checkpoints.is_empty()
    }

    /// Run every configured checkpoint for `phase`. `resp` is required for the response phase.
    pub fn evaluate(&self, phase: Phase, req: &WafRequest, resp: Option<&WafResponse>) -> Vec<Evaluation> {
        self.checkpoints
            .iter()
            .map(|configured| {
                let entry = &configured.entry;
                let result = match (phase, resp) {
                    (Phase::Response, Some(resp)) => {
                        configured
                            .checkpoint
                            .response_value(req, resp, &entry.param, &entry.options)
                    }
                    _ => configured.checkpoint.request_value(req, &entry.param, &entry.options),
                };
                if let Err(e) = &result {
                    log_failure(&entry.name, e);
                }
                Evaluation {
                    checkpoint: entry.name.clone(),
                    param: entry.param.clone(),
                    result,
                }
            })
            .collect()
    }

    pub fn inspect(&self, phase: Phase, req: &WafRequest, resp: Option<&WafResponse>) -> Verdict {
        if !self.is_enabled() {
            return Verdict::Allow;
        }
        let evaluations = self.evaluate(phase, req, resp);
        self.engine.decide(phase, req, &evaluations)
    }
}

fn log_failure(checkpoint: &str, error: &CheckpointError) {
    metrics::record_checkpoint_error(checkpoint, error.kind());
    match error {
        CheckpointError::System(_) => tracing::error!(checkpoint = %checkpoint, error = %error, "Checkpoint failed"),
        CheckpointError::User(_) => tracing::warn!(checkpoint = %checkpoint, error = %error, "Checkpoint misconfigured"),
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::BlockValue;
    use super::*;
    use axum::http::{HeaderMap, Method, StatusCode};
    use serde_json::Value;

    fn config(names: &[(&str, &str)]) -> WafConfig {
        WafConfig {
            enabled: true,
            checkpoints: names
                .iter()
                .map(|(name, param)| CheckpointRef {
                    name: name.to_string(),
                    param: param.to_string(),
                    options: Default::default(),
                })
                .collect(),
        }
    }

    fn request() -> WafRequest {
        WafRequest::new(Method::GET, "/".parse().unwrap(), "9.9.9.9:1234")
            .with_header("X-Forwarded-For", "6.6.6.6, 7.7.7.7")
    }

    #[test]
    fn test_unknown_checkpoints_skipped() {
        let frontend = WafFrontend::new(
            &config(&[("remoteAddr", ""), ("nope", "")]),
            &CheckpointRegistry::with_defaults(),
            Arc::new(PassThrough),
        );
        let evaluations = frontend.evaluate(Phase::Request, &request(), None);
        assert_eq!(evaluations.len(), 1);
        assert_eq!(evaluations[0].result, Ok(Some(Value::String("6.6.6.6".into()))));
    }

    #[test]
    fn test_errors_are_kept_in_evaluations() {
        let frontend = WafFrontend::new(
            &config(&[("requestHeader", ""), ("requestMethod", "")]),
            &CheckpointRegistry::with_defaults(),
            Arc::new(PassThrough),
        );
        let evaluations = frontend.evaluate(Phase::Request, &request(), None);
        assert!(matches!(evaluations[0].result, Err(CheckpointError::User(_))));
        assert_eq!(evaluations[1].result, Ok(Some(Value::String("GET".into()))));
    }

    #[test]
    fn test_response_phase() {
        let frontend = WafFrontend::new(
            &config(&[("responseStatus", ""), ("remoteAddr", "")]),
            &CheckpointRegistry::with_defaults(),
            Arc::new(PassThrough),
        );
        let resp = WafResponse::new(StatusCode::BAD_GATEWAY, HeaderMap::new());

        let request_phase = frontend.evaluate(Phase::Request, &request(), None);
        assert_eq!(request_phase[0].result, Ok(None));

        let response_phase = frontend.evaluate(Phase::Response, &request(), Some(&resp));
        assert_eq!(response_phase[0].result, Ok(Some(Value::from(502u16))));
        assert_eq!(response_phase[1].result, Ok(Some(Value::String("6.6.6.6".into()))));
    }

    #[test]
    fn test_engine_verdict() {
        let registry = CheckpointRegistry::with_defaults();
        let frontend = WafFrontend::new(&config(&[("remoteAddr", "")]), &registry, Arc::new(BlockValue("6.6.6.6")));
        assert_eq!(frontend.inspect(Phase::Request, &request(), None), Verdict::Block);

        let clean = WafRequest::new(Method::GET, "/".parse().unwrap(), "1.1.1.1:1");
        assert_eq!(frontend.inspect(Phase::Request, &clean, None), Verdict::Allow);

        let mut off = config(&[("remoteAddr", "")]);
        off.enabled = false;
        let frontend = WafFrontend::new(&off, &registry, Arc::new(BlockValue("6.6.6.6")));
        assert_eq!(frontend.inspect(Phase::Request, &request(), None), Verdict::Allow);
    }
}
