//! Response-scoped checkpoints. They yield nothing during the request phase.

use serde_json::Value;

use crate::waf::checkpoint::{require_param, Checkpoint, CheckpointError, CheckpointResult, Options};
use crate::waf::request::{WafRequest, WafResponse};

#[derive(Debug, Default)]
pub struct ResponseStatusCheckpoint;

impl Checkpoint for ResponseStatusCheckpoint {
    fn name(&self) -> &'static str {
        "responseStatus"
    }

    fn is_request(&self) -> bool {
        false
    }

    fn request_value(&self, _req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(None)
    }

    fn response_value(
        &self,
        _req: &WafRequest,
        resp: &WafResponse,
        _param: &str,
        _options: &Options,
    ) -> CheckpointResult {
        Ok(Some(Value::from(resp.status.as_u16())))
    }
}

#[derive(Debug, Default)]
pub struct ResponseHeaderCheckpoint;

impl Checkpoint for ResponseHeaderCheckpoint {
    fn name(&self) -> &'static str {
        "responseHeader"
    }

    fn is_request(&self) -> bool {
        false
    }

    fn request_value(&self, _req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(None)
    }

    fn response_value(
        &self,
        _req: &WafRequest,
        resp: &WafResponse,
        param: &str,
        _options: &Options,
    ) -> CheckpointResult {
        let name = require_param(self.name(), param)?;
        Ok(resp
            .headers
            .get(name)
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned())))
    }
}

/// Declared response body size; no value for streamed bodies.
#[derive(Debug, Default)]
pub struct ResponseBodySizeCheckpoint;

impl Checkpoint for ResponseBodySizeCheckpoint {
    fn name(&self) -> &'static str {
        "responseBodySize"
    }

    fn is_request(&self) -> bool {
        false
    }

    fn request_value(&self, _req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(None)
    }

    fn response_value(
        &self,
        _req: &WafRequest,
        resp: &WafResponse,
        _param: &str,
        _options: &Options,
    ) -> CheckpointResult {
        let Some(length) = resp.headers.get(axum::http::header::CONTENT_LENGTH) else {
            return Ok(None);
        };
        length
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|n| Some(Value::from(n)))
            .ok_or_else(|| CheckpointError::System("malformed response Content-Length".into()))
    }
}
