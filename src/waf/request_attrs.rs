//! Request-scoped checkpoints over the request line, headers and query.

use serde_json::Value;

use crate::waf::checkpoint::{require_param, Checkpoint, CheckpointError, CheckpointResult, Options};
use crate::waf::remote_addr::strip_port;
use crate::waf::request::WafRequest;

/// Peer address without its port, ignoring forwarding headers.
#[derive(Debug, Default)]
pub struct RawRemoteAddrCheckpoint;

impl Checkpoint for RawRemoteAddrCheckpoint {
    fn name(&self) -> &'static str {
        "rawRemoteAddr"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(Some(Value::String(strip_port(&req.remote_addr).to_string())))
    }
}

/// Peer port. No value when the peer carries no port.
#[derive(Debug, Default)]
pub struct RemotePortCheckpoint;

impl Checkpoint for RemotePortCheckpoint {
    fn name(&self) -> &'static str {
        "remotePort"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        let Some((_, port)) = req.remote_addr.rsplit_once(':') else {
            return Ok(None);
        };
        port.parse::<u16>()
            .map(|port| Some(Value::from(port)))
            .map_err(|_| CheckpointError::System(format!("malformed peer address '{}'", req.remote_addr)))
    }
}

#[derive(Debug, Default)]
pub struct RequestMethodCheckpoint;

impl Checkpoint for RequestMethodCheckpoint {
    fn name(&self) -> &'static str {
        "requestMethod"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(Some(Value::String(req.method.to_string())))
    }
}

/// Path plus query.
#[derive(Debug, Default)]
pub struct RequestUriCheckpoint;

impl Checkpoint for RequestUriCheckpoint {
    fn name(&self) -> &'static str {
        "requestURI"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        let uri = req
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        Ok(Some(Value::String(uri.to_string())))
    }
}

#[derive(Debug, Default)]
pub struct RequestPathCheckpoint;

impl Checkpoint for RequestPathCheckpoint {
    fn name(&self) -> &'static str {
        "requestPath"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(Some(Value::String(req.uri.path().to_string())))
    }
}

#[derive(Debug, Default)]
pub struct RequestHostCheckpoint;

impl Checkpoint for RequestHostCheckpoint {
    fn name(&self) -> &'static str {
        "requestHost"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        let host = req
            .header("Host")
            .map(str::to_string)
            .or_else(|| req.uri.authority().map(|a| a.to_string()));
        Ok(host.map(Value::String))
    }
}

/// Value of the header named by `param`.
#[derive(Debug, Default)]
pub struct RequestHeaderCheckpoint;

impl Checkpoint for RequestHeaderCheckpoint {
    fn name(&self) -> &'static str {
        "requestHeader"
    }

    fn request_value(&self, req: &WafRequest, param: &str, _options: &Options) -> CheckpointResult {
        let name = require_param(self.name(), param)?;
        Ok(req.header(name).map(|v| Value::String(v.to_string())))
    }
}

/// Value of the query argument named by `param`.
#[derive(Debug, Default)]
pub struct RequestArgCheckpoint;

impl Checkpoint for RequestArgCheckpoint {
    fn name(&self) -> &'static str {
        "requestArg"
    }

    fn request_value(&self, req: &WafRequest, param: &str, _options: &Options) -> CheckpointResult {
        let name = require_param(self.name(), param)?;
        Ok(req.query_arg(name).map(Value::String))
    }
}

/// Declared request body length; 0 without a `Content-Length`.
#[derive(Debug, Default)]
pub struct RequestLengthCheckpoint;

impl Checkpoint for RequestLengthCheckpoint {
    fn name(&self) -> &'static str {
        "requestLength"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        let Some(length) = req.header("Content-Length") else {
            return Ok(Some(Value::from(0u64)));
        };
        length
            .trim()
            .parse::<u64>()
            .map(|n| Some(Value::from(n)))
            .map_err(|_| CheckpointError::System(format!("malformed Content-Length '{}'", length)))
    }
}
