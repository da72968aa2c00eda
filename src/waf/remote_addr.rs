//! Client address checkpoint.

use serde_json::Value;

use crate::waf::checkpoint::{Checkpoint, CheckpointResult, Options};
use crate::waf::request::WafRequest;

/// Originating client address, resolved in order:
/// `X-Forwarded-For` (first hop), `X-Real-IP`, `X-Real-Ip`, then the peer address without its port.
#[derive(Debug, Default)]
pub struct RemoteAddrCheckpoint;

impl Checkpoint for RemoteAddrCheckpoint {
    fn name(&self) -> &'static str {
        "remoteAddr"
    }

    fn request_value(&self, req: &WafRequest, _param: &str, _options: &Options) -> CheckpointResult {
        Ok(Some(Value::String(resolve_remote_addr(req))))
    }
}

pub fn resolve_remote_addr(req: &WafRequest) -> String {
    if let Some(forwarded_for) = req.header("X-Forwarded-For").filter(|v| !v.is_empty()) {
        return match forwarded_for.find(',') {
            Some(idx) if idx > 0 => forwarded_for[..idx].trim().to_string(),
            _ => forwarded_for.to_string(),
        };
    }

    // Exact-name lookups; the two spellings are separate keys.
    for name in ["X-Real-IP", "X-Real-Ip"] {
        if let Some(real_ip) = req.header_exact(name).first().filter(|v| !v.is_empty()) {
            return real_ip.to_string();
        }
    }

    strip_port(&req.remote_addr).to_string()
}

/// Drop everything from the last colon on; values without a colon are returned as is.
pub fn strip_port(addr: &str) -> &str {
    match addr.rfind(':') {
        Some(idx) => &addr[..idx],
        None => addr,
    }
}
