//! Process-wide error sink.
//!
//! Transport errors are recorded twice: in the request's own error list and
//! here, so that operators see them without threading a logger through every call.

use std::fmt::Debug;

pub trait ErrorSink: Send + Sync + Debug {
    fn report(&self, request_id: &str, path: &str, error: &str);
}

/// Default sink: one `error` event per report.
#[derive(Debug, Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn report(&self, request_id: &str, path: &str, error: &str) {
        tracing::error!(request_id = %request_id, path = %path, error = %error, "Request error");
    }
}
