//! Down-notification hook.

use std::time::SystemTime;

use serde::Serialize;

use crate::config::ForwardMode;

/// Emitted once when a backend transitions to down.
#[derive(Debug, Clone, Serialize)]
pub struct BackendDownEvent {
    pub backend: String,
    pub group: String,
    pub address: String,
    /// Route the failing request was served on.
    pub route: Option<String>,
    /// Set when the failure happened while opening a WebSocket tunnel.
    pub forward_mode: Option<ForwardMode>,
    pub fails: u32,
    pub down_time: Option<SystemTime>,
}

/// Receives backend down transitions.
pub trait DownNotifier: Send + Sync + std::fmt::Debug {
    fn backend_down(&self, event: &BackendDownEvent);
}

/// Default notifier: a structured warning.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl DownNotifier for TracingNotifier {
    fn backend_down(&self, event: &BackendDownEvent) {
        tracing::warn!(
            backend = %event.backend,
            group = %event.group,
            address = %event.address,
            route = ?event.route,
            forward_mode = ?event.forward_mode,
            fails = event.fails,
            "Backend marked down"
        );
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingNotifier {
        events: Mutex<Vec<BackendDownEvent>>,
    }

    impl RecordingNotifier {
        pub fn events(&self) -> Vec<BackendDownEvent> {
            self.events.lock().unwrap().clone()
        }
    }

    impl DownNotifier for RecordingNotifier {
        fn backend_down(&self, event: &BackendDownEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }
}
