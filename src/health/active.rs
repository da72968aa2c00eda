//! Probe-based recovery of down backends.
//!
//! # Responsibilities
//! - Periodically probe backends that are down
//! - Wait at least the backend's fail timeout after the down transition
//! - Bring the backend back into rotation when the probe succeeds

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use axum::body::Body;
use axum::http::Request;
use tokio::sync::broadcast;
use tokio::time;

use crate::config::HealthCheckConfig;
use crate::load_balancer::{Backend, BackendPool};

/// Current set of backends to watch. Reloads may replace it between ticks.
pub trait BackendSource: Send + Sync {
    fn backends(&self) -> Vec<Arc<Backend>>;
}

impl BackendSource for BackendPool {
    fn backends(&self) -> Vec<Arc<Backend>> {
        self.all_backends()
    }
}

pub struct RecoveryMonitor {
    backends: Arc<dyn BackendSource>,
    config: HealthCheckConfig,
}

impl RecoveryMonitor {
    pub fn new(backends: Arc<dyn BackendSource>, config: HealthCheckConfig) -> Self {
        Self { backends, config }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if !self.config.enabled {
            tracing::info!("Recovery probes disabled");
            return;
        }

        tracing::info!(
            interval = self.config.interval_secs,
            path = %self.config.path,
            "Recovery monitor starting"
        );

        let mut ticker = time::interval(Duration::from_secs(self.config.interval_secs.max(1)));

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.check_down_backends().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!("Recovery monitor received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }

    pub async fn check_down_backends(&self) {
        for backend in self.backends.backends() {
            if !backend.is_down() || !cooled_down(&backend) {
                continue;
            }

            if self.probe(&backend).await && backend.recover() {
                tracing::info!(backend = %backend.name, address = %backend.address, "Backend recovered");
            }
        }
    }

    async fn probe(&self, backend: &Backend) -> bool {
        let uri = format!("{}://{}{}", backend.scheme.http(), backend.address, self.config.path);
        let request = match Request::builder()
            .method("GET")
            .uri(uri)
            .header("user-agent", "ws-gateway-recovery-probe")
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => {
                tracing::error!("Failed to build probe request: {}", e);
                return false;
            }
        };

        let timeout = Duration::from_secs(self.config.timeout_secs);
        match time::timeout(timeout, backend.client().request(request)).await {
            Ok(Ok(response)) => {
                let success = response.status().is_success();
                if !success {
                    tracing::debug!(backend = %backend.name, status = %response.status(), "Probe failed: non-success status");
                }
                success
            }
            Ok(Err(e)) => {
                tracing::debug!(backend = %backend.name, error = %e, "Probe failed: connection error");
                false
            }
            Err(_) => {
                tracing::debug!(backend = %backend.name, "Probe failed: timeout");
                false
            }
        }
    }
}

fn cooled_down(backend: &Backend) -> bool {
    backend
        .down_time()
        .and_then(|t| SystemTime::now().duration_since(t).ok())
        .map(|elapsed| elapsed >= backend.fail_timeout)
        .unwrap_or(true)
}
