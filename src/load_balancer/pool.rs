//! Backend pool management.
//!
//! # Responsibilities
//! - Manage collections of backends grouped by name
//! - Apply load balancing algorithms to select backends
//! - Account failures and fire the down notification once per transition

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{BackendConfig, ForwardMode};
use crate::health::notify::{BackendDownEvent, DownNotifier};
use crate::load_balancer::{backend::Backend, round_robin::RoundRobin, BackendStatus, LoadBalancer};
use crate::observability::metrics;

/// Where a failure was observed, carried into the down event.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailureScope<'a> {
    pub route: Option<&'a str>,
    pub forward_mode: Option<ForwardMode>,
}

/// Manages backend groups and load balancing.
#[derive(Debug)]
pub struct BackendPool {
    /// Map of backend_group name -> (Backends, LoadBalancerAlgo).
    groups: HashMap<String, (Vec<Arc<Backend>>, Box<dyn LoadBalancer>)>,
    notifier: Arc<dyn DownNotifier>,
}

impl BackendPool {
    /// Create a new backend pool from configuration.
    pub fn new(configs: &[BackendConfig], notifier: Arc<dyn DownNotifier>) -> Self {
        let mut groups: HashMap<String, Vec<Arc<Backend>>> = HashMap::new();

        for config in configs {
            match Backend::from_config(config) {
                Ok(backend) => {
                    groups.entry(config.group.clone()).or_default().push(Arc::new(backend));
                }
                Err(e) => {
                    tracing::warn!(backend = %config.name, error = %e, "Skipping backend with invalid TLS material");
                }
            }
        }

        let groups = groups
            .into_iter()
            .map(|(name, backends)| {
                let lb: Box<dyn LoadBalancer> = Box::new(RoundRobin::new());
                (name, (backends, lb))
            })
            .collect();

        Self { groups, notifier }
    }

    /// Select a backend for the given group. `None` means no backend is eligible.
    pub fn select(&self, group_name: &str) -> Option<Arc<Backend>> {
        let Some((backends, lb)) = self.groups.get(group_name) else {
            tracing::debug!(group = %group_name, "Group not found in BackendPool");
            return None;
        };

        let selected = lb.next_server(backends);
        if selected.is_none() {
            tracing::debug!(group = %group_name, backend_count = backends.len(), "No available backends in group");
        }
        selected
    }

    /// Record one failed dial or handshake against `backend` and return the new count.
    ///
    /// Crossing the threshold marks the backend down; only the call that wins
    /// the transition notifies.
    pub fn increase_fails(&self, backend: &Backend, scope: FailureScope<'_>) -> u32 {
        let fails = backend.increase_fails();
        metrics::record_backend_failure(&backend.name);

        if backend.exceeds_max_fails(fails) && backend.mark_down() {
            let event = BackendDownEvent {
                backend: backend.name.clone(),
                group: backend.group.clone(),
                address: backend.address.clone(),
                route: scope.route.map(str::to_string),
                forward_mode: scope.forward_mode,
                fails,
                down_time: backend.down_time(),
            };
            metrics::record_backend_down(&backend.name);
            self.notifier.backend_down(&event);
        }
        fails
    }

    /// Return a list of all backends (for health checking).
    pub fn all_backends(&self) -> Vec<Arc<Backend>> {
        self.groups
            .values()
            .flat_map(|(backends, _)| backends.iter())
            .cloned()
            .collect()
    }

    pub fn statuses(&self) -> Vec<BackendStatus> {
        let mut statuses: Vec<_> = self.all_backends().iter().map(|b| b.status()).collect();
        statuses.sort_by(|a, b| a.name.cmp(&b.name));
        statuses
    }
}
