//! Backend abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server
//! - Track active connections and enforce the max connection limit
//! - Track consecutive failures and the down flag
//!
//! Counters are only reachable through methods. Connection counting goes
//! through [`ConnectionGuard`], so every increase is paired with one decrease.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use axum::body::Body;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::{connect::HttpConnector, Client};
use hyper_util::rt::TokioExecutor;
use rustls::ClientConfig;
use serde::Serialize;

use crate::config::{BackendCertConfig, BackendConfig, BackendScheme};
use crate::net::dial::TlsTarget;
use crate::net::format_address;
use crate::net::tls::{self, TlsError};

/// HTTP client bound to one backend's TLS settings.
pub type HttpClient = Client<HttpsConnector<HttpConnector>, Body>;

/// A single backend server.
#[derive(Debug)]
pub struct Backend {
    pub name: String,
    pub group: String,
    /// Normalised dial address.
    pub address: String,
    pub scheme: BackendScheme,
    /// Host override; may contain variables.
    pub host: Option<String>,
    pub cert: Option<BackendCertConfig>,
    /// Maximum concurrent tunnel sessions (0 = unlimited).
    pub max_conns: usize,
    /// Consecutive failures before going down (0 = never).
    pub max_fails: u32,
    pub fail_timeout: Duration,

    tls: Arc<ClientConfig>,
    client: HttpClient,

    current_conns: AtomicUsize,
    current_fails: AtomicU32,
    down: AtomicBool,
    down_time: Mutex<Option<SystemTime>>,
}

impl Backend {
    /// Create a backend from configuration, loading its TLS material.
    pub fn from_config(config: &BackendConfig) -> Result<Self, TlsError> {
        let tls = tls::backend_client_config(config.cert.as_ref())?;
        let server_name = config
            .cert
            .as_ref()
            .and_then(|c| c.server_name.clone())
            .filter(|name| !name.is_empty());

        Ok(Self {
            name: config.name.clone(),
            group: config.group.clone(),
            address: format_address(&config.address),
            scheme: config.scheme,
            host: config.host.clone().filter(|h| !h.is_empty()),
            cert: config.cert.clone(),
            max_conns: config.max_conns,
            max_fails: config.max_fails,
            fail_timeout: config.fail_timeout(),
            client: build_client(tls.clone(), server_name, config.fail_timeout()),
            tls,
            current_conns: AtomicUsize::new(0),
            current_fails: AtomicU32::new(0),
            down: AtomicBool::new(false),
            down_time: Mutex::new(None),
        })
    }

    /// HTTP client used for proxied requests to this backend.
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// TLS parameters for a raw dial, or `None` for plain backends.
    /// `host` is the Host presented to the backend, used for SNI when no override is set.
    pub fn tls_target(&self, host: &str) -> Option<TlsTarget> {
        if self.scheme != BackendScheme::Https {
            return None;
        }
        let override_name = self.cert.as_ref().and_then(|c| c.server_name.as_deref());
        let server_name = tls::server_name(override_name, host)
            .or_else(|| tls::server_name(None, &self.address))?;
        Some(TlsTarget {
            config: self.tls.clone(),
            server_name,
        })
    }

    // --- Connections ---

    /// Get the current number of active connections.
    pub fn current_conns(&self) -> usize {
        self.current_conns.load(Ordering::Acquire)
    }

    /// Count a connection without an admission check.
    pub fn acquire(self: &Arc<Self>) -> ConnectionGuard {
        self.current_conns.fetch_add(1, Ordering::AcqRel);
        ConnectionGuard {
            backend: self.clone(),
        }
    }

    /// Admission check and increment as one step.
    /// Returns `None` when `max_conns > 0` and the limit is reached.
    pub fn try_acquire(self: &Arc<Self>) -> Option<ConnectionGuard> {
        let mut prev = self.current_conns.load(Ordering::Acquire);
        loop {
            if self.max_conns > 0 && prev >= self.max_conns {
                return None;
            }
            match self.current_conns.compare_exchange_weak(
                prev,
                prev + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(x) => prev = x,
            }
        }
        Some(ConnectionGuard {
            backend: self.clone(),
        })
    }

    fn release(&self) {
        let _ = self
            .current_conns
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1));
    }

    // --- Health ---

    pub fn current_fails(&self) -> u32 {
        self.current_fails.load(Ordering::Acquire)
    }

    /// Count one failed dial/handshake and return the new count.
    pub fn increase_fails(&self) -> u32 {
        self.current_fails.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Return true if `fails` reaches the configured threshold.
    pub fn exceeds_max_fails(&self, fails: u32) -> bool {
        self.max_fails > 0 && fails >= self.max_fails
    }

    pub fn is_down(&self) -> bool {
        self.down.load(Ordering::Acquire)
    }

    pub fn down_time(&self) -> Option<SystemTime> {
        *self.down_time.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Flip the backend to down. Returns true only for the caller that made the transition.
    pub fn mark_down(&self) -> bool {
        let mut down_time = self.down_time.lock().unwrap_or_else(|e| e.into_inner());
        if self
            .down
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *down_time = Some(SystemTime::now());
        true
    }

    /// Bring a down backend back into rotation. Called by the recovery collaborator.
    pub fn recover(&self) -> bool {
        let mut down_time = self.down_time.lock().unwrap_or_else(|e| e.into_inner());
        self.current_fails.store(0, Ordering::Release);
        if self
            .down
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }
        *down_time = None;
        true
    }

    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            name: self.name.clone(),
            group: self.group.clone(),
            address: self.address.clone(),
            is_down: self.is_down(),
            current_conns: self.current_conns(),
            current_fails: self.current_fails(),
            down_time: self.down_time(),
        }
    }
}

fn build_client(tls: Arc<ClientConfig>, server_name: Option<String>, connect_timeout: Duration) -> HttpClient {
    let builder = HttpsConnectorBuilder::new()
        .with_tls_config((*tls).clone())
        .https_or_http();

    #[allow(deprecated)]
    let builder = match server_name {
        Some(name) => builder.with_server_name(name),
        None => builder,
    };

    let mut http = HttpConnector::new();
    http.enforce_http(false);
    http.set_nodelay(true);
    http.set_connect_timeout(Some(connect_timeout));

    let connector = builder.enable_http1().wrap_connector(http);
    Client::builder(TokioExecutor::new()).build(connector)
}

/// Snapshot of a backend's health for status displays.
#[derive(Debug, Clone, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub group: String,
    pub address: String,
    pub is_down: bool,
    pub current_conns: usize,
    pub current_fails: u32,
    pub down_time: Option<SystemTime>,
}

/// A RAII guard that manages the active connection count.
#[derive(Debug)]
pub struct ConnectionGuard {
    backend: Arc<Backend>,
}

impl ConnectionGuard {
    pub fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }
}

impl Deref for ConnectionGuard {
    type Target = Backend;
    fn deref(&self) -> &Self::Target {
        &self.backend
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.backend.release();
    }
}

#[cfg(test)]
pub(crate) fn test_backend(name: &str, address: &str, max_conns: usize, max_fails: u32) -> Arc<Backend> {
    let config = BackendConfig {
        name: name.into(),
        group: "web".into(),
        address: address.into(),
        scheme: BackendScheme::Http,
        host: None,
        max_conns,
        max_fails,
        fail_timeout_secs: 1,
        cert: None,
    };
    Arc::new(Backend::from_config(&config).unwrap())
}
