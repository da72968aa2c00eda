//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (routes reference existing backend groups)
//! - Validate addresses and TLS material pairs
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;

use crate::config::schema::{BackendScheme, ProxyConfig};
use crate::net::format_address;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("route '{route}' references unknown backend group '{group}'")]
    UnknownGroup { route: String, group: String },

    #[error("backend '{0}' has an empty address")]
    EmptyAddress(String),

    #[error("backend '{0}' uses a unix socket address, only TCP backends can be dialed")]
    UnixAddress(String),

    #[error("backend '{0}' has a client certificate but uses plain http")]
    CertWithoutTls(String),

    #[error("duplicate backend name '{0}'")]
    DuplicateBackend(String),

    #[error("route '{0}' rejects all origins: allow_all_origins is false and no origins are listed")]
    NoOrigins(String),

    #[error("header rule on route '{0}' has an empty name")]
    EmptyHeaderName(String),
}

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let mut names = HashSet::new();
    let groups: HashSet<&str> = config.backends.iter().map(|b| b.group.as_str()).collect();

    for backend in &config.backends {
        if !names.insert(backend.name.as_str()) {
            errors.push(ValidationError::DuplicateBackend(backend.name.clone()));
        }
        let address = format_address(&backend.address);
        if address.is_empty() {
            errors.push(ValidationError::EmptyAddress(backend.name.clone()));
        } else if address.starts_with("unix:") {
            errors.push(ValidationError::UnixAddress(backend.name.clone()));
        }
        if backend.cert.is_some() && backend.scheme == BackendScheme::Http {
            errors.push(ValidationError::CertWithoutTls(backend.name.clone()));
        }
    }

    for route in &config.routes {
        if !groups.contains(route.backend_group.as_str()) {
            errors.push(ValidationError::UnknownGroup {
                route: route.name.clone(),
                group: route.backend_group.clone(),
            });
        }
        if let Some(ws) = &route.websocket {
            if !ws.allow_all_origins && ws.origins.is_empty() {
                errors.push(ValidationError::NoOrigins(route.name.clone()));
            }
        }
        if route.request_headers.iter().any(|h| h.name.trim().is_empty()) {
            errors.push(ValidationError::EmptyHeaderName(route.name.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
