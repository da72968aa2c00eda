//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::ProxyConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ProxyConfig, ConfigError> {
    let config: ProxyConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ProxyConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ForwardMode;

    #[test]
    fn test_parse_full_config() {
        let config = parse_config(
            r#"
            [listener]
            bind_address = "127.0.0.1:9000"

            [[backends]]
            name = "b1"
            group = "chat"
            address = "127.0.0.1:3000"
            max_conns = 10
            max_fails = 3

            [[routes]]
            name = "chat"
            path_prefix = "/ws"
            backend_group = "chat"

            [routes.websocket]
            allow_all_origins = false
            origins = ["*.example.com"]
            forward_mode = "http_emulation"

            [[routes.request_headers]]
            name = "X-Client"
            value = "${remoteAddr}"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.bind_address, "127.0.0.1:9000");
        assert_eq!(config.backends[0].max_fails, 3);
        let ws = config.routes[0].websocket.as_ref().unwrap();
        assert_eq!(ws.forward_mode, ForwardMode::HttpEmulation);
        assert!(config.routes[0].request_headers[0].on);
        assert!(config.routes[0].request_headers[0].has_variables());
    }

    #[test]
    fn test_validation_errors_surface() {
        let err = parse_config(
            r#"
            [[routes]]
            name = "r1"
            backend_group = "missing"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(parse_config("listener = 3"), Err(ConfigError::Parse(_))));
    }
}
