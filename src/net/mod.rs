//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Listener side:
//!     tls.rs (optional rustls acceptor config for the inbound listener)
//!
//! Backend side:
//!     BackendConfig.address → format_address (normalise)
//!     → dial.rs (TCP connect with deadline)
//!     → tls.rs (optional client TLS, client certificate, SNI override)
//!     → Hand off to the WebSocket tunnel
//! ```
//!
//! # Design Decisions
//! - Every backend dial has a deadline
//! - TLS is optional and handled transparently behind one stream type

pub mod dial;
pub mod tls;

/// Normalise a configured address: drop blanks, turn full-width colons into `:`.
/// `unix:` addresses are returned untouched.
pub fn format_address(addr: &str) -> String {
    if addr.starts_with("unix:") {
        return addr.to_string();
    }
    addr.chars()
        .filter(|c| *c != ' ' && *c != '\t')
        .map(|c| if c == '：' { ':' } else { c })
        .collect::<String>()
        .trim()
        .to_string()
}
