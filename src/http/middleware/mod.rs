//! Request middleware run ahead of the proxy handler.

pub mod waf;

pub use waf::waf_middleware;
