//! Header rewriting for requests leaving the proxy.

use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};

use crate::http::context::RequestContext;

/// Headers meaningful only for a single connection.
pub const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_BY: &str = "x-forwarded-by";
const X_FORWARDED_HOST: &str = "x-forwarded-host";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Copy inbound headers onto a backend websocket handshake, skipping the ones
/// the handshake generates itself.
pub fn copy_tunnel_headers(inbound: &HeaderMap, outbound: &mut HeaderMap) {
    for (name, value) in inbound {
        let skip = name.as_str().starts_with("sec-")
            || *name == header::UPGRADE
            || *name == header::CONNECTION
            || *name == header::HOST;
        if !skip {
            outbound.append(name.clone(), value.clone());
        }
    }
}

/// Add the forwarding headers describing the original client.
pub fn set_proxy_headers(headers: &mut HeaderMap, ctx: &RequestContext) {
    let client_ip = ctx.peer.ip().to_string();

    if !headers.contains_key(X_REAL_IP) {
        insert(headers, X_REAL_IP, &client_ip);
    }

    let forwarded_for = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect::<Vec<_>>()
        .join(", ");
    let forwarded_for = if forwarded_for.is_empty() {
        client_ip
    } else {
        format!("{}, {}", forwarded_for, client_ip)
    };
    insert(headers, X_FORWARDED_FOR, &forwarded_for);

    insert(headers, X_FORWARDED_BY, &ctx.server_addr);
    if !headers.contains_key(X_FORWARDED_HOST) {
        insert(headers, X_FORWARDED_HOST, &ctx.host());
    }
    if !headers.contains_key(X_FORWARDED_PROTO) {
        insert(headers, X_FORWARDED_PROTO, ctx.scheme);
    }
}

/// Apply the route's custom header rules, expanding variables when present.
pub fn apply_custom_headers(headers: &mut HeaderMap, ctx: &RequestContext) {
    for rule in ctx.request_headers.iter().filter(|rule| rule.on) {
        let value = if rule.has_variables() {
            ctx.format(&rule.value)
        } else {
            rule.value.clone()
        };
        let Ok(name) = HeaderName::from_bytes(rule.name.trim().as_bytes()) else {
            tracing::warn!(header = %rule.name, "Invalid custom header name");
            continue;
        };
        insert(headers, name, &value);
    }
}

fn insert<K: header::IntoHeaderName>(headers: &mut HeaderMap, name: K, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::debug!(value = %value, "Dropping header with invalid value"),
    }
}
