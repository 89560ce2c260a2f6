//! Client identifier resolution.
//!
//! Rate-limit state is partitioned by a string key: the authenticated
//! user when one is known, otherwise the client network address. The
//! two namespaces are prefixed (`user_` / `ip_`) so a user id can never
//! collide with an address.
//!
//! Resolution is infallible; a request with no derivable address maps
//! to a shared sentinel key.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::security::auth::AuthenticatedUser;

/// Proxy forwarding headers, in trust priority order.
const FORWARD_HEADERS: [&str; 3] = ["cf-connecting-ip", "x-forwarded-for", "x-real-ip"];

/// Key used when no address can be determined at all.
pub const FALLBACK_KEY: &str = "ip_0.0.0.0";

/// Derive the rate-limit key for a request.
pub fn resolve(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    identity: Option<&AuthenticatedUser>,
) -> String {
    if let Some(user) = identity {
        return format!("user_{}", user.user_id);
    }

    for name in FORWARD_HEADERS {
        if let Some(addr) = headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .and_then(first_entry)
        {
            return format!("ip_{addr}");
        }
    }

    match peer {
        Some(addr) => format!("ip_{}", addr.ip()),
        None => FALLBACK_KEY.to_string(),
    }
}

/// `X-Forwarded-For` may carry a comma-separated chain; only the first
/// entry (the originating client) is used.
fn first_entry(value: &str) -> Option<&str> {
    let first = value.split(',').next().unwrap_or(value).trim();
    (!first.is_empty()).then_some(first)
}
