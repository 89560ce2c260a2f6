//! CORS layer construction.
//!
//! The layer echoes the request's Origin only when it matches the
//! configured allow-list. A wildcard is honored only without
//! credentials: config validation rejects the combination, and the
//! builder additionally drops `"*"` from explicit lists since
//! `tower_http` panics on wildcard-with-credentials. Preflight requests
//! are answered by the layer itself, which is what lets them bypass
//! rate limiting and authentication.

use std::time::Duration;

use axum::http::{header::HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::CorsConfig;

pub fn layer(config: &CorsConfig) -> CorsLayer {
    let wildcard = config.allowed_origins.iter().any(|o| o == "*") && !config.allow_credentials;

    let mut layer = CorsLayer::new().max_age(Duration::from_secs(config.max_age_secs));

    layer = if wildcard {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origin_values(config)))
    };

    layer = layer
        .allow_methods(method_values(config))
        .allow_headers(header_values(config));

    if config.allow_credentials {
        layer = layer.allow_credentials(true);
    }

    layer
}

fn origin_values(config: &CorsConfig) -> Vec<HeaderValue> {
    config
        .allowed_origins
        .iter()
        .filter(|origin| origin.as_str() != "*")
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Skipping unparseable CORS origin");
                None
            }
        })
        .collect()
}

fn method_values(config: &CorsConfig) -> Vec<Method> {
    config
        .allowed_methods
        .iter()
        .filter_map(|method| Method::from_bytes(method.as_bytes()).ok())
        .collect()
}

fn header_values(config: &CorsConfig) -> Vec<HeaderName> {
    config
        .allowed_headers
        .iter()
        .filter_map(|name| HeaderName::from_bytes(name.as_bytes()).ok())
        .collect()
}
