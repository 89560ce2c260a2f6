//! Security response headers.
//!
//! # Responsibilities
//! - Attach hardening headers to every response
//! - Select Content-Security-Policy strictness per environment
//! - Send HSTS only on connections detected as HTTPS
//!
//! # Design Decisions
//! - HTTPS detection trusts forwarding headers only when configured to
//!   sit behind a proxy; never on direct connections
//! - Headers overwrite whatever a handler set: the gateway owns the
//!   security posture

use axum::{
    extract::{Request, State},
    http::{header, header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

use crate::config::{AppEnv, SecurityConfig};
use crate::http::server::AppState;

const PERMISSIONS_POLICY: &str = "camera=(), microphone=(), geolocation=()";
const HSTS: &str = "max-age=31536000; includeSubDomains";
const CSP_PRODUCTION: &str =
    "default-src 'self'; frame-ancestors 'self'; base-uri 'self'; form-action 'self'";
const CSP_DEVELOPMENT: &str =
    "default-src 'self' 'unsafe-inline' 'unsafe-eval' data: blob:; frame-ancestors 'self'";

pub fn csp_for(environment: AppEnv) -> &'static str {
    match environment {
        AppEnv::Production => CSP_PRODUCTION,
        AppEnv::Development => CSP_DEVELOPMENT,
    }
}

/// HTTPS detection: direct flag first, then trusted forwarding headers.
pub fn is_https(request: &Request, config: &SecurityConfig) -> bool {
    if config.force_https {
        return true;
    }
    if !config.trust_proxy_headers {
        return false;
    }

    let forwarded_proto = request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .split(',')
                .next()
                .unwrap_or(value)
                .trim()
                .eq_ignore_ascii_case("https")
        })
        .unwrap_or(false);

    forwarded_proto
        || request
            .headers()
            .get(header::FORWARDED)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_ascii_lowercase().contains("proto=https"))
            .unwrap_or(false)
}

/// Security-headers middleware; applied to every non-preflight response.
pub async fn apply(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let https = is_https(&request, &state.config.security);
    let environment = state.config.security.environment;

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("SAMEORIGIN"),
    );
    headers.insert(
        header::REFERRER_POLICY,
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(csp_for(environment)),
    );
    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(PERMISSIONS_POLICY),
    );
    if https {
        headers.insert(
            header::STRICT_TRANSPORT_SECURITY,
            HeaderValue::from_static(HSTS),
        );
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn config() -> SecurityConfig {
        SecurityConfig::default()
    }

    fn request_with(name: &str, value: &str) -> Request {
        axum::http::Request::builder()
            .header(name, value)
            .body(Body::empty())
            .unwrap()
    }

    fn bare_request() -> Request {
        axum::http::Request::builder().body(Body::empty()).unwrap()
    }

    #[test]
    fn plain_http_is_not_https() {
        assert!(!is_https(&bare_request(), &config()));
    }

    #[test]
    fn force_flag_wins() {
        let mut config = config();
        config.force_https = true;
        assert!(is_https(&bare_request(), &config));
    }

    #[test]
    fn forwarded_proto_detected_when_trusted() {
        assert!(is_https(
            &request_with("x-forwarded-proto", "https"),
            &config()
        ));
        assert!(is_https(
            &request_with("x-forwarded-proto", "https, http"),
            &config()
        ));
        assert!(!is_https(
            &request_with("x-forwarded-proto", "http"),
            &config()
        ));
        assert!(is_https(
            &request_with("forwarded", "for=10.0.0.1;proto=https"),
            &config()
        ));
    }

    #[test]
    fn forwarded_proto_ignored_when_untrusted() {
        let mut config = config();
        config.trust_proxy_headers = false;
        assert!(!is_https(&request_with("x-forwarded-proto", "https"), &config));
    }

    #[test]
    fn csp_is_stricter_in_production() {
        assert!(!csp_for(AppEnv::Production).contains("unsafe-inline"));
        assert!(csp_for(AppEnv::Development).contains("unsafe-inline"));
    }
}
