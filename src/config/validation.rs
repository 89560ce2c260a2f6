//! Configuration validation.
//!
//! Semantic validation (serde handles syntactic). Returns all
//! validation errors, not just the first, so a broken deployment can be
//! fixed in one pass. Pure function: `GatewayConfig -> Result<(), Vec<ValidationError>>`.

use std::net::SocketAddr;

use axum::http::{header::HeaderName, HeaderValue, Method};
use thiserror::Error;

use crate::config::schema::GatewayConfig;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroMaxRequests,
    #[error("rate_limit.window_secs must be greater than zero")]
    ZeroWindow,
    #[error("listener.bind_address is not a valid socket address: {0:?}")]
    InvalidBindAddress(String),
    #[error("auth.jwt_secret must not be empty")]
    EmptyJwtSecret,
    #[error("cors: a wildcard origin cannot be combined with allow_credentials")]
    WildcardWithCredentials,
    #[error("cors: invalid origin {0:?}")]
    InvalidOrigin(String),
    #[error("cors: invalid method {0:?}")]
    InvalidMethod(String),
    #[error("cors: invalid header name {0:?}")]
    InvalidHeader(String),
    #[error("observability.metrics_address is not a valid socket address: {0:?}")]
    InvalidMetricsAddress(String),
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroMaxRequests);
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::ZeroWindow);
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    if config.auth.jwt_secret.is_empty() {
        errors.push(ValidationError::EmptyJwtSecret);
    }

    let wildcard = config.cors.allowed_origins.iter().any(|o| o == "*");
    if wildcard && config.cors.allow_credentials {
        errors.push(ValidationError::WildcardWithCredentials);
    }
    for origin in &config.cors.allowed_origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::InvalidOrigin(origin.clone()));
        }
    }
    for method in &config.cors.allowed_methods {
        if Method::from_bytes(method.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidMethod(method.clone()));
        }
    }
    for header in &config.cors.allowed_headers {
        if HeaderName::from_bytes(header.as_bytes()).is_err() {
            errors.push(ValidationError::InvalidHeader(header.clone()));
        }
    }

    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::InvalidMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.auth.jwt_secret = "test-secret".to_string();
        config
    }

    #[test]
    fn default_config_with_secret_is_valid() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn all_errors_are_collected() {
        let mut config = valid_config();
        config.rate_limit.max_requests = 0;
        config.auth.jwt_secret.clear();
        config.cors.allow_credentials = true; // with default wildcard origin

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::ZeroMaxRequests)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::EmptyJwtSecret)));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::WildcardWithCredentials)));
    }

    #[test]
    fn rejects_unparseable_cors_entries() {
        let mut config = valid_config();
        config.cors.allowed_origins = vec!["https://ok.example".into(), "bad\norigin".into()];
        config.cors.allowed_methods = vec!["GET".into(), "GE T".into()];

        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidOrigin(_))));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidMethod(_))));
    }

    #[test]
    fn rejects_bad_bind_address() {
        let mut config = valid_config();
        config.listener.bind_address = "not-an-address".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::InvalidBindAddress(_))));
    }
}
