//! Configuration loading.
//!
//! Order of precedence: environment variables override the TOML file,
//! which overrides built-in defaults. Validation runs last, on the
//! merged result.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{AppEnv, GatewayConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid value for {var}: {value:?}")]
    Env { var: &'static str, value: String },
    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, environment overrides,
/// then semantic validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => toml::from_str(&fs::read_to_string(path)?)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config)?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Recognized environment variables.
///
/// Unset and empty variables leave the current value in place.
fn apply_env_overrides(config: &mut GatewayConfig) -> Result<(), ConfigError> {
    if let Some(value) = env_var("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_number("RATE_LIMIT_MAX", &value)?;
    }
    if let Some(value) = env_var("RATE_LIMIT_WINDOW") {
        config.rate_limit.window_secs = parse_number("RATE_LIMIT_WINDOW", &value)?;
    }
    if let Some(value) = env_var("RATE_LIMIT_ENABLED") {
        config.rate_limit.enabled = parse_bool(&value);
    }
    if let Some(value) = env_var("CORS_ALLOWED_ORIGINS") {
        config.cors.allowed_origins = parse_list(&value);
    }
    if let Some(value) = env_var("CORS_ALLOWED_METHODS") {
        config.cors.allowed_methods = parse_list(&value);
    }
    if let Some(value) = env_var("CORS_ALLOWED_HEADERS") {
        config.cors.allowed_headers = parse_list(&value);
    }
    if let Some(value) = env_var("APP_ENV") {
        config.security.environment = AppEnv::parse(&value);
    }
    if let Some(value) = env_var("JWT_SECRET") {
        config.auth.jwt_secret = value;
    }
    if let Some(value) = env_var("BIND_ADDRESS") {
        config.listener.bind_address = value;
    }
    Ok(())
}

fn env_var(name: &'static str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        var,
        value: value.to_string(),
    })
}

/// Permissive boolean parsing, matching the deployment stack's habits:
/// `1`, `true`, `yes`, `on` (any case) are true, everything else false.
fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bool_parsing_is_permissive() {
        for value in ["1", "true", "TRUE", "yes", "On"] {
            assert!(parse_bool(value), "{value:?} should be true");
        }
        for value in ["0", "false", "off", "nope", ""] {
            assert!(!parse_bool(value), "{value:?} should be false");
        }
    }

    #[test]
    fn list_parsing_trims_and_drops_empties() {
        assert_eq!(
            parse_list(" https://a.example , https://b.example ,, "),
            vec!["https://a.example", "https://b.example"]
        );
    }

    // Environment access is process-global, so everything env-related
    // lives in one test.
    #[test]
    fn env_overrides_apply_on_top_of_defaults() {
        let vars = [
            ("RATE_LIMIT_MAX", "3"),
            ("RATE_LIMIT_WINDOW", "120"),
            ("RATE_LIMIT_ENABLED", "false"),
            ("CORS_ALLOWED_ORIGINS", "https://siakad.example.ac.id"),
            ("APP_ENV", "production"),
            ("JWT_SECRET", "env-secret"),
        ];
        for (name, value) in vars {
            std::env::set_var(name, value);
        }

        let result = load_config(None);

        for (name, _) in vars {
            std::env::remove_var(name);
        }

        let config = result.unwrap();
        assert_eq!(config.rate_limit.max_requests, 3);
        assert_eq!(config.rate_limit.window_secs, 120);
        assert!(!config.rate_limit.enabled);
        assert_eq!(
            config.cors.allowed_origins,
            vec!["https://siakad.example.ac.id"]
        );
        assert_eq!(config.security.environment, AppEnv::Production);
        assert_eq!(config.auth.jwt_secret, "env-secret");
    }

    #[test]
    fn garbage_numeric_override_is_an_error() {
        let error = parse_number::<u32>("RATE_LIMIT_MAX", "ten").unwrap_err();
        assert!(matches!(error, ConfigError::Env { var: "RATE_LIMIT_MAX", .. }));
    }
}
