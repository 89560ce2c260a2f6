//! Configuration: schema, loading, validation.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppEnv, AuthConfig, CorsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig,
    RateLimitConfig, SecurityConfig, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
