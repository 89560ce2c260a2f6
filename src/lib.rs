//! Request authentication and rate limiting for the OBE curriculum API.
//!
//! Every inbound request passes through a fixed middleware chain:
//!
//! ```text
//! request ──▶ cors ──▶ security headers ──▶ rate limit ──▶ auth ──▶ role guard ──▶ handler
//!               │                               │ 429        │ 401       │ 403
//!               └─ preflight answered here,     └─ short-circuit responses carry the
//!                  CORS headers only               {"success": false, ...} envelope
//! ```
//!
//! Rate-limit state lives in process memory, one entry per client
//! identifier. Instances do not share state: running several replicas
//! multiplies the effective limit, and a deployment that needs a single
//! global limit must put a shared store behind
//! [`security::rate_limit::SlidingWindowLimiter`]'s interface.

pub mod config;
pub mod error;
pub mod http;
pub mod observability;
pub mod security;

pub use config::GatewayConfig;
pub use error::ApiError;
pub use http::HttpServer;
