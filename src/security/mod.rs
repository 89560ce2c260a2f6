//! Security subsystem: the request-facing middleware pipeline.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (allow-list CORS; preflight answered here)
//!     → headers.rs (security response headers)
//!     → identity.rs + rate_limit.rs (per-client sliding window)
//!     → auth.rs (bearer-token verification)
//!     → access_control.rs (role guard on routes that declare roles)
//! ```
//!
//! # Design Decisions
//! - Strict short-circuit chain: each step passes control on or
//!   terminates the request with a complete JSON error response
//! - Fail closed on auth and authorization; fail open only when the
//!   limiter is explicitly disabled
//! - Forwarded headers are consulted for identification only, in a
//!   fixed priority order

pub mod access_control;
pub mod auth;
pub mod cors;
pub mod headers;
pub mod identity;
pub mod rate_limit;
