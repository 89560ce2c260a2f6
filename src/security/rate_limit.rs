//! Sliding-window rate limiting.
//!
//! # Responsibilities
//! - Track request timestamps per client identifier
//! - Put identifiers that exceed the limit into a cooldown
//! - Surface remaining/reset data for `X-RateLimit-*` response headers
//!
//! # Design Decisions
//! - Sliding window over a timestamp log, not a token bucket: exceeding
//!   the limit blocks until `window` seconds after the oldest request
//!   of the violating batch, and rejected requests during the cooldown
//!   are not recorded, so hammering does not extend the block
//! - Per-identifier mutual exclusion comes from the map's entry
//!   locking; no lock is shared across identifiers
//! - Bookkeeping anomalies degrade to "no prior requests" rather than
//!   surfacing as errors: routing availability never depends on the
//!   limiter's internal state
//! - State is process-local; replicas each count independently

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, Method},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;

use crate::config::RateLimitConfig;
use crate::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::security::{auth, identity};

/// Per-identifier state: request timestamps inside the trailing window
/// plus an optional cooldown deadline.
#[derive(Debug, Default)]
struct ClientRecord {
    hits: VecDeque<u64>,
    blocked_until: Option<u64>,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed { remaining: u32, reset_at: u64 },
    Blocked { retry_after: u64 },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }
}

/// Per-identifier sliding-window limiter.
///
/// Owns the shared map; constructed once at startup and injected via
/// [`AppState`].
pub struct SlidingWindowLimiter {
    entries: DashMap<String, ClientRecord>,
    max_requests: u32,
    window_secs: u64,
    enabled: bool,
}

impl SlidingWindowLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            entries: DashMap::new(),
            max_requests: config.max_requests,
            window_secs: config.window_secs,
            enabled: config.enabled,
        }
    }

    pub fn limit(&self) -> u32 {
        self.max_requests
    }

    pub fn window_secs(&self) -> u64 {
        self.window_secs
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Number of identifiers currently tracked.
    pub fn tracked(&self) -> usize {
        self.entries.len()
    }

    /// The core decision point, called once per inbound request.
    pub fn check_and_record(&self, key: &str) -> Decision {
        self.check_and_record_at(key, unix_now())
    }

    pub fn check_and_record_at(&self, key: &str, now: u64) -> Decision {
        if !self.enabled {
            return Decision::Allowed {
                remaining: self.max_requests,
                reset_at: now,
            };
        }

        let mut record = self.entries.entry(key.to_string()).or_default();

        // An active cooldown rejects without recording anything.
        if let Some(until) = record.blocked_until {
            if until > now {
                return Decision::Blocked {
                    retry_after: self.window_secs,
                };
            }
            record.blocked_until = None;
        }

        Self::prune(&mut record.hits, now, self.window_secs);

        if record.hits.len() as u32 >= self.max_requests {
            let oldest = record.hits.front().copied().unwrap_or(now);
            record.blocked_until = Some(oldest + self.window_secs);
            return Decision::Blocked {
                retry_after: self.window_secs,
            };
        }

        record.hits.push_back(now);
        let oldest = record.hits.front().copied().unwrap_or(now);
        Decision::Allowed {
            remaining: self.max_requests - record.hits.len() as u32,
            reset_at: oldest + self.window_secs,
        }
    }

    /// Requests left in the current window. Read-only.
    pub fn remaining(&self, key: &str) -> u32 {
        self.remaining_at(key, unix_now())
    }

    pub fn remaining_at(&self, key: &str, now: u64) -> u32 {
        if !self.enabled {
            return self.max_requests;
        }
        let Some(record) = self.entries.get(key) else {
            return self.max_requests;
        };
        if record.blocked_until.is_some_and(|until| until > now) {
            return 0;
        }
        let live = Self::live_hits(&record.hits, now, self.window_secs) as u32;
        self.max_requests.saturating_sub(live)
    }

    /// When the window's oldest recorded request expires. Read-only.
    pub fn reset_time(&self, key: &str) -> u64 {
        self.reset_time_at(key, unix_now())
    }

    pub fn reset_time_at(&self, key: &str, now: u64) -> u64 {
        let Some(record) = self.entries.get(key) else {
            return now;
        };
        record
            .hits
            .iter()
            .copied()
            .find(|&t| Self::in_window(t, now, self.window_secs))
            .map(|oldest| oldest + self.window_secs)
            .unwrap_or(now)
    }

    /// Drop identifiers with no live hits and no active cooldown.
    /// Run periodically; the map would otherwise grow with every client
    /// that ever connected.
    pub fn sweep(&self) -> usize {
        self.sweep_at(unix_now())
    }

    pub fn sweep_at(&self, now: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, record| {
            record.blocked_until.is_some_and(|until| until > now)
                || record
                    .hits
                    .iter()
                    .any(|&t| Self::in_window(t, now, self.window_secs))
        });
        before.saturating_sub(self.entries.len())
    }

    // The window is the half-open interval (now - window, now].
    // checked_sub keeps timestamps near zero inside the window, which
    // wall-clock time never hits but absolute test timelines do.
    fn in_window(t: u64, now: u64, window: u64) -> bool {
        match now.checked_sub(window) {
            Some(cutoff) => t > cutoff,
            None => true,
        }
    }

    fn prune(hits: &mut VecDeque<u64>, now: u64, window: u64) {
        if let Some(cutoff) = now.checked_sub(window) {
            while hits.front().is_some_and(|&t| t <= cutoff) {
                hits.pop_front();
            }
        }
    }

    fn live_hits(hits: &VecDeque<u64>, now: u64, window: u64) -> usize {
        hits.iter()
            .filter(|&&t| Self::in_window(t, now, window))
            .count()
    }
}

/// Seconds since the unix epoch; zero if the clock is before it.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// Rate-limit middleware.
///
/// Runs before authentication, so the key falls back to the network
/// address unless a bearer token is present and verifies; preflight
/// requests bypass the limiter entirely.
pub async fn enforce(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return next.run(request).await;
    }

    let identity = request
        .extensions()
        .get::<auth::AuthenticatedUser>()
        .cloned()
        .or_else(|| {
            auth::bearer_token(request.headers())
                .and_then(|token| state.verifier.verify(token).ok())
        });
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let key = identity::resolve(request.headers(), peer, identity.as_ref());

    match state.limiter.check_and_record(&key) {
        Decision::Blocked { retry_after } => {
            tracing::warn!(client = %key, retry_after, "Rate limit exceeded");
            metrics::record_rate_limited(if identity.is_some() { "user" } else { "ip" });
            ApiError::RateLimited { retry_after }.into_response()
        }
        Decision::Allowed {
            remaining,
            reset_at,
        } => {
            let mut response = next.run(request).await;
            let headers = response.headers_mut();
            insert_header(headers, "x-ratelimit-limit", state.limiter.limit().to_string());
            insert_header(headers, "x-ratelimit-remaining", remaining.to_string());
            insert_header(headers, "x-ratelimit-reset", reset_at.to_string());
            insert_header(
                headers,
                "x-ratelimit-window",
                state.limiter.window_secs().to_string(),
            );
            response
        }
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: String) {
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(HeaderName::from_static(name), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limiter(max_requests: u32, window_secs: u64) -> SlidingWindowLimiter {
        SlidingWindowLimiter::new(&RateLimitConfig {
            enabled: true,
            max_requests,
            window_secs,
        })
    }

    #[test]
    fn allows_up_to_limit_within_window() {
        let limiter = limiter(5, 60);
        for i in 0..5 {
            let decision = limiter.check_and_record_at("ip_10.0.0.1", 1_000 + i);
            assert!(decision.is_allowed(), "call {i} should pass");
        }
        assert_eq!(limiter.remaining_at("ip_10.0.0.1", 1_005), 0);
    }

    #[test]
    fn remaining_decrements_per_accepted_call() {
        let limiter = limiter(10, 60);
        for n in 1..=4 {
            limiter.check_and_record_at("ip_10.0.0.1", 1_000);
            assert_eq!(limiter.remaining_at("ip_10.0.0.1", 1_000), 10 - n);
        }
    }

    #[test]
    fn blocks_until_oldest_request_expires() {
        // max=3, window=60s: requests at t=0,1,2 pass, the 4th at t=3
        // trips a cooldown anchored at the first request of the batch.
        let limiter = limiter(3, 60);
        let key = "ip_10.0.0.1";

        assert!(limiter.check_and_record_at(key, 0).is_allowed());
        assert!(limiter.check_and_record_at(key, 1).is_allowed());
        assert!(limiter.check_and_record_at(key, 2).is_allowed());
        assert_eq!(limiter.remaining_at(key, 2), 0);
        assert_eq!(limiter.reset_time_at(key, 2), 60);

        assert_eq!(
            limiter.check_and_record_at(key, 3),
            Decision::Blocked { retry_after: 60 }
        );

        // Still inside the cooldown: blocked_until = 0 + 60.
        assert!(!limiter.check_and_record_at(key, 59).is_allowed());
        assert_eq!(limiter.remaining_at(key, 59), 0);

        // Cooldown passed, old hits pruned.
        assert!(limiter.check_and_record_at(key, 61).is_allowed());
    }

    #[test]
    fn rejected_attempts_do_not_extend_the_block() {
        let limiter = limiter(1, 60);
        let key = "ip_10.0.0.2";

        assert!(limiter.check_and_record_at(key, 0).is_allowed());
        for t in 1..50 {
            assert!(!limiter.check_and_record_at(key, t).is_allowed());
        }
        // blocked_until stayed anchored at 0 + 60.
        assert!(limiter.check_and_record_at(key, 61).is_allowed());
    }

    #[test]
    fn window_slides_rather_than_resets() {
        let limiter = limiter(2, 60);
        let key = "ip_10.0.0.3";

        assert!(limiter.check_and_record_at(key, 0).is_allowed());
        assert!(limiter.check_and_record_at(key, 30).is_allowed());
        // t=0 has left the window at t=61; one slot free again.
        assert!(limiter.check_and_record_at(key, 61).is_allowed());
        // t=30 and t=61 both live: full.
        assert!(!limiter.check_and_record_at(key, 62).is_allowed());
    }

    #[test]
    fn identifiers_are_independent() {
        let limiter = limiter(1, 60);
        assert!(limiter.check_and_record_at("ip_10.0.0.1", 0).is_allowed());
        assert!(limiter.check_and_record_at("user_7", 0).is_allowed());
        assert!(!limiter.check_and_record_at("ip_10.0.0.1", 1).is_allowed());
        assert!(!limiter.check_and_record_at("user_7", 1).is_allowed());
    }

    #[test]
    fn disabled_limiter_accepts_without_recording() {
        let limiter = SlidingWindowLimiter::new(&RateLimitConfig {
            enabled: false,
            max_requests: 1,
            window_secs: 60,
        });
        for t in 0..10 {
            assert!(limiter.check_and_record_at("ip_10.0.0.1", t).is_allowed());
        }
        assert_eq!(limiter.tracked(), 0);
        assert_eq!(limiter.remaining_at("ip_10.0.0.1", 10), 1);
    }

    #[test]
    fn unknown_identifier_has_full_budget() {
        let limiter = limiter(100, 60);
        assert_eq!(limiter.remaining_at("ip_198.51.100.1", 1_000), 100);
        assert_eq!(limiter.reset_time_at("ip_198.51.100.1", 1_000), 1_000);
    }

    #[test]
    fn sweep_drops_idle_entries_and_keeps_active_ones() {
        let limiter = limiter(3, 60);
        limiter.check_and_record_at("ip_idle", 0);
        limiter.check_and_record_at("ip_busy", 40);
        for t in [10, 11, 12, 13] {
            // The 4th call trips a cooldown anchored at 10 + 60 = 70.
            limiter.check_and_record_at("ip_blocked", t);
        }

        assert_eq!(limiter.tracked(), 3);
        // At t=65: idle's hit has expired, busy's is live, blocked's
        // cooldown is still active.
        let removed = limiter.sweep_at(65);
        assert_eq!(removed, 1);
        assert_eq!(limiter.tracked(), 2);

        // At t=200 everything is stale.
        let removed = limiter.sweep_at(200);
        assert_eq!(removed, 2);
        assert_eq!(limiter.tracked(), 0);
    }
}
