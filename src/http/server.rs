//! HTTP server setup and pipeline assembly.
//!
//! # Responsibilities
//! - Build the Axum router with the middleware chain in its fixed order
//! - Wire up tracing, timeouts, body limits, request IDs
//! - Run the server with graceful shutdown
//! - Host the built-in routes: `/health`, `/api/me`, `/api/admin/limiter`
//!
//! Application resource routers mount under `/api` via
//! [`HttpServer::with_routes`] and inherit the whole pipeline.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{DefaultBodyLimit, Request, State},
    http::HeaderValue,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::GatewayConfig;
use crate::http::response;
use crate::observability::metrics;
use crate::security::{
    access_control,
    auth::{self, CurrentUser, Role, TokenVerifier},
    cors, headers,
    rate_limit::{self, SlidingWindowLimiter},
};

/// How often idle rate-limit entries are evicted.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Application state injected into middleware and handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub limiter: Arc<SlidingWindowLimiter>,
    pub verifier: Arc<TokenVerifier>,
}

impl AppState {
    pub fn new(config: GatewayConfig) -> Self {
        let limiter = Arc::new(SlidingWindowLimiter::new(&config.rate_limit));
        let verifier = Arc::new(TokenVerifier::new(&config.auth.jwt_secret));
        Self {
            config: Arc::new(config),
            limiter,
            verifier,
        }
    }
}

/// The gateway HTTP server.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server with only the built-in routes.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_routes(config, Router::new())
    }

    /// Create a server with application routes mounted under `/api`,
    /// behind the full pipeline.
    pub fn with_routes(config: GatewayConfig, api_routes: Router<AppState>) -> Self {
        let state = AppState::new(config);
        let router = build_router(state.clone(), api_routes);
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let limiter = self.state.limiter.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(SWEEP_INTERVAL);
            tick.tick().await; // first tick fires immediately
            loop {
                tick.tick().await;
                let removed = limiter.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "Swept idle rate-limit entries");
                }
            }
        });

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Assemble the router. Layer order is load-bearing: requests flow
/// request-id → trace → metrics → timeout → body limit → CORS →
/// security headers → rate limit → auth → role guard → handler, and
/// preflight requests never get past the CORS layer.
pub fn build_router(state: AppState, api_routes: Router<AppState>) -> Router {
    let admin: Router<AppState> = Router::new()
        .route("/limiter", get(limiter_stats))
        .layer(middleware::from_fn(
            |request: Request, next: middleware::Next| {
                access_control::require(ADMIN_ONLY, request, next)
            },
        ));

    let api = api_routes
        .route("/me", get(me))
        .nest("/admin", admin)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::authenticate,
        ));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .layer(middleware::from_fn_with_state(state.clone(), headers::apply))
        .layer(cors::layer(&state.config.cors))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(state.config.security.max_body_size))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.timeouts.request_secs,
        )))
        .layer(middleware::from_fn(track_requests))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}

/// Request id generation for log correlation.
#[derive(Clone, Copy, Default)]
struct MakeRequestUuid;

impl MakeRequestId for MakeRequestUuid {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = uuid::Uuid::new_v4().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

async fn track_requests(request: Request, next: middleware::Next) -> Response {
    let method = request.method().to_string();
    let start = Instant::now();
    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), start);
    response
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Echo the authenticated identity.
async fn me(CurrentUser(user): CurrentUser) -> impl IntoResponse {
    response::ok(json!({
        "user_id": user.user_id,
        "role": user.role,
        "ref_id": user.ref_id,
    }))
}

/// Operational view of the limiter's in-memory table.
async fn limiter_stats(State(state): State<AppState>) -> impl IntoResponse {
    response::ok(json!({
        "enabled": state.limiter.is_enabled(),
        "max_requests": state.limiter.limit(),
        "window_secs": state.limiter.window_secs(),
        "tracked_identifiers": state.limiter.tracked(),
    }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %error, "Failed to install Ctrl+C handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
