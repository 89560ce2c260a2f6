//! Shared helpers for pipeline integration tests.

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::Request;
use axum::Router;
use jsonwebtoken::{encode, EncodingKey, Header};

use obe_gateway::config::GatewayConfig;
use obe_gateway::http::server::{build_router, AppState};
use obe_gateway::security::auth::{Claims, Role};
use obe_gateway::security::rate_limit::unix_now;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ALLOWED_ORIGIN: &str = "https://siakad.example.ac.id";

pub fn test_config() -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.auth.jwt_secret = TEST_SECRET.to_string();
    config.cors.allowed_origins = vec![ALLOWED_ORIGIN.to_string()];
    config
}

pub fn router_with(config: GatewayConfig) -> Router {
    build_router(AppState::new(config), Router::new())
}

pub fn token_for(role: Role, user_id: i64) -> String {
    mint_token(role, user_id, unix_now() + 3_600, TEST_SECRET)
}

pub fn mint_token(role: Role, user_id: i64, exp: u64, secret: &str) -> String {
    let claims = Claims {
        id_user: user_id,
        user_type: role,
        ref_id: format!("ref-{user_id}"),
        exp,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("encode token")
}

/// GET request with the peer address the listener would have attached.
pub fn get(uri: &str, peer: &str) -> Request<Body> {
    let mut request = Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    attach_peer(&mut request, peer);
    request
}

pub fn get_with_token(uri: &str, peer: &str, token: &str) -> Request<Body> {
    let mut request = Request::builder()
        .uri(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .expect("build request");
    attach_peer(&mut request, peer);
    request
}

pub fn attach_peer(request: &mut Request<Body>, peer: &str) {
    let addr: SocketAddr = peer.parse().expect("peer address");
    request.extensions_mut().insert(ConnectInfo(addr));
}
