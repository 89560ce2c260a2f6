//! Bearer-token authentication.
//!
//! Tokens are self-contained: every claim the pipeline needs is
//! embedded and verified against a server-held secret, so
//! authentication is O(1) per request with no database round-trip.
//! Verification happens on every protected route; the derived identity
//! lives in request extensions for exactly one request.

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{decode, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ApiError;
use crate::http::server::AppState;
use crate::observability::metrics;

/// User categories recognized by the curriculum API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Kaprodi,
    Dosen,
    Mahasiswa,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Kaprodi, Role::Dosen, Role::Mahasiswa];
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Admin => write!(f, "admin"),
            Role::Kaprodi => write!(f, "kaprodi"),
            Role::Dosen => write!(f, "dosen"),
            Role::Mahasiswa => write!(f, "mahasiswa"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "kaprodi" => Ok(Role::Kaprodi),
            "dosen" => Ok(Role::Dosen),
            "mahasiswa" => Ok(Role::Mahasiswa),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}

/// Claims carried by an access token. All fields are required; a token
/// missing any of them is malformed.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub id_user: i64,
    pub user_type: Role,
    pub ref_id: String,
    pub exp: u64,
}

/// Identity derived from a verified token. Scoped to one request.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub role: Role,
    /// Links to the role-specific profile (lecturer NIDN, student NIM, ...).
    pub ref_id: String,
}

impl From<Claims> for AuthenticatedUser {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.id_user,
            role: claims.user_type,
            ref_id: claims.ref_id,
        }
    }
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing bearer token")]
    MissingToken,
    #[error("Token expired")]
    Expired,
    #[error("Invalid token signature")]
    InvalidSignature,
    #[error("Malformed token")]
    Malformed,
}

impl AuthError {
    fn metric_label(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing_token",
            AuthError::Expired => "expired",
            AuthError::InvalidSignature => "bad_signature",
            AuthError::Malformed => "malformed",
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Unauthorized(err.to_string())
    }
}

/// HS256 verifier over the server-held secret.
pub struct TokenVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp"]);
        validation.leeway = 0;
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => AuthError::Expired,
                ErrorKind::InvalidSignature => AuthError::InvalidSignature,
                _ => AuthError::Malformed,
            }
        })?;
        Ok(data.claims.into())
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Authentication middleware. Preflight requests pass through; every
/// other request must carry a verifiable bearer token.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if request.method() == Method::OPTIONS {
        return Ok(next.run(request).await);
    }

    let verdict = match bearer_token(request.headers()) {
        None => Err(AuthError::MissingToken),
        Some(token) => state.verifier.verify(token),
    };

    match verdict {
        Ok(user) => {
            request.extensions_mut().insert(user);
            Ok(next.run(request).await)
        }
        Err(err) => {
            tracing::warn!(reason = %err, "Authentication failed");
            metrics::record_auth_failure(err.metric_label());
            Err(err.into())
        }
    }
}

/// Handler extractor for the identity set by [`authenticate`].
pub struct CurrentUser(pub AuthenticatedUser);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| ApiError::Unauthorized("Authentication required".to_string()))
    }
}
