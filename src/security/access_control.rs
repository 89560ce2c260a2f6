//! Role-based authorization.
//!
//! Runs after authentication; routes declare the roles they accept and
//! everything else gets a 403. A missing identity means the guard was
//! layered without [`crate::security::auth::authenticate`] in front of
//! it, which degrades to 401 instead of a panic or a 500.

use axum::{extract::Request, middleware::Next, response::Response};

use crate::error::ApiError;
use crate::security::auth::{AuthenticatedUser, Role};

/// Check a role against an allowed set.
pub fn check(role: Role, allowed: &[Role]) -> Result<(), ApiError> {
    if allowed.contains(&role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Requires one of: {}",
            allowed
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ")
        )))
    }
}

/// Middleware guard for routes that declare required roles.
pub async fn require(
    allowed: &'static [Role],
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(user) = request.extensions().get::<AuthenticatedUser>() else {
        return Err(ApiError::Unauthorized("Authentication required".to_string()));
    };
    check(user.role, allowed)?;
    Ok(next.run(request).await)
}
