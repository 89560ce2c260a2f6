//! Request-terminating errors.
//!
//! Each middleware step either passes control on or converts one of
//! these into a complete JSON response. Nothing in the pipeline maps to
//! a 500: bookkeeping anomalies fall back to permissive defaults at the
//! call site instead of propagating here.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::http::response::ErrorBody;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Rate limit exceeded")]
    RateLimited { retry_after: u64 },
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::RateLimited { retry_after } => {
                let mut response = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(ErrorBody::rate_limited(retry_after)),
                )
                    .into_response();
                if let Ok(value) = header::HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                response
            }
            ApiError::Unauthorized(reason) => {
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::new(reason))).into_response()
            }
            ApiError::Forbidden(reason) => {
                (StatusCode::FORBIDDEN, Json(ErrorBody::new(reason))).into_response()
            }
            ApiError::BadRequest(reason) => {
                (StatusCode::BAD_REQUEST, Json(ErrorBody::new(reason))).into_response()
            }
            ApiError::Internal(reason) => {
                tracing::error!(reason = %reason, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Internal server error")),
                )
                    .into_response()
            }
        }
    }
}
