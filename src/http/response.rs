//! JSON response envelopes.
//!
//! Every terminal middleware response and every built-in handler uses
//! the same `success` envelope, so API clients can branch on one field.

use axum::Json;
use serde::Serialize;

/// Body for short-circuit error responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: None,
            retry_after: None,
        }
    }

    /// The 429 body: machine-readable `retry_after` plus a human hint.
    pub fn rate_limited(retry_after: u64) -> Self {
        Self {
            success: false,
            error: "Rate limit exceeded".to_string(),
            message: Some(format!(
                "Too many requests. Try again in {retry_after} seconds."
            )),
            retry_after: Some(retry_after),
        }
    }
}

/// Body for successful responses.
#[derive(Debug, Serialize)]
pub struct DataBody<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<DataBody<T>> {
    Json(DataBody {
        success: true,
        data,
    })
}
