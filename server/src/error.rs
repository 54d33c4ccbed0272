//! Request-level error types and their HTTP mappings.
//!
//! Every caller-visible failure is a JSON object with a single `error`
//! string. Upstream provider failures never leak internal detail; the
//! detail goes to the log instead.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::stripe::StripeError;

/// Errors surfaced on the HTTP response path.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Webhook signature verification failed. Non-success status so the
    /// provider retries delivery.
    #[error("signature verification failed: {0}")]
    Signature(String),

    /// Malformed or out-of-range request field.
    #[error("{0}")]
    Validation(String),

    /// A required query parameter was absent.
    #[error("missing required parameter: {0}")]
    MissingParam(&'static str),

    /// The payment provider's API call failed. The caller sees a generic
    /// message; the underlying cause is logged.
    #[error("payment provider request failed")]
    Upstream(#[from] StripeError),
}

/// JSON error body: `{"error": "..."}`.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Signature(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::MissingParam(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Upstream(cause) => {
                error!(error = %cause, "upstream_request_failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "payment provider request failed".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_error_is_bad_request() {
        let response = ApiError::Signature("signature mismatch".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_validation_error_is_bad_request() {
        let response =
            ApiError::Validation("amount must be a positive integer".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_upstream_error_is_internal_and_generic() {
        let cause = StripeError::Api {
            status: 402,
            message: "Your card was declined.".to_string(),
        };
        let response = ApiError::Upstream(cause).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
