//! JSON response envelopes and the HTTP mapping of [`Error`].
//!
//! Every response body carries a `status` field: `{"status":"success","data":...}` on
//! success and `{"status":"error","message":...,"error":...}` on failure.

use crate::errors::Error;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Successful response body.
#[derive(Debug, Serialize)]
pub struct ApiSuccess<T> {
    /// Always `"success"`
    pub status: &'static str,
    /// Payload
    pub data: T,
}

/// Wraps `data` in the success envelope.
pub const fn success<T: Serialize>(data: T) -> Json<ApiSuccess<T>> {
    Json(ApiSuccess {
        status: "success",
        data,
    })
}

/// Failure response body.
#[derive(Debug, Serialize)]
pub struct ApiFailure {
    /// Always `"error"`
    pub status: &'static str,
    /// Caller-facing summary
    pub message: String,
    /// Underlying error text
    pub error: String,
}

impl Error {
    /// HTTP status this error is reported with.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. }
            | Self::InvalidAmount { .. }
            | Self::InvalidTransition { .. }
            | Self::Duplicate { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Database(_) | Self::Config { .. } | Self::Export { .. } | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error = self.to_string();

        let message = if status.is_server_error() {
            tracing::error!(error = %error, "request failed");
            "Internal server error".to_string()
        } else {
            tracing::warn!(status = status.as_u16(), error = %error, "request rejected");
            error.clone()
        };

        (
            status,
            Json(ApiFailure {
                status: "error",
                message,
                error,
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            Error::validation("bad").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::not_found("Order", 1).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(Error::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            Error::Conflict {
                message: "batch raced".to_string()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::Unauthorized {
                message: "no token".to_string()
            }
            .status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            Error::Database(sea_orm::DbErr::Custom("boom".to_string())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
