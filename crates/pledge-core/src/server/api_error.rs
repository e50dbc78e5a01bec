// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! RFC 7807 Problem Details for HTTP error responses.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::error::CoreError;

/// Error returned by HTTP handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// A domain error from the promise actors.
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ApiError {
    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::ValidationError { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Core(CoreError::PromiseDisposed { .. }) => StatusCode::CONFLICT,
            ApiError::Core(CoreError::PromiseTombstoned { .. }) => StatusCode::GONE,
            ApiError::Core(CoreError::DatabaseError { .. }) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Core(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code, used as the problem `type`.
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Core(CoreError::TokenAbandoned { .. }) => "INTERNAL_ERROR",
            ApiError::Core(e) => e.error_code(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Core(CoreError::validation("body", rejection.body_text()))
    }
}

/// RFC 7807 Problem Details body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code, e.g. `VALIDATION_ERROR`.
    #[serde(rename = "type")]
    pub problem_type: String,
    /// Canonical reason phrase of the status.
    pub title: String,
    /// HTTP status code.
    pub status: u16,
    /// Human-readable description.
    pub detail: String,
}

impl ErrorResponse {
    /// Build the body for `err`.
    pub fn from_error(err: &ApiError) -> Self {
        let status = err.status_code();
        let title = status
            .canonical_reason()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "Error".to_string());

        Self {
            problem_type: err.error_code().to_string(),
            title,
            status: status.as_u16(),
            detail: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(code = self.error_code(), error = %self, "Request failed");
        } else {
            warn!(code = self.error_code(), error = %self, "Request rejected");
        }
        let body = ErrorResponse::from_error(&self);
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: CoreError) -> (StatusCode, &'static str) {
        let api = ApiError::from(err);
        (api.status_code(), api.error_code())
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(CoreError::validation("value", "missing")),
            (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
        );
        assert_eq!(
            status_of(CoreError::PromiseDisposed {
                promise_id: "p".into()
            }),
            (StatusCode::CONFLICT, "PROMISE_DISPOSED")
        );
        assert_eq!(
            status_of(CoreError::PromiseTombstoned {
                promise_id: "p".into()
            }),
            (StatusCode::GONE, "PROMISE_TOMBSTONED")
        );
        assert_eq!(
            status_of(CoreError::DatabaseError {
                operation: "load".into(),
                details: "down".into()
            }),
            (StatusCode::SERVICE_UNAVAILABLE, "DATABASE_ERROR")
        );
        assert_eq!(
            status_of(CoreError::TokenAbandoned {
                token_id: "tok".into()
            }),
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        );
        assert_eq!(
            status_of(CoreError::Internal {
                details: "task failed".into()
            }),
            (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
        );
    }

    #[test]
    fn test_problem_body() {
        let err = ApiError::from(CoreError::PromiseDisposed {
            promise_id: "order-9".into(),
        });
        let body = ErrorResponse::from_error(&err);
        assert_eq!(body.problem_type, "PROMISE_DISPOSED");
        assert_eq!(body.title, "Conflict");
        assert_eq!(body.status, 409);
        assert!(body.detail.contains("order-9"));

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["type"], "PROMISE_DISPOSED");
    }
}
