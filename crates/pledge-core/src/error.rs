// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for pledge-core.
//!
//! Provides a unified error type with stable error codes. The HTTP server maps
//! these codes onto status codes; the SDK surfaces them verbatim.

use std::fmt;

/// Result type using CoreError
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors that can occur while operating on a promise.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    /// Input validation failed. Never retried.
    ValidationError {
        /// The field that failed validation.
        field: String,
        /// The validation error message.
        message: String,
    },

    /// The promise was disposed while the caller was waiting on it.
    PromiseDisposed {
        /// The promise that was disposed.
        promise_id: String,
    },

    /// The promise was permanently disposed (tombstone policy) and can no
    /// longer be completed or awaited.
    PromiseTombstoned {
        /// The tombstoned promise.
        promise_id: String,
    },

    /// A token's resumption channel closed without delivering a completion.
    TokenAbandoned {
        /// The token whose waiter was dropped.
        token_id: String,
    },

    /// Database operation failed. Safe to retry.
    DatabaseError {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// The service failed in a way the caller cannot act on.
    Internal {
        /// Error details.
        details: String,
    },
}

impl CoreError {
    /// Shorthand for a validation error on `field`.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationError {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::ValidationError { .. } => "VALIDATION_ERROR",
            Self::PromiseDisposed { .. } => "PROMISE_DISPOSED",
            Self::PromiseTombstoned { .. } => "PROMISE_TOMBSTONED",
            Self::TokenAbandoned { .. } => "TOKEN_ABANDONED",
            Self::DatabaseError { .. } => "DATABASE_ERROR",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    /// Whether the operation that produced this error may be retried.
    ///
    /// Only storage failures are transient; every other variant describes a
    /// terminal condition that a retry cannot change.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::DatabaseError { .. })
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationError { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::PromiseDisposed { promise_id } => {
                write!(f, "Promise '{}' was disposed", promise_id)
            }
            Self::PromiseTombstoned { promise_id } => {
                write!(f, "Promise '{}' has been permanently disposed", promise_id)
            }
            Self::TokenAbandoned { token_id } => {
                write!(f, "Callback token '{}' was abandoned", token_id)
            }
            Self::DatabaseError { operation, details } => {
                write!(f, "Database error during '{}': {}", operation, details)
            }
            Self::Internal { details } => write!(f, "Internal error: {}", details),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        CoreError::DatabaseError {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::DatabaseError {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let test_cases = vec![
            (CoreError::validation("promise_id", "must not be empty"), "VALIDATION_ERROR"),
            (
                CoreError::PromiseDisposed {
                    promise_id: "p1".to_string(),
                },
                "PROMISE_DISPOSED",
            ),
            (
                CoreError::PromiseTombstoned {
                    promise_id: "p1".to_string(),
                },
                "PROMISE_TOMBSTONED",
            ),
            (
                CoreError::TokenAbandoned {
                    token_id: "tok_1".to_string(),
                },
                "TOKEN_ABANDONED",
            ),
            (
                CoreError::DatabaseError {
                    operation: "insert".to_string(),
                    details: "connection refused".to_string(),
                },
                "DATABASE_ERROR",
            ),
            (
                CoreError::Internal {
                    details: "task panicked".to_string(),
                },
                "INTERNAL_ERROR",
            ),
        ];

        for (error, expected_code) in test_cases {
            assert_eq!(
                error.error_code(),
                expected_code,
                "Error {:?} should have code {}",
                error,
                expected_code
            );
            assert!(!error.to_string().is_empty(), "Message should not be empty");
        }
    }

    #[test]
    fn test_only_database_errors_are_retryable() {
        assert!(
            CoreError::DatabaseError {
                operation: "commit".to_string(),
                details: "locked".to_string(),
            }
            .is_retryable()
        );
        assert!(!CoreError::validation("message", "must not be empty").is_retryable());
        assert!(
            !CoreError::PromiseDisposed {
                promise_id: "p".to_string()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_core_error_display() {
        let err = CoreError::validation("message", "must not be empty");
        assert_eq!(
            err.to_string(),
            "Validation error for 'message': must not be empty"
        );

        let err = CoreError::PromiseDisposed {
            promise_id: "order-42".to_string(),
        };
        assert_eq!(err.to_string(), "Promise 'order-42' was disposed");

        let err = CoreError::DatabaseError {
            operation: "insert".to_string(),
            details: "connection refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Database error during 'insert': connection refused"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let err: CoreError = serde_json::from_str::<serde_json::Value>("{not json")
            .unwrap_err()
            .into();
        assert_eq!(err.error_code(), "DATABASE_ERROR");
        assert!(err.is_retryable());
    }
}
