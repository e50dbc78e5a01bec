// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK-specific error types.

use pledge_core::CoreError;
use thiserror::Error;

/// Errors that can occur in the SDK.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Configuration error (missing or invalid environment variable)
    #[error("configuration error: {0}")]
    Config(String),

    /// The promise settled with an error outcome carrying this message
    #[error("promise rejected: {0}")]
    Rejected(String),

    /// The promise service refused or failed the operation
    #[error("server error: {code} - {message}")]
    Server {
        /// Stable error code, e.g. `PROMISE_DISPOSED`
        code: String,
        /// Error message from the server
        message: String,
    },

    /// Transport failure talking to a remote pledge-core
    #[error("transport error: {0}")]
    Transport(String),

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Unexpected response from server
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl SdkError {
    /// The server error code, if this error came from the promise service.
    pub fn code(&self) -> Option<&str> {
        match self {
            SdkError::Server { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Whether the awaited promise was disposed while waiting.
    pub fn is_disposed(&self) -> bool {
        self.code() == Some("PROMISE_DISPOSED")
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SdkError::Transport(_)) || self.code() == Some("DATABASE_ERROR")
    }
}

impl From<CoreError> for SdkError {
    fn from(err: CoreError) -> Self {
        SdkError::Server {
            code: err.error_code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for SdkError {
    fn from(err: serde_json::Error) -> Self {
        SdkError::Serialization(err.to_string())
    }
}

#[cfg(feature = "http")]
impl From<reqwest::Error> for SdkError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SdkError::Serialization(err.to_string())
        } else {
            SdkError::Transport(err.to_string())
        }
    }
}

/// Type alias for SDK results.
pub type Result<T> = std::result::Result<T, SdkError>;
