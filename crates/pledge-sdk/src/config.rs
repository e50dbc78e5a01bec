// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK configuration for connecting to a pledge-core server.

use std::env;
use std::time::Duration;

use crate::error::{Result, SdkError};

const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// SDK configuration for the HTTP backend.
#[derive(Debug, Clone)]
pub struct SdkConfig {
    /// Base URL of the pledge-core HTTP ingress, e.g. `http://127.0.0.1:8080`
    pub ingress_url: String,
    /// Timeout for non-blocking calls in milliseconds (default: 30_000).
    /// Never applied to `get`, which waits as long as the promise is pending.
    pub request_timeout_ms: u64,
}

impl SdkConfig {
    /// Load configuration from environment variables.
    ///
    /// # Required Environment Variables
    /// - `PLEDGE_INGRESS_URL` - Base URL of the pledge-core server
    ///
    /// # Optional Environment Variables
    /// - `PLEDGE_REQUEST_TIMEOUT_MS` - Request timeout (default: 30000)
    pub fn from_env() -> Result<Self> {
        let ingress_url = env::var("PLEDGE_INGRESS_URL")
            .map_err(|_| SdkError::Config("PLEDGE_INGRESS_URL is required".to_string()))?;

        let request_timeout_ms = match env::var("PLEDGE_REQUEST_TIMEOUT_MS") {
            Ok(raw) => raw.parse().map_err(|e| {
                SdkError::Config(format!("invalid PLEDGE_REQUEST_TIMEOUT_MS: {}", e))
            })?,
            Err(_) => DEFAULT_REQUEST_TIMEOUT_MS,
        };

        Ok(Self::new(ingress_url).with_request_timeout_ms(request_timeout_ms))
    }

    /// Configuration for a server on `127.0.0.1:8080`.
    pub fn localhost() -> Self {
        Self::new("http://127.0.0.1:8080")
    }

    /// Create a configuration for the given base URL.
    pub fn new(ingress_url: impl Into<String>) -> Self {
        let ingress_url: String = ingress_url.into();
        Self {
            ingress_url: ingress_url.trim_end_matches('/').to_string(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }

    /// Set the request timeout.
    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    /// Request timeout as a duration.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Serializes tests that touch the process environment
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear() {
        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe {
            env::remove_var("PLEDGE_INGRESS_URL");
            env::remove_var("PLEDGE_REQUEST_TIMEOUT_MS");
        }
    }

    #[test]
    fn test_localhost() {
        let config = SdkConfig::localhost();
        assert_eq!(config.ingress_url, "http://127.0.0.1:8080");
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = SdkConfig::new("http://pledge:9000/");
        assert_eq!(config.ingress_url, "http://pledge:9000");
    }

    #[test]
    fn test_from_env() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();
        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe {
            env::set_var("PLEDGE_INGRESS_URL", "http://pledge:9000");
            env::set_var("PLEDGE_REQUEST_TIMEOUT_MS", "500");
        }

        let config = SdkConfig::from_env().unwrap();
        assert_eq!(config.ingress_url, "http://pledge:9000");
        assert_eq!(config.request_timeout_ms, 500);
        clear();
    }

    #[test]
    fn test_from_env_missing_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();

        let err = SdkConfig::from_env().unwrap_err();
        assert!(err.to_string().contains("PLEDGE_INGRESS_URL"));
    }

    #[test]
    fn test_from_env_invalid_timeout() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();
        // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
        unsafe {
            env::set_var("PLEDGE_INGRESS_URL", "http://pledge:9000");
            env::set_var("PLEDGE_REQUEST_TIMEOUT_MS", "soon");
        }

        let err = SdkConfig::from_env().unwrap_err();
        assert!(matches!(err, SdkError::Config(_)));
        clear();
    }
}
