// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use std::net::SocketAddr;

use crate::promise::DisposePolicy;

/// Pledge Core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL or SQLite connection URL
    pub database_url: String,
    /// HTTP ingress address
    pub http_addr: SocketAddr,
    /// Database pool size
    pub max_connections: u32,
    /// What `dispose` does to a key
    pub dispose_policy: DisposePolicy,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `PLEDGE_DATABASE_URL`: PostgreSQL or SQLite connection string
    ///
    /// Optional (with defaults):
    /// - `PLEDGE_HTTP_PORT`: HTTP ingress port (default: 8080)
    /// - `PLEDGE_MAX_CONNECTIONS`: Database pool size (default: 10)
    /// - `PLEDGE_DISPOSE_POLICY`: `reset` or `tombstone` (default: reset)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = std::env::var("PLEDGE_DATABASE_URL")
            .map_err(|_| ConfigError::Missing("PLEDGE_DATABASE_URL"))?;

        let http_port: u16 = std::env::var("PLEDGE_HTTP_PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("PLEDGE_HTTP_PORT", "must be a valid port number"))?;

        let max_connections: u32 = std::env::var("PLEDGE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .ok()
            .filter(|n| *n > 0)
            .ok_or(ConfigError::Invalid(
                "PLEDGE_MAX_CONNECTIONS",
                "must be a positive integer",
            ))?;

        let dispose_policy = match std::env::var("PLEDGE_DISPOSE_POLICY") {
            Ok(raw) => raw.parse().map_err(|_| {
                ConfigError::Invalid("PLEDGE_DISPOSE_POLICY", "must be 'reset' or 'tombstone'")
            })?,
            Err(_) => DisposePolicy::default(),
        };

        Ok(Self {
            database_url,
            http_addr: SocketAddr::from(([0, 0, 0, 0], http_port)),
            max_connections,
            dispose_policy,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Serializes tests that touch the process environment
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: [&str; 4] = [
        "PLEDGE_DATABASE_URL",
        "PLEDGE_HTTP_PORT",
        "PLEDGE_MAX_CONNECTIONS",
        "PLEDGE_DISPOSE_POLICY",
    ];

    /// Sets env vars for one test and restores the previous values on drop.
    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        /// Start from a clean slate for every `PLEDGE_*` variable.
        fn clean() -> Self {
            let saved = VARS.iter().map(|k| (*k, env::var(k).ok())).collect();
            for key in VARS {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe { env::remove_var(key) };
            }
            Self { saved }
        }

        fn set(&self, key: &str, value: &str) {
            // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
            unsafe { env::set_var(key, value) };
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (key, value) in self.saved.drain(..) {
                // SAFETY: Tests are serialized via ENV_MUTEX, so no concurrent access
                unsafe {
                    match value {
                        Some(v) => env::set_var(key, v),
                        None => env::remove_var(key),
                    }
                }
            }
        }
    }

    #[test]
    fn test_config_from_env_with_defaults() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let guard = EnvGuard::clean();
        guard.set("PLEDGE_DATABASE_URL", "sqlite:pledge.db");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "sqlite:pledge.db");
        assert_eq!(config.http_addr.port(), 8080);
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.dispose_policy, DisposePolicy::Reset);
    }

    #[test]
    fn test_config_from_env_all_custom() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let guard = EnvGuard::clean();
        guard.set("PLEDGE_DATABASE_URL", "postgres://user:pass@db:5432/prod");
        guard.set("PLEDGE_HTTP_PORT", "9090");
        guard.set("PLEDGE_MAX_CONNECTIONS", "32");
        guard.set("PLEDGE_DISPOSE_POLICY", "tombstone");

        let config = Config::from_env().unwrap();

        assert_eq!(config.database_url, "postgres://user:pass@db:5432/prod");
        assert_eq!(config.http_addr.port(), 9090);
        assert_eq!(config.max_connections, 32);
        assert_eq!(config.dispose_policy, DisposePolicy::Tombstone);
    }

    #[test]
    fn test_config_missing_database_url() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let _guard = EnvGuard::clean();

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("PLEDGE_DATABASE_URL")));
        assert!(err.to_string().contains("PLEDGE_DATABASE_URL"));
    }

    #[test]
    fn test_config_invalid_port() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let guard = EnvGuard::clean();
        guard.set("PLEDGE_DATABASE_URL", "sqlite::memory:");
        guard.set("PLEDGE_HTTP_PORT", "not_a_number");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("PLEDGE_HTTP_PORT", _)));
    }

    #[test]
    fn test_config_zero_connections_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let guard = EnvGuard::clean();
        guard.set("PLEDGE_DATABASE_URL", "sqlite::memory:");
        guard.set("PLEDGE_MAX_CONNECTIONS", "0");

        let err = Config::from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid("PLEDGE_MAX_CONNECTIONS", _)));
    }

    #[test]
    fn test_config_unknown_dispose_policy() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let guard = EnvGuard::clean();
        guard.set("PLEDGE_DATABASE_URL", "sqlite::memory:");
        guard.set("PLEDGE_DISPOSE_POLICY", "forever");

        let err = Config::from_env().unwrap_err();
        assert!(err.to_string().contains("PLEDGE_DISPOSE_POLICY"));
    }
}
