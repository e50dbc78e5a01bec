// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Background worker that deletes redeemed callback tokens.
//!
//! Awaits served by the ingress release their own token. Tokens redeemed for
//! in-process listeners, or for requests that went away before reading the
//! completion, stay in `callback_tokens` until this worker removes them.
//! Unredeemed tokens are never touched: a listener may still be parked on one.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Notify;
use tracing::{debug, error, info};

use crate::error::{CoreError, Result};
use crate::ledger::Ledger;

/// Configuration for the token pruner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPrunerConfig {
    /// Whether pruning runs at all.
    pub enabled: bool,
    /// How often to prune.
    pub poll_interval: Duration,
    /// How long a redeemed token is kept.
    pub retention: Duration,
}

impl Default for TokenPrunerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: Duration::from_secs(300), // 5 minutes
            retention: Duration::from_secs(3600),    // 1 hour
        }
    }
}

impl TokenPrunerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `PLEDGE_TOKEN_PRUNE_ENABLED`: "false" or "0" to disable (default: true)
    /// - `PLEDGE_TOKEN_PRUNE_INTERVAL_SECS`: seconds between runs (default: 300)
    /// - `PLEDGE_TOKEN_RETENTION_SECS`: seconds a redeemed token is kept (default: 3600)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let enabled = std::env::var("PLEDGE_TOKEN_PRUNE_ENABLED")
            .map(|v| !(v == "false" || v == "0"))
            .unwrap_or(defaults.enabled);

        let poll_interval = std::env::var("PLEDGE_TOKEN_PRUNE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);

        let retention = std::env::var("PLEDGE_TOKEN_RETENTION_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.retention);

        Self {
            enabled,
            poll_interval,
            retention,
        }
    }
}

/// Periodically prunes redeemed tokens from the ledger.
pub struct TokenPruner {
    ledger: Arc<dyn Ledger>,
    config: TokenPrunerConfig,
    shutdown: Arc<Notify>,
}

impl TokenPruner {
    /// Create a pruner over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>, config: TokenPrunerConfig) -> Self {
        Self {
            ledger,
            config,
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Handle used to stop [`run`](Self::run).
    pub fn shutdown_handle(&self) -> Arc<Notify> {
        self.shutdown.clone()
    }

    /// Prune until the shutdown handle is notified.
    pub async fn run(&self) {
        if !self.config.enabled {
            info!("Token pruner disabled");
            return;
        }

        info!(
            poll_interval_secs = self.config.poll_interval.as_secs(),
            retention_secs = self.config.retention.as_secs(),
            "Token pruner started"
        );

        loop {
            tokio::select! {
                biased;

                _ = self.shutdown.notified() => {
                    break;
                }

                _ = tokio::time::sleep(self.config.poll_interval) => {
                    if let Err(e) = self.prune_once().await {
                        error!(error = %e, "Failed to prune callback tokens");
                    }
                }
            }
        }

        info!("Token pruner stopped");
    }

    /// Delete tokens redeemed longer ago than the retention period.
    pub async fn prune_once(&self) -> Result<u64> {
        let retention = chrono::Duration::from_std(self.config.retention).map_err(|e| {
            CoreError::validation("retention", format!("out of range: {}", e))
        })?;
        let cutoff = Utc::now() - retention;

        let pruned = self.ledger.prune_tokens(cutoff).await?;
        if pruned > 0 {
            info!(pruned, cutoff = %cutoff, "Pruned redeemed callback tokens");
        } else {
            debug!("No redeemed callback tokens past retention");
        }
        Ok(pruned)
    }
}
