// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embeddable runtime for pledge-core.
//!
//! [`PromiseRuntime`] wires a ledger, the token broker, the promise actors,
//! the token pruner and the HTTP ingress together so they can run inside an
//! existing tokio application instead of the standalone binary.
//!
//! # Example
//!
//! ```rust,ignore
//! use pledge_core::ledger;
//! use pledge_core::runtime::PromiseRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ledger = ledger::open("sqlite:pledge.db", 10).await?;
//!
//!     let runtime = PromiseRuntime::builder()
//!         .ledger(ledger)
//!         .bind_addr("0.0.0.0:8080".parse()?)
//!         .build()?
//!         .start()
//!         .await?;
//!
//!     // ... run your application ...
//!
//!     runtime.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::actor::PromiseActors;
use crate::broker::{LedgerBroker, TokenBroker};
use crate::ingress::IngressAdapter;
use crate::ledger::Ledger;
use crate::promise::DisposePolicy;
use crate::server::run_http_server;
use crate::token_pruner::{TokenPruner, TokenPrunerConfig};

const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 8080);

/// How long `shutdown` lets in-flight requests finish before aborting them.
/// Blocked awaits would otherwise hold the server open indefinitely.
const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Builder for creating a [`PromiseRuntime`].
pub struct PromiseRuntimeBuilder {
    ledger: Option<Arc<dyn Ledger>>,
    bind_addr: SocketAddr,
    dispose_policy: DisposePolicy,
    shutdown_grace: Duration,
    token_pruner: TokenPrunerConfig,
}

impl std::fmt::Debug for PromiseRuntimeBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseRuntimeBuilder")
            .field("ledger", &self.ledger.as_ref().map(|_| "..."))
            .field("bind_addr", &self.bind_addr)
            .field("dispose_policy", &self.dispose_policy)
            .field("token_pruner", &self.token_pruner)
            .finish()
    }
}

impl Default for PromiseRuntimeBuilder {
    fn default() -> Self {
        Self {
            ledger: None,
            bind_addr: DEFAULT_BIND_ADDR,
            dispose_policy: DisposePolicy::default(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            token_pruner: TokenPrunerConfig::default(),
        }
    }
}

impl PromiseRuntimeBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the completion ledger (required).
    pub fn ledger(mut self, ledger: Arc<dyn Ledger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Set the bind address for the HTTP ingress.
    ///
    /// Default: `0.0.0.0:8080`. Port `0` picks a free port; read it back with
    /// [`PromiseRuntime::local_addr`].
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set the dispose policy. Default: [`DisposePolicy::Reset`].
    pub fn dispose_policy(mut self, policy: DisposePolicy) -> Self {
        self.dispose_policy = policy;
        self
    }

    /// Set how long shutdown waits for in-flight requests.
    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Set how redeemed callback tokens are pruned.
    pub fn token_pruner(mut self, config: TokenPrunerConfig) -> Self {
        self.token_pruner = config;
        self
    }

    /// Build the runtime configuration.
    ///
    /// Returns an error if required fields are missing.
    pub fn build(self) -> Result<PromiseRuntimeConfig> {
        let ledger = self
            .ledger
            .ok_or_else(|| anyhow::anyhow!("ledger is required"))?;

        Ok(PromiseRuntimeConfig {
            ledger,
            bind_addr: self.bind_addr,
            dispose_policy: self.dispose_policy,
            shutdown_grace: self.shutdown_grace,
            token_pruner: self.token_pruner,
        })
    }
}

/// Configuration for a [`PromiseRuntime`].
pub struct PromiseRuntimeConfig {
    ledger: Arc<dyn Ledger>,
    bind_addr: SocketAddr,
    dispose_policy: DisposePolicy,
    shutdown_grace: Duration,
    token_pruner: TokenPrunerConfig,
}

impl std::fmt::Debug for PromiseRuntimeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromiseRuntimeConfig")
            .field("ledger", &"...")
            .field("bind_addr", &self.bind_addr)
            .field("dispose_policy", &self.dispose_policy)
            .field("token_pruner", &self.token_pruner)
            .finish()
    }
}

impl PromiseRuntimeConfig {
    /// Recover undelivered notifications, bind the listener, and spawn the
    /// server and token pruner tasks.
    pub async fn start(self) -> Result<PromiseRuntime> {
        let broker = Arc::new(LedgerBroker::new(self.ledger.clone()));
        let actors = Arc::new(
            PromiseActors::new(self.ledger.clone(), broker.clone())
                .with_dispose_policy(self.dispose_policy),
        );

        let recovered = actors.recover().await?;
        if recovered > 0 {
            info!(recovered, "Outbox drained on startup");
        }

        let ingress = IngressAdapter::new(actors.clone(), broker.clone());
        let listener = TcpListener::bind(self.bind_addr).await?;
        let local_addr = listener.local_addr()?;

        let pruner = TokenPruner::new(self.ledger.clone(), self.token_pruner);
        let pruner_shutdown = pruner.shutdown_handle();
        let pruner_handle = tokio::spawn(async move {
            pruner.run().await;
        });

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server_handle = tokio::spawn(run_http_server(listener, ingress.clone(), shutdown_rx));

        info!(addr = %local_addr, policy = %self.dispose_policy, "PromiseRuntime started");

        Ok(PromiseRuntime {
            server_handle,
            shutdown_tx,
            pruner_handle,
            pruner_shutdown,
            actors,
            broker,
            ingress,
            local_addr,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

/// A running pledge-core instance embedded in an application.
///
/// Call [`shutdown`](Self::shutdown) for graceful termination.
pub struct PromiseRuntime {
    server_handle: JoinHandle<Result<()>>,
    shutdown_tx: watch::Sender<bool>,
    pruner_handle: JoinHandle<()>,
    pruner_shutdown: Arc<Notify>,
    actors: Arc<PromiseActors>,
    broker: Arc<LedgerBroker>,
    ingress: IngressAdapter,
    local_addr: SocketAddr,
    shutdown_grace: Duration,
}

impl PromiseRuntime {
    /// Create a new builder for configuring the runtime.
    pub fn builder() -> PromiseRuntimeBuilder {
        PromiseRuntimeBuilder::new()
    }

    /// Address the HTTP ingress is actually listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The promise actors, for in-process callers.
    pub fn actors(&self) -> &Arc<PromiseActors> {
        &self.actors
    }

    /// The token broker, as the trait object handed to in-process callers.
    pub fn broker(&self) -> Arc<dyn TokenBroker> {
        self.broker.clone()
    }

    /// The ingress adapter.
    pub fn ingress(&self) -> &IngressAdapter {
        &self.ingress
    }

    /// Check if the runtime is still running.
    pub fn is_running(&self) -> bool {
        !self.server_handle.is_finished()
    }

    /// Gracefully shut down the runtime.
    ///
    /// Stops accepting connections and waits up to the grace period for
    /// in-flight requests; anything still running after that is aborted.
    pub async fn shutdown(self) -> Result<()> {
        info!("PromiseRuntime shutting down...");

        let _ = self.shutdown_tx.send(true);
        self.pruner_shutdown.notify_one();
        if let Err(e) = self.pruner_handle.await {
            error!("Token pruner task panicked: {}", e);
        }

        let mut handle = self.server_handle;
        match tokio::time::timeout(self.shutdown_grace, &mut handle).await {
            Ok(Ok(Ok(()))) => {
                info!("PromiseRuntime shutdown complete");
                Ok(())
            }
            Ok(Ok(Err(e))) => {
                error!("PromiseRuntime server error during shutdown: {}", e);
                Err(e)
            }
            Ok(Err(e)) => {
                error!("PromiseRuntime server task panicked: {}", e);
                Err(anyhow::anyhow!("server task panicked: {}", e))
            }
            Err(_) => {
                warn!(
                    grace_ms = self.shutdown_grace.as_millis() as u64,
                    "In-flight requests outlived the grace period; aborting"
                );
                handle.abort();
                Ok(())
            }
        }
    }
}
