// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pledge Core - durable promise server
//!
//! Serves the promise operations over HTTP, persisting all state to SQLite or
//! PostgreSQL.

use anyhow::Result;
use tracing::{error, info};

use pledge_core::config::Config;
use pledge_core::ledger;
use pledge_core::runtime::PromiseRuntime;
use pledge_core::token_pruner::TokenPrunerConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pledge_core=info".parse()?),
        )
        .init();

    info!("Starting Pledge Core");

    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        http_addr = %config.http_addr,
        max_connections = config.max_connections,
        dispose_policy = %config.dispose_policy,
        "Configuration loaded"
    );

    info!("Connecting to database...");
    let ledger = ledger::open(&config.database_url, config.max_connections).await?;

    let healthy = ledger.health_check_db().await?;
    info!(healthy, "Database health check passed");

    let runtime = PromiseRuntime::builder()
        .ledger(ledger)
        .bind_addr(config.http_addr)
        .dispose_policy(config.dispose_policy)
        .token_pruner(TokenPrunerConfig::from_env())
        .build()?
        .start()
        .await?;

    info!(addr = %runtime.local_addr(), "Pledge Core initialized successfully");

    tokio::signal::ctrl_c().await?;
    info!("Shutting down...");

    runtime.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
