// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Example applications showcasing embedded durable promises with SQLite persistence.
//!
//! The examples run the promise actors in-process over a SQLite file, so
//! running a binary twice shows state surviving the restart.

use std::path::Path;
use std::sync::Arc;

use pledge_core::ledger::{Ledger, SqliteLedger};
use pledge_core::{CoreError, LedgerBroker, PromiseActors};
use pledge_sdk::PromiseClient;

/// Open the SQLite ledger at `path`, deliver leftover notifications and return
/// an embedded client over it.
pub async fn embedded_client(path: impl AsRef<Path>) -> Result<PromiseClient, CoreError> {
    let ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::from_path(path).await?);
    let broker = Arc::new(LedgerBroker::new(ledger.clone()));
    let actors = Arc::new(PromiseActors::new(ledger, broker.clone()));
    actors.recover().await?;
    Ok(PromiseClient::embedded(actors, broker))
}

/// Install a plain `fmt` subscriber honoring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .try_init();
}
