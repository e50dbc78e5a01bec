// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pledge Core - Durable Promises
//!
//! A durable promise is a named, single-assignment future that survives process
//! restarts. Any number of parties may await it; exactly one party's resolve or
//! reject wins, and every awaiter observes that same outcome.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────────┐
//! │  HTTP callers        │        │  in-process callers      │
//! │  (pledge-sdk http)   │        │  (pledge-sdk embedded)   │
//! └──────────┬───────────┘        └────────────┬─────────────┘
//!            ▼                                 │
//! ┌──────────────────────┐                     │
//! │  server (axum)       │                     │
//! └──────────┬───────────┘                     │
//!            ▼                                 ▼
//! ┌──────────────────────┐  await_token ┌──────────────────────┐
//! │  IngressAdapter      │─────────────►│  PromiseActors       │
//! │  (mint, block)       │              │  (one writer per key)│
//! └──────────┬───────────┘              └──────────┬───────────┘
//!            │ resume                  redeem      │ load/commit
//!            ▼                                     ▼
//! ┌──────────────────────┐              ┌──────────────────────┐
//! │  TokenBroker         │─────────────►│  Ledger              │
//! │  (waiters, tokens)   │   tokens     │  SQLite | PostgreSQL │
//! └──────────────────────┘              └──────────────────────┘
//! ```
//!
//! # Operations
//!
//! | Operation | Description |
//! |-----------|-------------|
//! | `resolve` | Settle with a value unless already settled; returns the committed outcome |
//! | `reject` | Settle with an error message unless already settled |
//! | `peek` | Read the outcome without blocking |
//! | `await_token` | Register a callback token, or redeem it at once if settled |
//! | `dispose` | Reject pending listeners and clear the key |
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `PLEDGE_DATABASE_URL` | Yes | - | `sqlite:` or `postgres://` connection string |
//! | `PLEDGE_HTTP_PORT` | No | `8080` | HTTP ingress port |
//! | `PLEDGE_MAX_CONNECTIONS` | No | `10` | Database pool size |
//! | `PLEDGE_DISPOSE_POLICY` | No | `reset` | `reset` or `tombstone` |
//! | `PLEDGE_TOKEN_PRUNE_ENABLED` | No | `true` | Prune redeemed callback tokens |
//! | `PLEDGE_TOKEN_PRUNE_INTERVAL_SECS` | No | `300` | Seconds between prune runs |
//! | `PLEDGE_TOKEN_RETENTION_SECS` | No | `3600` | How long a redeemed token is kept |

#![deny(missing_docs)]

/// Promise actors: serialized per-key execution of promise transitions.
pub mod actor;

/// Callback token broker.
pub mod broker;

/// Server configuration loaded from environment variables.
pub mod config;

/// Error types with stable error codes.
pub mod error;

/// Adapter for callers outside the actor system.
pub mod ingress;

/// Durable storage for promise records, tokens and the notification outbox.
pub mod ledger;

/// Per-key async locks.
pub mod locks;

/// Embedded database migrations.
pub mod migrations;

/// Pure promise state machine.
pub mod promise;

/// Embeddable runtime wiring ledger, actors and HTTP ingress.
pub mod runtime;

/// HTTP ingress server.
pub mod server;

/// Background pruning of redeemed callback tokens.
pub mod token_pruner;

pub use actor::PromiseActors;
pub use broker::{CallbackToken, LedgerBroker, TokenBroker};
pub use error::CoreError;
pub use ingress::IngressAdapter;
pub use promise::{DisposePolicy, Outcome};
