// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ledger schema migrations, embedded at compile time.
//!
//! Both backends carry the same three tables: `promises` (outcome, ordered
//! listener tokens, tombstone flag), `callback_tokens` (minted tokens and their
//! redemption payload) and `pending_notifications` (the delivery outbox, indexed
//! by promise and sequence number).
//!
//! [`SqliteLedger::connect`](crate::ledger::SqliteLedger::connect) and
//! [`PostgresLedger::connect`](crate::ledger::PostgresLedger::connect) apply
//! these on their own. Call the `run_*` helpers only when building a ledger over
//! a pool you created yourself:
//!
//! ```ignore
//! let pool = sqlx::PgPool::connect(&database_url).await?;
//! pledge_core::migrations::run_postgres(&pool).await?;
//! let ledger = pledge_core::ledger::PostgresLedger::new(pool);
//! ```

use sqlx::migrate::{MigrateError, Migrator};

/// Ledger schema for PostgreSQL (`TIMESTAMPTZ` columns, `BIGSERIAL` outbox ids).
pub static POSTGRES: Migrator = sqlx::migrate!("./migrations/postgresql");

/// Ledger schema for SQLite (RFC 3339 text timestamps, `AUTOINCREMENT` outbox ids).
pub static SQLITE: Migrator = sqlx::migrate!("./migrations/sqlite");

/// Bring a PostgreSQL database up to the current ledger schema.
pub async fn run_postgres(pool: &sqlx::PgPool) -> Result<(), MigrateError> {
    POSTGRES.run(pool).await
}

/// Bring a SQLite database up to the current ledger schema.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
