// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Completion ledger: durable storage behind the promise actors.
//!
//! The ledger keeps three things:
//!
//! | Table | Contents |
//! |-------|----------|
//! | `promises` | one row per non-pristine promise: outcome, ordered listener tokens, tombstone flag |
//! | `callback_tokens` | live tokens and, once redeemed, their completion until released or pruned |
//! | `pending_notifications` | outbox of listener notifications awaiting delivery |
//!
//! [`Ledger::commit`] writes the promise row and its outbox entries in one
//! transaction, so a crash can never leave an outcome committed with its
//! listener notifications lost.

pub mod postgres;
pub mod sqlite;

pub use self::postgres::PostgresLedger;
pub use self::sqlite::SqliteLedger;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::broker::{CallbackToken, RedeemStatus, TokenCompletion};
use crate::error::CoreError;
use crate::promise::{Notification, Outcome, PromiseState};

/// Raw promise row as stored by both backends.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromiseRecord {
    /// Promise key.
    pub promise_id: String,
    /// JSON-encoded [`Outcome`], `None` while pending.
    pub outcome: Option<String>,
    /// JSON array of listener token ids in registration order.
    pub listeners: String,
    /// Tombstone flag.
    pub disposed: bool,
    /// When the row was first written.
    pub created_at: DateTime<Utc>,
    /// When the row was last written.
    pub updated_at: DateTime<Utc>,
}

impl PromiseRecord {
    /// Decode the row into a [`PromiseState`].
    pub fn into_state(self) -> Result<PromiseState, CoreError> {
        let outcome = self
            .outcome
            .as_deref()
            .map(serde_json::from_str::<Outcome>)
            .transpose()?;
        let listeners: Vec<CallbackToken> = serde_json::from_str(&self.listeners)?;
        Ok(PromiseState {
            outcome,
            listeners,
            disposed: self.disposed,
        })
    }
}

/// Encoded columns of a [`PromiseState`].
pub(crate) struct EncodedState {
    pub outcome: Option<String>,
    pub listeners: String,
}

pub(crate) fn encode_state(state: &PromiseState) -> Result<EncodedState, CoreError> {
    Ok(EncodedState {
        outcome: state
            .outcome
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
        listeners: serde_json::to_string(&state.listeners)?,
    })
}

/// Raw outbox row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct NotificationRow {
    /// Outbox sequence number.
    pub id: i64,
    /// Promise that produced the notification.
    pub promise_id: String,
    /// Token to redeem.
    pub token_id: String,
    /// JSON-encoded [`TokenCompletion`].
    pub completion: String,
    /// When the notification was enqueued.
    pub created_at: DateTime<Utc>,
}

/// Decoded outbox entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingNotification {
    /// Outbox sequence number, used to acknowledge delivery.
    pub id: i64,
    /// Promise that produced the notification.
    pub promise_id: String,
    /// Token and payload to redeem.
    pub notification: Notification,
}

impl TryFrom<NotificationRow> for PendingNotification {
    type Error = CoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        let completion: TokenCompletion = serde_json::from_str(&row.completion)?;
        Ok(Self {
            id: row.id,
            promise_id: row.promise_id,
            notification: Notification {
                token: CallbackToken::from(row.token_id),
                completion,
            },
        })
    }
}

/// Raw token row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TokenRow {
    /// Token id.
    pub token_id: String,
    /// JSON-encoded [`TokenCompletion`], `None` until redeemed.
    pub completion: Option<String>,
    /// When the token was minted.
    pub created_at: DateTime<Utc>,
    /// When the token was redeemed.
    pub redeemed_at: Option<DateTime<Utc>>,
}

/// Decoded token record.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenRecord {
    /// Token id.
    pub token_id: String,
    /// Redemption payload, `None` while unredeemed.
    pub completion: Option<TokenCompletion>,
    /// When the token was minted.
    pub created_at: DateTime<Utc>,
    /// When the token was redeemed.
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl TryFrom<TokenRow> for TokenRecord {
    type Error = CoreError;

    fn try_from(row: TokenRow) -> Result<Self, Self::Error> {
        Ok(Self {
            token_id: row.token_id,
            completion: row
                .completion
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            created_at: row.created_at,
            redeemed_at: row.redeemed_at,
        })
    }
}

/// Durable storage interface used by the actors and the broker.
///
/// Implementations must make each method atomic on its own; the actors
/// guarantee that no two `load`/`commit` pairs for the same key overlap.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Load the state of `promise_id`. Unknown keys load as the pristine state.
    async fn load(&self, promise_id: &str) -> Result<PromiseState, CoreError>;

    /// Atomically replace the state of `promise_id` and enqueue `notifications`.
    ///
    /// A pristine `state` deletes the row.
    async fn commit(
        &self,
        promise_id: &str,
        state: &PromiseState,
        notifications: &[Notification],
    ) -> Result<(), CoreError>;

    /// Undelivered notifications in enqueue order, optionally for one promise.
    async fn pending_notifications(
        &self,
        promise_id: Option<&str>,
    ) -> Result<Vec<PendingNotification>, CoreError>;

    /// Remove a delivered notification from the outbox.
    async fn ack_notification(&self, id: i64) -> Result<(), CoreError>;

    /// Record a freshly minted token.
    async fn insert_token(&self, token_id: &str) -> Result<(), CoreError>;

    /// Record the redemption of `token_id` unless it was already redeemed.
    async fn redeem_token(
        &self,
        token_id: &str,
        completion: &TokenCompletion,
    ) -> Result<RedeemStatus, CoreError>;

    /// Look up a token.
    async fn get_token(&self, token_id: &str) -> Result<Option<TokenRecord>, CoreError>;

    /// Forget a token. Returns whether a row was removed.
    async fn delete_token(&self, token_id: &str) -> Result<bool, CoreError>;

    /// Delete tokens redeemed before `redeemed_before`. Unredeemed tokens are
    /// kept, since a listener may still be parked on them. Returns the number
    /// of rows removed.
    async fn prune_tokens(&self, redeemed_before: DateTime<Utc>) -> Result<u64, CoreError>;

    /// Check database connectivity.
    async fn health_check_db(&self) -> Result<bool, CoreError>;
}

/// Open a ledger for `database_url`, running migrations.
///
/// `sqlite:` URLs select [`SqliteLedger`], `postgres://`/`postgresql://` URLs
/// select [`PostgresLedger`].
pub async fn open(database_url: &str, max_connections: u32) -> Result<Arc<dyn Ledger>, CoreError> {
    if database_url.starts_with("sqlite:") {
        let ledger = SqliteLedger::connect(database_url, max_connections).await?;
        return Ok(Arc::new(ledger));
    }

    if database_url.starts_with("postgres://") || database_url.starts_with("postgresql://") {
        let ledger = PostgresLedger::connect(database_url, max_connections).await?;
        return Ok(Arc::new(ledger));
    }

    Err(CoreError::validation(
        "database_url",
        "must start with 'sqlite:', 'postgres://' or 'postgresql://'",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_round_trips_through_encoding() {
        let state = PromiseState {
            outcome: Some(Outcome::Value(json!({"n": 1}))),
            listeners: vec![CallbackToken::from("tok_a"), CallbackToken::from("tok_b")],
            disposed: false,
        };
        let encoded = encode_state(&state).unwrap();
        let record = PromiseRecord {
            promise_id: "p".to_string(),
            outcome: encoded.outcome,
            listeners: encoded.listeners,
            disposed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(record.into_state().unwrap(), state);
    }

    #[test]
    fn test_corrupt_record_is_database_error() {
        let record = PromiseRecord {
            promise_id: "p".to_string(),
            outcome: Some("{broken".to_string()),
            listeners: "[]".to_string(),
            disposed: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(
            record.into_state().unwrap_err().error_code(),
            "DATABASE_ERROR"
        );
    }

    #[tokio::test]
    async fn test_open_rejects_unknown_scheme() {
        let err = open("mysql://localhost/db", 5).await.err().unwrap();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");
    }
}
