// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! PostgreSQL-backed completion ledger.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::broker::{RedeemStatus, TokenCompletion};
use crate::error::CoreError;
use crate::migrations;
use crate::promise::{Notification, PromiseState};

use super::{
    Ledger, NotificationRow, PendingNotification, PromiseRecord, TokenRecord, TokenRow,
    encode_state,
};

/// PostgreSQL-backed ledger.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Create a ledger from an existing, migrated pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` and run migrations.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, CoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "connect".to_string(),
                details: format!("Failed to connect to PostgreSQL: {}", e),
            })?;

        migrations::run_postgres(&pool)
            .await
            .map_err(|e| CoreError::DatabaseError {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;

        Ok(Self { pool })
    }

    /// The underlying pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait::async_trait]
impl Ledger for PostgresLedger {
    async fn load(&self, promise_id: &str) -> Result<PromiseState, CoreError> {
        let record = sqlx::query_as::<_, PromiseRecord>(
            r#"
            SELECT promise_id, outcome, listeners, disposed, created_at, updated_at
            FROM promises
            WHERE promise_id = $1
            "#,
        )
        .bind(promise_id)
        .fetch_optional(&self.pool)
        .await?;

        match record {
            Some(record) => record.into_state(),
            None => Ok(PromiseState::default()),
        }
    }

    async fn commit(
        &self,
        promise_id: &str,
        state: &PromiseState,
        notifications: &[Notification],
    ) -> Result<(), CoreError> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        if state.is_pristine() {
            sqlx::query("DELETE FROM promises WHERE promise_id = $1")
                .bind(promise_id)
                .execute(&mut *tx)
                .await?;
        } else {
            let encoded = encode_state(state)?;
            sqlx::query(
                r#"
                INSERT INTO promises (promise_id, outcome, listeners, disposed, created_at, updated_at)
                VALUES ($1, $2, $3, $4, $5, $5)
                ON CONFLICT (promise_id) DO UPDATE SET
                    outcome = EXCLUDED.outcome,
                    listeners = EXCLUDED.listeners,
                    disposed = EXCLUDED.disposed,
                    updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(promise_id)
            .bind(encoded.outcome)
            .bind(encoded.listeners)
            .bind(state.disposed)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        for notification in notifications {
            let completion = serde_json::to_string(&notification.completion)?;
            sqlx::query(
                r#"
                INSERT INTO pending_notifications (promise_id, token_id, completion, created_at)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(promise_id)
            .bind(notification.token.as_str())
            .bind(completion)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn pending_notifications(
        &self,
        promise_id: Option<&str>,
    ) -> Result<Vec<PendingNotification>, CoreError> {
        let rows = sqlx::query_as::<_, NotificationRow>(
            r#"
            SELECT id, promise_id, token_id, completion, created_at
            FROM pending_notifications
            WHERE ($1::TEXT IS NULL OR promise_id = $1)
            ORDER BY id ASC
            "#,
        )
        .bind(promise_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(PendingNotification::try_from).collect()
    }

    async fn ack_notification(&self, id: i64) -> Result<(), CoreError> {
        sqlx::query("DELETE FROM pending_notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_token(&self, token_id: &str) -> Result<(), CoreError> {
        sqlx::query(
            r#"
            INSERT INTO callback_tokens (token_id, completion, created_at, redeemed_at)
            VALUES ($1, NULL, $2, NULL)
            "#,
        )
        .bind(token_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn redeem_token(
        &self,
        token_id: &str,
        completion: &TokenCompletion,
    ) -> Result<RedeemStatus, CoreError> {
        let payload = serde_json::to_string(completion)?;
        let result = sqlx::query(
            r#"
            UPDATE callback_tokens
            SET completion = $1, redeemed_at = $2
            WHERE token_id = $3 AND completion IS NULL
            "#,
        )
        .bind(payload)
        .bind(Utc::now())
        .bind(token_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(RedeemStatus::Redeemed);
        }

        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM callback_tokens WHERE token_id = $1")
                .bind(token_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match exists {
            Some(_) => RedeemStatus::AlreadyRedeemed,
            None => RedeemStatus::Unknown,
        })
    }

    async fn get_token(&self, token_id: &str) -> Result<Option<TokenRecord>, CoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            r#"
            SELECT token_id, completion, created_at, redeemed_at
            FROM callback_tokens
            WHERE token_id = $1
            "#,
        )
        .bind(token_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(TokenRecord::try_from).transpose()
    }

    async fn delete_token(&self, token_id: &str) -> Result<bool, CoreError> {
        let result = sqlx::query("DELETE FROM callback_tokens WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn prune_tokens(&self, redeemed_before: DateTime<Utc>) -> Result<u64, CoreError> {
        let result = sqlx::query(
            r#"
            DELETE FROM callback_tokens
            WHERE redeemed_at IS NOT NULL AND redeemed_at < $1
            "#,
        )
        .bind(redeemed_before)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn health_check_db(&self) -> Result<bool, CoreError> {
        let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
        Ok(row.0 == 1)
    }
}
