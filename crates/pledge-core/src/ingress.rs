// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Ingress adapter for callers outside the actor system.
//!
//! External callers cannot hand the actor a callback token of their own, so
//! [`IngressAdapter::await_external`] mints one, registers it and blocks on its
//! resumption until the promise settles or is disposed.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::actor::PromiseActors;
use crate::broker::{CallbackToken, Resumption, TokenBroker, TokenCompletion};
use crate::error::{CoreError, Result};
use crate::promise::{Outcome, validate_promise_id};

/// A minted token with its resumption channel, not yet registered on a promise.
///
/// Dropping a reservation (for instance when the awaiting request is cancelled)
/// only releases the local waiter; the promise's listener list is not touched
/// and the token row stays until the promise settles and it is pruned.
#[derive(Debug)]
pub struct PendingReservation {
    token: CallbackToken,
    resumption: Resumption,
}

impl PendingReservation {
    /// The reserved token.
    pub fn token(&self) -> &CallbackToken {
        &self.token
    }
}

/// Bridges external callers to the promise actors.
#[derive(Clone)]
pub struct IngressAdapter {
    actors: Arc<PromiseActors>,
    broker: Arc<dyn TokenBroker>,
}

impl IngressAdapter {
    /// Create an adapter over `actors`, minting tokens from `broker`.
    pub fn new(actors: Arc<PromiseActors>, broker: Arc<dyn TokenBroker>) -> Self {
        Self { actors, broker }
    }

    /// The underlying actors.
    pub fn actors(&self) -> &Arc<PromiseActors> {
        &self.actors
    }

    /// Mint a token and open its resumption channel.
    pub async fn reserve(&self) -> Result<PendingReservation> {
        let token = self.broker.mint().await?;
        let resumption = self.broker.resume(&token).await?;
        Ok(PendingReservation { token, resumption })
    }

    /// Block until `promise_id` settles and return its outcome.
    ///
    /// No timeout is applied. Disposal while waiting fails with
    /// [`CoreError::PromiseDisposed`].
    #[instrument(skip(self), fields(promise_id = %promise_id))]
    pub async fn await_external(&self, promise_id: &str) -> Result<Outcome> {
        validate_promise_id(promise_id)?;
        let reservation = self.reserve().await?;
        self.await_reserved(promise_id, reservation).await
    }

    /// Register `reservation` on `promise_id` and wait for its completion.
    ///
    /// The token is released once its completion has been read, so a finished
    /// request leaves nothing behind in the ledger.
    pub async fn await_reserved(
        &self,
        promise_id: &str,
        reservation: PendingReservation,
    ) -> Result<Outcome> {
        let PendingReservation { token, resumption } = reservation;

        let completion = match self.actors.await_token(promise_id, &token).await? {
            Some(outcome) => TokenCompletion::Resolved(outcome),
            None => {
                debug!(token_id = %token, "Waiting for promise to settle");
                resumption.wait().await?
            }
        };

        if let Err(e) = self.broker.release(&token).await {
            warn!(token_id = %token, error = %e, "Failed to release callback token; left for pruning");
        }

        match completion {
            TokenCompletion::Resolved(outcome) => Ok(outcome),
            TokenCompletion::Rejected(message) => {
                debug!(%message, "Promise disposed while waiting");
                Err(CoreError::PromiseDisposed {
                    promise_id: promise_id.to_string(),
                })
            }
        }
    }

    /// Forward to [`PromiseActors::resolve`].
    pub async fn resolve_external(&self, promise_id: &str, value: Value) -> Result<Outcome> {
        self.actors.resolve(promise_id, value).await
    }

    /// Forward to [`PromiseActors::reject`].
    pub async fn reject_external(&self, promise_id: &str, message: &str) -> Result<Outcome> {
        self.actors.reject(promise_id, message).await
    }

    /// Forward to [`PromiseActors::peek`].
    pub async fn peek_external(&self, promise_id: &str) -> Result<Option<Outcome>> {
        self.actors.peek(promise_id).await
    }

    /// Forward to [`PromiseActors::dispose`].
    pub async fn dispose_external(&self, promise_id: &str) -> Result<()> {
        self.actors.dispose(promise_id).await
    }

    /// Check ledger connectivity.
    pub async fn health_check(&self) -> Result<bool> {
        self.actors.health_check().await
    }
}
