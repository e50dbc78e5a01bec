// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Promise actors: single-writer-per-key execution of promise transitions.
//!
//! [`PromiseActors`] behaves as one logical actor per promise key. Every
//! mutating operation runs the same sequence while holding the key's lock:
//!
//! 1. drain any outbox notifications left behind for the key
//! 2. load the state from the ledger
//! 3. apply the pure transition from [`crate::promise`]
//! 4. commit the new state and its notifications in one ledger transaction
//! 5. deliver the notifications through the token broker, acknowledging each
//!
//! Because the lock is held from step 2 through step 5, no `await_token` can
//! slip in between "outcome set" and "listeners drained".
//!
//! The sequence runs on a task of its own. A caller that gives up (a dropped
//! HTTP request, a timeout) stops waiting for the reply, but the commit and
//! the delivery it started still run to the end.

use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;

use serde_json::Value;
use tracing::{Instrument, Span, debug, info, instrument, warn};

use crate::broker::{CallbackToken, TokenBroker};
use crate::error::{CoreError, Result};
use crate::ledger::Ledger;
use crate::locks::KeyedLocks;
use crate::promise::{self, DisposePolicy, Outcome, Transition, validate_promise_id};

/// The set of promise actors sharing one ledger and broker.
pub struct PromiseActors {
    shared: Arc<Shared>,
    dispose_policy: DisposePolicy,
}

/// State every actor task needs, owned jointly by the spawned tasks.
struct Shared {
    ledger: Arc<dyn Ledger>,
    broker: Arc<dyn TokenBroker>,
    locks: KeyedLocks,
}

impl PromiseActors {
    /// Create actors over `ledger`, delivering notifications through `broker`.
    pub fn new(ledger: Arc<dyn Ledger>, broker: Arc<dyn TokenBroker>) -> Self {
        Self {
            shared: Arc::new(Shared {
                ledger,
                broker,
                locks: KeyedLocks::new(),
            }),
            dispose_policy: DisposePolicy::default(),
        }
    }

    /// Set the dispose policy.
    pub fn with_dispose_policy(mut self, policy: DisposePolicy) -> Self {
        self.dispose_policy = policy;
        self
    }

    /// The configured dispose policy.
    pub fn dispose_policy(&self) -> DisposePolicy {
        self.dispose_policy
    }

    /// The broker used for listener notifications.
    pub fn broker(&self) -> &Arc<dyn TokenBroker> {
        &self.shared.broker
    }

    /// Check ledger connectivity.
    pub async fn health_check(&self) -> Result<bool> {
        self.shared.ledger.health_check_db().await
    }

    /// Resolve `promise_id` with `value` unless already settled.
    ///
    /// Returns the committed outcome, which is the caller's own only if it won.
    #[instrument(skip(self, value), fields(promise_id = %promise_id))]
    pub async fn resolve(&self, promise_id: &str, value: Value) -> Result<Outcome> {
        validate_promise_id(promise_id)?;
        let shared = self.shared.clone();
        let promise_id = promise_id.to_string();
        detached(async move { shared.complete(&promise_id, Outcome::Value(value)).await }).await
    }

    /// Reject `promise_id` with `message` unless already settled.
    ///
    /// Any message is accepted, the empty string included.
    #[instrument(skip(self), fields(promise_id = %promise_id))]
    pub async fn reject(&self, promise_id: &str, message: &str) -> Result<Outcome> {
        validate_promise_id(promise_id)?;
        let shared = self.shared.clone();
        let promise_id = promise_id.to_string();
        let outcome = Outcome::Error(message.to_string());
        detached(async move { shared.complete(&promise_id, outcome).await }).await
    }

    /// Read the current outcome without blocking or mutating.
    #[instrument(skip(self), fields(promise_id = %promise_id))]
    pub async fn peek(&self, promise_id: &str) -> Result<Option<Outcome>> {
        validate_promise_id(promise_id)?;
        let state = self.shared.ledger.load(promise_id).await?;
        Ok(state.outcome)
    }

    /// Register `token` to be redeemed with the outcome of `promise_id`.
    ///
    /// A settled promise redeems the token immediately and returns the outcome;
    /// otherwise the token is stored and `None` is returned, and the caller must
    /// learn the outcome through the token's resumption channel.
    #[instrument(skip(self), fields(promise_id = %promise_id, token_id = %token))]
    pub async fn await_token(
        &self,
        promise_id: &str,
        token: &CallbackToken,
    ) -> Result<Option<Outcome>> {
        validate_promise_id(promise_id)?;
        let shared = self.shared.clone();
        let promise_id = promise_id.to_string();
        let token = token.clone();
        detached(async move { shared.register(&promise_id, token).await }).await
    }

    /// Reject all pending listeners with a disposal error and clear the promise.
    #[instrument(skip(self), fields(promise_id = %promise_id, policy = %self.dispose_policy))]
    pub async fn dispose(&self, promise_id: &str) -> Result<()> {
        validate_promise_id(promise_id)?;
        let shared = self.shared.clone();
        let promise_id = promise_id.to_string();
        let policy = self.dispose_policy;
        detached(async move { shared.dispose(&promise_id, policy).await }).await
    }

    /// Deliver every notification left in the outbox, e.g. after a crash
    /// between commit and delivery. Returns the number delivered.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<usize> {
        let shared = &self.shared;
        let pending = shared.ledger.pending_notifications(None).await?;
        let keys: BTreeSet<String> = pending.into_iter().map(|p| p.promise_id).collect();

        let mut delivered = 0;
        for promise_id in keys {
            let _guard = shared.locks.lock(&promise_id).await;
            delivered += shared.deliver(&promise_id).await?;
        }

        if delivered > 0 {
            info!(delivered, "Recovered undelivered listener notifications");
        }
        Ok(delivered)
    }
}

/// Run `op` on its own task and wait for it.
///
/// Dropping the returned future abandons the wait, not the task.
async fn detached<T, F>(op: F) -> Result<T>
where
    F: Future<Output = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    tokio::spawn(op.instrument(Span::current()))
        .await
        .map_err(|e| CoreError::Internal {
            details: format!("promise actor task failed: {}", e),
        })?
}

impl Shared {
    async fn complete(&self, promise_id: &str, outcome: Outcome) -> Result<Outcome> {
        let _guard = self.locks.lock(promise_id).await;
        self.deliver(promise_id).await?;

        let state = self.ledger.load(promise_id).await?;
        let transition = promise::complete(promise_id, state, outcome)?;
        let first = transition.next.is_some();
        let listeners = transition.notifications.len();
        let committed = self.apply(promise_id, transition).await?;

        if first {
            info!(
                is_error = committed.is_error(),
                notified = listeners,
                "Promise settled"
            );
        } else {
            debug!("Promise already settled; returning committed outcome");
        }
        Ok(committed)
    }

    async fn register(&self, promise_id: &str, token: CallbackToken) -> Result<Option<Outcome>> {
        let _guard = self.locks.lock(promise_id).await;
        self.deliver(promise_id).await?;

        let state = self.ledger.load(promise_id).await?;
        let transition = promise::register(promise_id, state, token)?;
        let reply = self.apply(promise_id, transition).await?;

        match &reply {
            Some(_) => debug!("Promise already settled; listener notified immediately"),
            None => debug!("Listener registered"),
        }
        Ok(reply)
    }

    async fn dispose(&self, promise_id: &str, policy: DisposePolicy) -> Result<()> {
        let _guard = self.locks.lock(promise_id).await;
        self.deliver(promise_id).await?;

        let state = self.ledger.load(promise_id).await?;
        let listeners = state.listeners.len();
        let transition = promise::dispose(state, policy);
        let changed = transition.next.is_some();
        self.apply(promise_id, transition).await?;

        if changed {
            info!(rejected_listeners = listeners, "Promise disposed");
        }
        Ok(())
    }

    /// Persist a transition and deliver its notifications. Caller holds the key lock.
    async fn apply<R>(&self, promise_id: &str, transition: Transition<R>) -> Result<R> {
        let Transition {
            next,
            notifications,
            reply,
        } = transition;

        match next {
            Some(state) => {
                self.ledger
                    .commit(promise_id, &state, &notifications)
                    .await?;
                self.deliver(promise_id).await?;
            }
            None => {
                // Nothing to persist: the state already carries the outcome, so
                // a retry after a failed redemption reproduces the same notification.
                for notification in notifications {
                    self.broker
                        .redeem(&notification.token, notification.completion)
                        .await?;
                }
            }
        }

        Ok(reply)
    }

    /// Drain the outbox for one key in enqueue order. Caller holds the key lock.
    async fn deliver(&self, promise_id: &str) -> Result<usize> {
        let pending = self.ledger.pending_notifications(Some(promise_id)).await?;
        let count = pending.len();

        for entry in pending {
            let status = self
                .broker
                .redeem(&entry.notification.token, entry.notification.completion)
                .await;
            match status {
                Ok(status) => {
                    debug!(token_id = %entry.notification.token, ?status, "Listener notified");
                }
                Err(e) => {
                    warn!(token_id = %entry.notification.token, error = %e, "Listener notification failed");
                    return Err(e);
                }
            }
            self.ledger.ack_notification(entry.id).await?;
        }

        Ok(count)
    }
}
