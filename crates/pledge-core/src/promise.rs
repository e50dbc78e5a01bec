// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Promise state machine.
//!
//! Every mutation of a promise is expressed here as a pure function of the
//! persisted [`PromiseState`] plus a deterministic input. The functions return a
//! [`Transition`] describing the new state (if any), the listener notifications
//! that must be delivered as a consequence, and the reply for the caller.
//!
//! Because transitions never consult anything outside the state they are given,
//! re-applying an operation after a crash and reload always yields the correct
//! result: a retried `resolve` against an already-settled promise is a no-op
//! that returns the committed outcome.
//!
//! ```text
//!            resolve/reject                     dispose (reset)
//!  ┌───────┐ ──────────────► ┌─────────┐ ─────────────────────► ┌───────┐
//!  │ EMPTY │                 │ SETTLED │                        │ EMPTY │
//!  └───────┘ ◄─ await(tok) ─ └─────────┘                        └───────┘
//!      │      (listeners++)       │ dispose (tombstone)
//!      │                          ▼
//!      └─── dispose (tombstone) ► ┌──────────┐
//!                                 │ DISPOSED │  (terminal)
//!                                 └──────────┘
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::broker::{CallbackToken, TokenCompletion};
use crate::error::{CoreError, Result};

/// Message delivered to listeners that were pending when their promise was disposed.
pub const DISPOSED_MESSAGE: &str = "promise was disposed";

/// The single committed outcome of a promise.
///
/// Serializes as `{"value": <json>}` or `{"error": "<message>"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    /// The promise was resolved with an opaque JSON value.
    Value(serde_json::Value),
    /// The promise was rejected with an error message.
    Error(String),
}

impl Outcome {
    /// Whether this outcome is a rejection.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// What `dispose` does to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisposePolicy {
    /// The key returns to its pristine empty state; a new lifecycle may begin.
    #[default]
    Reset,
    /// The key is permanently disposed; later completions and awaits fail.
    Tombstone,
}

impl DisposePolicy {
    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reset => "reset",
            Self::Tombstone => "tombstone",
        }
    }
}

impl fmt::Display for DisposePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisposePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reset" => Ok(Self::Reset),
            "tombstone" => Ok(Self::Tombstone),
            other => Err(format!("unknown dispose policy '{}'", other)),
        }
    }
}

/// Persisted state of one promise key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PromiseState {
    /// Committed outcome, `None` while pending.
    pub outcome: Option<Outcome>,
    /// Tokens waiting for the outcome, in registration order.
    pub listeners: Vec<CallbackToken>,
    /// Set only by `dispose` under [`DisposePolicy::Tombstone`].
    pub disposed: bool,
}

impl PromiseState {
    /// Whether this is the initial state of a never-seen key.
    ///
    /// The ledger stores nothing for pristine keys.
    pub fn is_pristine(&self) -> bool {
        self.outcome.is_none() && self.listeners.is_empty() && !self.disposed
    }
}

/// A completion that must be delivered to one listener token.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    /// Token to redeem.
    pub token: CallbackToken,
    /// Completion carried by the redemption.
    pub completion: TokenCompletion,
}

/// Result of applying an operation to a [`PromiseState`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition<R> {
    /// The new state, or `None` when the operation leaves the state untouched.
    pub next: Option<PromiseState>,
    /// Notifications to deliver, in order.
    pub notifications: Vec<Notification>,
    /// Value returned to the caller.
    pub reply: R,
}

impl<R> Transition<R> {
    fn unchanged(reply: R) -> Self {
        Self {
            next: None,
            notifications: Vec::new(),
            reply,
        }
    }
}

/// Validate a promise key.
pub fn validate_promise_id(promise_id: &str) -> Result<()> {
    if promise_id.trim().is_empty() {
        return Err(CoreError::validation("promise_id", "must not be empty"));
    }
    Ok(())
}

/// Settle a promise with `outcome` unless it is already settled.
///
/// The first completer wins; every later call observes the committed outcome.
pub fn complete(promise_id: &str, state: PromiseState, outcome: Outcome) -> Result<Transition<Outcome>> {
    if state.disposed {
        return Err(CoreError::PromiseTombstoned {
            promise_id: promise_id.to_string(),
        });
    }

    if let Some(existing) = state.outcome {
        return Ok(Transition::unchanged(existing));
    }

    let notifications = state
        .listeners
        .into_iter()
        .map(|token| Notification {
            token,
            completion: TokenCompletion::Resolved(outcome.clone()),
        })
        .collect();

    Ok(Transition {
        next: Some(PromiseState {
            outcome: Some(outcome.clone()),
            listeners: Vec::new(),
            disposed: false,
        }),
        notifications,
        reply: outcome,
    })
}

/// Register `token` as a listener.
///
/// A settled promise notifies the token immediately and never stores it.
pub fn register(
    promise_id: &str,
    state: PromiseState,
    token: CallbackToken,
) -> Result<Transition<Option<Outcome>>> {
    if state.disposed {
        return Err(CoreError::PromiseTombstoned {
            promise_id: promise_id.to_string(),
        });
    }

    if let Some(outcome) = state.outcome {
        return Ok(Transition {
            next: None,
            notifications: vec![Notification {
                token,
                completion: TokenCompletion::Resolved(outcome.clone()),
            }],
            reply: Some(outcome),
        });
    }

    // A retried await for the same token must not register it twice.
    if state.listeners.contains(&token) {
        return Ok(Transition::unchanged(None));
    }

    let mut listeners = state.listeners;
    listeners.push(token);
    Ok(Transition {
        next: Some(PromiseState {
            outcome: None,
            listeners,
            disposed: false,
        }),
        notifications: Vec::new(),
        reply: None,
    })
}

/// Dispose a promise: reject pending listeners and clear the outcome.
pub fn dispose(state: PromiseState, policy: DisposePolicy) -> Transition<()> {
    if state.disposed {
        return Transition::unchanged(());
    }

    let next = PromiseState {
        outcome: None,
        listeners: Vec::new(),
        disposed: policy == DisposePolicy::Tombstone,
    };

    if next == state {
        return Transition::unchanged(());
    }

    let notifications = state
        .listeners
        .into_iter()
        .map(|token| Notification {
            token,
            completion: TokenCompletion::Rejected(DISPOSED_MESSAGE.to_string()),
        })
        .collect();

    Transition {
        next: Some(next),
        notifications,
        reply: (),
    }
}
