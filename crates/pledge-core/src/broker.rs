// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Callback token broker.
//!
//! A callback token is an opaque, one-shot continuation: whoever holds its id
//! may redeem it once, and the party that asked to be resumed by it is woken
//! with the redemption payload.
//!
//! [`LedgerBroker`] keeps the authoritative token record in the completion
//! ledger (so a redemption survives restarts and duplicate redemptions are
//! detected durably) and an in-memory table of local waiters.
//!
//! Wake-ups cannot be lost: [`TokenBroker::resume`] registers its waiter
//! *before* checking the ledger, and [`TokenBroker::redeem`] writes the ledger
//! *before* looking for a waiter. Whichever side runs second sees the other.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ledger::Ledger;
use crate::promise::Outcome;

/// Opaque, one-shot redeemable identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackToken(String);

impl CallbackToken {
    /// Mint a fresh random token id.
    pub fn generate() -> Self {
        Self(format!("tok_{}", Uuid::new_v4().simple()))
    }

    /// The token id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CallbackToken {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for CallbackToken {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Display for CallbackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload carried by a token redemption.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCompletion {
    /// The awaited promise settled with this outcome.
    Resolved(Outcome),
    /// The awaited promise went away (disposal) with this message.
    Rejected(String),
}

/// What happened to a redemption attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedeemStatus {
    /// First redemption; the payload was recorded.
    Redeemed,
    /// The token had already been redeemed; nothing changed.
    AlreadyRedeemed,
    /// No such token; nothing changed.
    Unknown,
}

/// Broker interface consumed by the promise actors and the ingress adapter.
#[async_trait]
pub trait TokenBroker: Send + Sync {
    /// Mint a new, unredeemed token.
    async fn mint(&self) -> Result<CallbackToken>;

    /// Redeem `token` with `completion`. At most one redemption per token ever
    /// takes effect; later ones report [`RedeemStatus::AlreadyRedeemed`].
    async fn redeem(&self, token: &CallbackToken, completion: TokenCompletion)
    -> Result<RedeemStatus>;

    /// Obtain the resumption channel for `token`.
    ///
    /// Resolves immediately if the token was already redeemed. One waiter per
    /// token: a second call replaces the first waiter, which then observes
    /// [`CoreError::TokenAbandoned`].
    async fn resume(&self, token: &CallbackToken) -> Result<Resumption>;

    /// Forget `token` once its holder has consumed the completion.
    ///
    /// Later redemptions report [`RedeemStatus::Unknown`] and are still no-ops.
    async fn release(&self, token: &CallbackToken) -> Result<()>;
}

type WaiterTable = Mutex<HashMap<String, oneshot::Sender<TokenCompletion>>>;

/// Removes a local waiter when the resumption is dropped without firing.
struct WaiterRegistration {
    waiters: Arc<WaiterTable>,
    token_id: String,
}

impl Drop for WaiterRegistration {
    fn drop(&mut self) {
        let mut waiters = self.waiters.lock().unwrap_or_else(PoisonError::into_inner);
        // Only remove our own sender; a replacement waiter may have taken the slot.
        if waiters
            .get(&self.token_id)
            .is_some_and(|sender| sender.is_closed())
        {
            waiters.remove(&self.token_id);
        }
    }
}

enum ResumptionState {
    Ready(TokenCompletion),
    Waiting {
        receiver: oneshot::Receiver<TokenCompletion>,
        _registration: WaiterRegistration,
    },
}

/// The resumption side of a callback token.
pub struct Resumption {
    token_id: String,
    state: ResumptionState,
}

impl fmt::Debug for Resumption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ready = matches!(self.state, ResumptionState::Ready(_));
        f.debug_struct("Resumption")
            .field("token_id", &self.token_id)
            .field("ready", &ready)
            .finish()
    }
}

impl Resumption {
    /// Token this resumption belongs to.
    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    /// Wait until the token is redeemed. No timeout is applied.
    pub async fn wait(self) -> Result<TokenCompletion> {
        match self.state {
            ResumptionState::Ready(completion) => Ok(completion),
            ResumptionState::Waiting {
                receiver,
                _registration,
            } => receiver.await.map_err(|_| CoreError::TokenAbandoned {
                token_id: self.token_id,
            }),
        }
    }
}

/// Token broker backed by the completion ledger.
pub struct LedgerBroker {
    ledger: Arc<dyn Ledger>,
    waiters: Arc<WaiterTable>,
}

impl LedgerBroker {
    /// Create a broker over `ledger`.
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self {
            ledger,
            waiters: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Number of local waiters currently parked.
    pub fn waiting(&self) -> usize {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn take_waiter(&self, token_id: &str) -> Option<oneshot::Sender<TokenCompletion>> {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token_id)
    }
}

#[async_trait]
impl TokenBroker for LedgerBroker {
    #[instrument(skip(self))]
    async fn mint(&self) -> Result<CallbackToken> {
        let token = CallbackToken::generate();
        self.ledger.insert_token(token.as_str()).await?;
        debug!(token_id = %token, "Callback token minted");
        Ok(token)
    }

    #[instrument(skip(self, completion), fields(token_id = %token))]
    async fn redeem(
        &self,
        token: &CallbackToken,
        completion: TokenCompletion,
    ) -> Result<RedeemStatus> {
        let status = self.ledger.redeem_token(token.as_str(), &completion).await?;

        match status {
            RedeemStatus::Redeemed => {
                if let Some(sender) = self.take_waiter(token.as_str()) {
                    if sender.send(completion).is_err() {
                        debug!("Waiter went away before redemption; completion kept in ledger");
                    }
                } else {
                    debug!("Token redeemed with no local waiter");
                }
            }
            RedeemStatus::AlreadyRedeemed => {
                debug!("Duplicate redemption ignored");
            }
            RedeemStatus::Unknown => {
                warn!("Redemption of unknown callback token ignored");
            }
        }

        Ok(status)
    }

    #[instrument(skip(self), fields(token_id = %token))]
    async fn resume(&self, token: &CallbackToken) -> Result<Resumption> {
        let (sender, receiver) = oneshot::channel();
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.as_str().to_string(), sender);
        let registration = WaiterRegistration {
            waiters: self.waiters.clone(),
            token_id: token.as_str().to_string(),
        };

        let record = match self.ledger.get_token(token.as_str()).await {
            Ok(record) => record,
            Err(e) => {
                self.take_waiter(token.as_str());
                return Err(e);
            }
        };

        match record {
            None => {
                self.take_waiter(token.as_str());
                Err(CoreError::validation(
                    "token",
                    format!("unknown callback token '{}'", token),
                ))
            }
            Some(record) => match record.completion {
                Some(completion) => {
                    self.take_waiter(token.as_str());
                    debug!("Token already redeemed; resuming immediately");
                    Ok(Resumption {
                        token_id: token.as_str().to_string(),
                        state: ResumptionState::Ready(completion),
                    })
                }
                None => Ok(Resumption {
                    token_id: token.as_str().to_string(),
                    state: ResumptionState::Waiting {
                        receiver,
                        _registration: registration,
                    },
                }),
            },
        }
    }

    #[instrument(skip(self), fields(token_id = %token))]
    async fn release(&self, token: &CallbackToken) -> Result<()> {
        self.take_waiter(token.as_str());
        if self.ledger.delete_token(token.as_str()).await? {
            debug!("Callback token released");
        }
        Ok(())
    }
}
