// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded backend calling the promise actors in-process.

use std::sync::Arc;

use async_trait::async_trait;
use pledge_core::{IngressAdapter, Outcome, PromiseActors, TokenBroker};
use serde_json::Value;

use super::PromiseBackend;
use crate::error::Result;

/// Backend that shares actors and broker with the host process.
pub struct EmbeddedBackend {
    ingress: IngressAdapter,
}

impl EmbeddedBackend {
    /// Create a backend over existing actors and their broker.
    pub fn new(actors: Arc<PromiseActors>, broker: Arc<dyn TokenBroker>) -> Self {
        Self {
            ingress: IngressAdapter::new(actors, broker),
        }
    }
}

#[async_trait]
impl PromiseBackend for EmbeddedBackend {
    async fn resolve(&self, promise_id: &str, value: Value) -> Result<Outcome> {
        Ok(self.ingress.resolve_external(promise_id, value).await?)
    }

    async fn reject(&self, promise_id: &str, message: &str) -> Result<Outcome> {
        Ok(self.ingress.reject_external(promise_id, message).await?)
    }

    async fn peek(&self, promise_id: &str) -> Result<Option<Outcome>> {
        Ok(self.ingress.peek_external(promise_id).await?)
    }

    async fn await_outcome(&self, promise_id: &str) -> Result<Outcome> {
        Ok(self.ingress.await_external(promise_id).await?)
    }

    async fn dispose(&self, promise_id: &str) -> Result<()> {
        Ok(self.ingress.dispose_external(promise_id).await?)
    }
}
