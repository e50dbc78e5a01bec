// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SDK backend implementations.
//!
//! - `http`: JSON over HTTP to a pledge-core server
//! - `embedded`: direct calls into in-process promise actors

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "embedded")]
pub mod embedded;

use async_trait::async_trait;
use pledge_core::Outcome;
use serde_json::Value;

use crate::error::Result;

/// Backend trait for promise operations.
///
/// Both backends return the same outcomes and the same error codes for the
/// same sequence of calls.
#[async_trait]
pub trait PromiseBackend: Send + Sync {
    /// Resolve unless settled; returns the committed outcome.
    async fn resolve(&self, promise_id: &str, value: Value) -> Result<Outcome>;

    /// Reject unless settled; returns the committed outcome.
    async fn reject(&self, promise_id: &str, message: &str) -> Result<Outcome>;

    /// Current outcome, if settled.
    async fn peek(&self, promise_id: &str) -> Result<Option<Outcome>>;

    /// Block until settled.
    async fn await_outcome(&self, promise_id: &str) -> Result<Outcome>;

    /// Reject pending awaiters and clear the promise.
    async fn dispose(&self, promise_id: &str) -> Result<()>;
}
