// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Typed client facade over a [`PromiseBackend`].

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use pledge_core::Outcome;
use pledge_core::promise::validate_promise_id;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::backend::PromiseBackend;
use crate::error::{Result, SdkError};

/// Entry point for working with durable promises.
#[derive(Clone)]
pub struct PromiseClient {
    backend: Arc<dyn PromiseBackend>,
}

impl fmt::Debug for PromiseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PromiseClient").finish_non_exhaustive()
    }
}

impl PromiseClient {
    /// Client over any backend.
    pub fn from_backend(backend: Arc<dyn PromiseBackend>) -> Self {
        Self { backend }
    }

    /// Client calling in-process actors directly.
    #[cfg(feature = "embedded")]
    pub fn embedded(
        actors: Arc<pledge_core::PromiseActors>,
        broker: Arc<dyn pledge_core::TokenBroker>,
    ) -> Self {
        Self::from_backend(Arc::new(crate::backend::embedded::EmbeddedBackend::new(
            actors, broker,
        )))
    }

    /// Client talking to a pledge-core server over HTTP.
    #[cfg(feature = "http")]
    pub fn http(config: crate::config::SdkConfig) -> Result<Self> {
        let backend = crate::backend::http::HttpBackend::new(&config)?;
        Ok(Self::from_backend(Arc::new(backend)))
    }

    /// Handle to the promise named `promise_id`, carrying values of type `T`.
    pub fn promise<T>(&self, promise_id: impl Into<String>) -> DurablePromise<T> {
        DurablePromise {
            promise_id: promise_id.into(),
            backend: self.backend.clone(),
            _value: PhantomData,
        }
    }
}

/// Typed handle to one durable promise.
///
/// Creating a handle does not touch the service; every method is a separate call.
pub struct DurablePromise<T> {
    promise_id: String,
    backend: Arc<dyn PromiseBackend>,
    _value: PhantomData<fn() -> T>,
}

impl<T> Clone for DurablePromise<T> {
    fn clone(&self) -> Self {
        Self {
            promise_id: self.promise_id.clone(),
            backend: self.backend.clone(),
            _value: PhantomData,
        }
    }
}

impl<T> fmt::Debug for DurablePromise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurablePromise")
            .field("promise_id", &self.promise_id)
            .finish_non_exhaustive()
    }
}

impl<T> DurablePromise<T>
where
    T: Serialize + DeserializeOwned,
{
    /// The promise key.
    pub fn id(&self) -> &str {
        &self.promise_id
    }

    /// Wait for the outcome. A rejected promise yields [`SdkError::Rejected`].
    #[instrument(skip(self), fields(promise_id = %self.promise_id))]
    pub async fn get(&self) -> Result<T> {
        self.validate()?;
        let outcome = self.backend.await_outcome(&self.promise_id).await?;
        into_value(outcome)
    }

    /// The outcome if already settled, without waiting.
    #[instrument(skip(self), fields(promise_id = %self.promise_id))]
    pub async fn peek(&self) -> Result<Option<T>> {
        self.validate()?;
        self.backend
            .peek(&self.promise_id)
            .await?
            .map(into_value)
            .transpose()
    }

    /// Resolve with `value`. Returns the committed value, which is another
    /// caller's if they settled first.
    #[instrument(skip(self, value), fields(promise_id = %self.promise_id))]
    pub async fn resolve(&self, value: T) -> Result<T> {
        self.validate()?;
        let value = serde_json::to_value(value)?;
        let outcome = self.backend.resolve(&self.promise_id, value).await?;
        into_value(outcome)
    }

    /// Reject with `message`. Returns the committed outcome: the rejection as
    /// [`SdkError::Rejected`], or the value if another caller resolved first.
    #[instrument(skip(self), fields(promise_id = %self.promise_id))]
    pub async fn reject(&self, message: &str) -> Result<T> {
        self.validate()?;
        let outcome = self.backend.reject(&self.promise_id, message).await?;
        into_value(outcome)
    }

    /// Reject pending awaiters and clear the promise.
    #[instrument(skip(self), fields(promise_id = %self.promise_id))]
    pub async fn dispose(&self) -> Result<()> {
        self.validate()?;
        self.backend.dispose(&self.promise_id).await
    }

    fn validate(&self) -> Result<()> {
        Ok(validate_promise_id(&self.promise_id)?)
    }
}

fn into_value<T: DeserializeOwned>(outcome: Outcome) -> Result<T> {
    match outcome {
        Outcome::Value(value) => Ok(serde_json::from_value(value)?),
        Outcome::Error(message) => {
            debug!(%message, "Promise settled with an error");
            Err(SdkError::Rejected(message))
        }
    }
}
