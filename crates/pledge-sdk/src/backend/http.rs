// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP backend talking to a pledge-core server.

use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use pledge_core::Outcome;
use pledge_core::server::ErrorResponse;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use super::PromiseBackend;
use crate::config::SdkConfig;
use crate::error::{Result, SdkError};

/// Characters left unescaped in a promise id path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Backend that calls the HTTP ingress of a pledge-core server.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    request_timeout: Duration,
}

impl HttpBackend {
    /// Create a backend from `config`.
    pub fn new(config: &SdkConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| SdkError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.ingress_url.clone(),
            request_timeout: config.request_timeout(),
        })
    }

    fn url(&self, promise_id: &str, action: &str) -> String {
        format!(
            "{}/promise/{}/{}",
            self.base_url,
            utf8_percent_encode(promise_id, PATH_SEGMENT),
            action
        )
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await?;
        debug!(%status, "Request failed");
        match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(problem) => Err(SdkError::Server {
                code: problem.problem_type,
                message: problem.detail,
            }),
            Err(_) => Err(SdkError::UnexpectedResponse(format!(
                "HTTP {}: {}",
                status, body
            ))),
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        Ok(self.send(request).await?.json::<T>().await?)
    }
}

#[async_trait]
impl PromiseBackend for HttpBackend {
    async fn resolve(&self, promise_id: &str, value: Value) -> Result<Outcome> {
        let request = self
            .client
            .post(self.url(promise_id, "resolve"))
            .timeout(self.request_timeout)
            .json(&json!({ "value": value }));
        self.send_json(request).await
    }

    async fn reject(&self, promise_id: &str, message: &str) -> Result<Outcome> {
        let request = self
            .client
            .post(self.url(promise_id, "reject"))
            .timeout(self.request_timeout)
            .json(&json!({ "message": message }));
        self.send_json(request).await
    }

    async fn peek(&self, promise_id: &str) -> Result<Option<Outcome>> {
        let request = self
            .client
            .get(self.url(promise_id, "peek"))
            .timeout(self.request_timeout);
        self.send_json(request).await
    }

    async fn await_outcome(&self, promise_id: &str) -> Result<Outcome> {
        // No timeout: the call lasts as long as the promise stays pending.
        let request = self.client.post(self.url(promise_id, "await"));
        self.send_json(request).await
    }

    async fn dispose(&self, promise_id: &str) -> Result<()> {
        let request = self
            .client
            .post(self.url(promise_id, "dispose"))
            .timeout(self.request_timeout);
        self.send(request).await?;
        Ok(())
    }
}
