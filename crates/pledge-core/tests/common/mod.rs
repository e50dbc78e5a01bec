// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for pledge-core integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use tower::ServiceExt;

use pledge_core::actor::PromiseActors;
use pledge_core::broker::LedgerBroker;
use pledge_core::ingress::IngressAdapter;
use pledge_core::ledger::{Ledger, SqliteLedger};
use pledge_core::promise::DisposePolicy;
use pledge_core::server::create_router;

/// In-process wiring of ledger, broker, actors and router.
pub struct TestContext {
    pub ledger: Arc<dyn Ledger>,
    pub broker: Arc<LedgerBroker>,
    pub actors: Arc<PromiseActors>,
    pub ingress: IngressAdapter,
}

impl TestContext {
    /// Context over a fresh in-memory SQLite ledger.
    pub async fn in_memory(policy: DisposePolicy) -> Self {
        let ledger: Arc<dyn Ledger> = Arc::new(
            SqliteLedger::in_memory()
                .await
                .expect("Failed to create in-memory ledger"),
        );
        Self::over(ledger, policy)
    }

    /// Context over an existing ledger.
    pub fn over(ledger: Arc<dyn Ledger>, policy: DisposePolicy) -> Self {
        let broker = Arc::new(LedgerBroker::new(ledger.clone()));
        let actors =
            Arc::new(PromiseActors::new(ledger.clone(), broker.clone()).with_dispose_policy(policy));
        let ingress = IngressAdapter::new(actors.clone(), broker.clone());
        Self {
            ledger,
            broker,
            actors,
            ingress,
        }
    }

    /// A router bound to this context.
    pub fn router(&self) -> Router {
        create_router(self.ingress.clone())
    }

    /// Send one request through the router and decode the JSON reply.
    ///
    /// Empty bodies decode as `Value::Null`.
    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send(self.router(), method, uri, body).await
    }
}

/// Send one request through `router` and decode the JSON reply.
pub async fn send(
    router: Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("valid request");

    let response = router.oneshot(request).await.expect("router is infallible");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("readable body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("JSON body")
    };
    (status, json)
}

/// Skip test if TEST_DATABASE_URL is not set.
#[macro_export]
macro_rules! skip_if_no_db {
    () => {
        if std::env::var("TEST_DATABASE_URL").is_err() {
            eprintln!("Skipping test: TEST_DATABASE_URL not set");
            return;
        }
    };
}
