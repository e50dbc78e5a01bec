// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! The embedded and HTTP backends must behave identically.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use pledge_core::ledger::{Ledger, SqliteLedger};
use pledge_core::runtime::PromiseRuntime;
use pledge_sdk::{PromiseClient, SdkConfig, SdkError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Approval {
    approved: bool,
    by: String,
}

async fn start_runtime() -> PromiseRuntime {
    let ledger: Arc<dyn Ledger> = Arc::new(SqliteLedger::in_memory().await.unwrap());
    PromiseRuntime::builder()
        .ledger(ledger)
        .bind_addr("127.0.0.1:0".parse().unwrap())
        .shutdown_grace(Duration::from_millis(200))
        .build()
        .unwrap()
        .start()
        .await
        .unwrap()
}

fn clients(runtime: &PromiseRuntime) -> Vec<(&'static str, PromiseClient)> {
    let embedded = PromiseClient::embedded(runtime.actors().clone(), runtime.broker());
    let http = PromiseClient::http(SdkConfig::new(format!("http://{}", runtime.local_addr())))
        .unwrap();
    vec![("embedded", embedded), ("http", http)]
}

/// Drive one client through every operation and record what it observed.
async fn scenario(prefix: &str, client: &PromiseClient) -> Vec<String> {
    let mut trace = Vec::new();

    // Await, then resolve from elsewhere.
    let approval = client.promise::<Approval>(format!("{}-approval", prefix));
    let waiter = {
        let approval = approval.clone();
        tokio::spawn(async move { approval.get().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    let value = Approval {
        approved: true,
        by: "ops".to_string(),
    };
    let committed = approval.resolve(value.clone()).await.unwrap();
    trace.push(format!("resolve -> {:?}", committed));
    let awaited = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("get should finish")
        .unwrap()
        .unwrap();
    trace.push(format!("get -> {:?}", awaited));

    // First completer wins.
    let second = approval
        .resolve(Approval {
            approved: false,
            by: "late".to_string(),
        })
        .await
        .unwrap();
    trace.push(format!("second resolve -> {:?}", second));
    let rejected_late = approval.reject("too late").await.unwrap();
    trace.push(format!("reject after resolve -> {:?}", rejected_late));

    // Rejection surfaces as SdkError::Rejected.
    let failing = client.promise::<u32>(format!("{}-failing", prefix));
    match failing.reject("boom").await {
        Err(SdkError::Rejected(m)) => trace.push(format!("reject -> Rejected({})", m)),
        other => trace.push(format!("reject -> unexpected {:?}", other.map_err(|e| e.to_string()))),
    }
    match failing.peek().await {
        Err(SdkError::Rejected(m)) => trace.push(format!("peek -> Rejected({})", m)),
        other => trace.push(format!("peek -> unexpected {:?}", other.map_err(|e| e.to_string()))),
    }

    // Peek on an untouched key.
    let untouched = client.promise::<String>(format!("{}-untouched", prefix));
    trace.push(format!("peek untouched -> {:?}", untouched.peek().await.unwrap()));

    // Dispose while someone waits.
    let doomed = client.promise::<String>(format!("{}-doomed", prefix));
    let waiter = {
        let doomed = doomed.clone();
        tokio::spawn(async move { doomed.get().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    doomed.dispose().await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("get should finish")
        .unwrap()
        .unwrap_err();
    trace.push(format!("get after dispose -> code {:?}", err.code()));
    trace.push(format!("peek after dispose -> {:?}", doomed.peek().await.unwrap()));

    // Validation.
    let err = client.promise::<String>("").peek().await.unwrap_err();
    trace.push(format!("empty id -> code {:?}", err.code()));
    let quiet = client.promise::<u32>(format!("{}-quiet", prefix));
    match quiet.reject("").await {
        Err(SdkError::Rejected(m)) => trace.push(format!("empty message -> Rejected({:?})", m)),
        other => trace.push(format!("empty message -> unexpected {:?}", other.map_err(|e| e.to_string()))),
    }
    match quiet.peek().await {
        Err(SdkError::Rejected(m)) => trace.push(format!("peek empty message -> Rejected({:?})", m)),
        other => trace.push(format!("peek empty message -> unexpected {:?}", other.map_err(|e| e.to_string()))),
    }

    trace
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_backends_observe_identical_behavior() {
    let runtime = start_runtime().await;

    let mut traces = Vec::new();
    for (name, client) in clients(&runtime) {
        traces.push((name, scenario(name, &client).await));
    }

    let (_, embedded) = &traces[0];
    let (_, http) = &traces[1];
    assert_eq!(embedded, http);
    assert!(embedded.iter().any(|line| line == "get after dispose -> code Some(\"PROMISE_DISPOSED\")"));
    assert!(embedded.iter().any(|line| line == "reject -> Rejected(boom)"));
    assert!(embedded.iter().any(|line| line == "empty id -> code Some(\"VALIDATION_ERROR\")"));
    assert!(embedded.iter().any(|line| line == "empty message -> Rejected(\"\")"));
    assert!(embedded.iter().any(|line| line == "peek empty message -> Rejected(\"\")"));

    runtime.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_http_and_embedded_share_state() {
    let runtime = start_runtime().await;
    let all = clients(&runtime);
    let (_, embedded) = &all[0];
    let (_, http) = &all[1];

    let over_http = http.promise::<String>("shared");
    let waiter = {
        let over_http = over_http.clone();
        tokio::spawn(async move { over_http.get().await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    embedded
        .promise::<String>("shared")
        .resolve("from-embedded".to_string())
        .await
        .unwrap();

    let value = tokio::time::timeout(Duration::from_secs(2), waiter)
        .await
        .expect("get should finish")
        .unwrap()
        .unwrap();
    assert_eq!(value, "from-embedded");

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_http_unreachable_server_is_transport_error() {
    // Port 9 (discard) on localhost is expected to refuse connections.
    let client = PromiseClient::http(
        SdkConfig::new("http://127.0.0.1:9").with_request_timeout_ms(500),
    )
    .unwrap();
    let err = client.promise::<u32>("x").peek().await.unwrap_err();
    assert!(err.is_retryable(), "expected transport error, got {err}");
}
