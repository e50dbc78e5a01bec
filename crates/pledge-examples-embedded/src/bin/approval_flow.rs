// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded mode example - one workflow waits for a human approval.
//!
//! Run it twice: the second run finds the approval already settled in
//! `.data/approval.db` and returns at once.

use std::time::Duration;

use pledge_examples_embedded::{embedded_client, init_tracing};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Approval {
    approved: bool,
    reviewer: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let client = embedded_client(".data/approval.db").await?;
    let approval = client.promise::<Approval>("expense-report-17");

    if let Some(existing) = approval.peek().await? {
        println!("Already decided on a previous run: {existing:?}");
        return Ok(());
    }

    println!("Waiting for approval of {}...", approval.id());

    let reviewer = {
        let approval = approval.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            approval
                .resolve(Approval {
                    approved: true,
                    reviewer: "alice".into(),
                })
                .await
        })
    };

    let decision = approval.get().await?;
    println!("  Decision: {decision:?}");
    reviewer.await??;

    println!("A late reviewer tries to overrule:");
    let committed = approval
        .resolve(Approval {
            approved: false,
            reviewer: "bob".into(),
        })
        .await?;
    println!("  Committed decision is unchanged: {committed:?}");

    Ok(())
}
