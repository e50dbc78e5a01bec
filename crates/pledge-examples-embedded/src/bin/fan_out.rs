// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Embedded mode example - many waiters, one outcome, then disposal.

use std::time::Duration;

use pledge_examples_embedded::{embedded_client, init_tracing};
use pledge_sdk::SdkError;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let client = embedded_client(".data/fan_out.db").await?;
    let run = uuid::Uuid::new_v4().simple().to_string();

    let inventory = client.promise::<u32>(format!("inventory-count-{run}"));
    let mut waiters = Vec::new();
    for worker in 0..4 {
        let inventory = inventory.clone();
        waiters.push(tokio::spawn(async move {
            let count = inventory.get().await?;
            println!("  worker {worker} saw {count}");
            Ok::<_, SdkError>(count)
        }));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    println!("Publishing inventory count:");
    inventory.resolve(42).await?;
    for waiter in waiters {
        waiter.await??;
    }

    println!("Disposing a promise with a pending waiter:");
    let shipment = client.promise::<String>(format!("shipment-{run}"));
    let waiter = {
        let shipment = shipment.clone();
        tokio::spawn(async move { shipment.get().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;
    shipment.dispose().await?;
    match waiter.await? {
        Err(e) if e.is_disposed() => println!("  waiter was told: {e}"),
        other => println!("  unexpected: {other:?}"),
    }

    println!("The key is free again:");
    let fresh = shipment.resolve("tracking-123".to_string()).await?;
    println!("  {fresh}");

    Ok(())
}
