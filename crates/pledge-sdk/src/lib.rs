// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Pledge SDK - typed client for durable promises.
//!
//! The same [`PromiseClient`] API works against in-process actors (`embedded`
//! feature) or a remote pledge-core server (`http` feature).
//!
//! # Quick Start
//!
//! ```ignore
//! use pledge_sdk::{PromiseClient, SdkConfig};
//!
//! #[tokio::main]
//! async fn main() -> pledge_sdk::Result<()> {
//!     let client = PromiseClient::http(SdkConfig::localhost())?;
//!     let approval = client.promise::<bool>("approval-42");
//!
//!     // In one process:
//!     let approved = approval.get().await?;
//!
//!     // In another:
//!     approval.resolve(true).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Outcomes
//!
//! A promise settles exactly once. `resolve` and `reject` return whatever was
//! committed, so a loser of a race sees the winner's outcome. A rejected
//! promise surfaces as [`SdkError::Rejected`]; a promise disposed while `get`
//! is waiting surfaces as a [`SdkError::Server`] with code `PROMISE_DISPOSED`.

#![deny(missing_docs)]

pub mod backend;
mod client;
pub mod config;
mod error;

pub use backend::PromiseBackend;
pub use client::{DurablePromise, PromiseClient};
pub use config::SdkConfig;
pub use error::{Result, SdkError};

pub use pledge_core::Outcome;
