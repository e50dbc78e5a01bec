// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! HTTP ingress server for pledge-core.
//!
//! Exposes the promise operations over JSON:
//! - `POST /promise/{id}/resolve`, `POST /promise/{id}/reject`
//! - `GET /promise/{id}/peek`, `POST /promise/{id}/await`
//! - `POST /promise/{id}/dispose`
//! - `GET /health`

pub mod api_error;
pub mod http_server;

pub use api_error::{ApiError, ErrorResponse};
pub use http_server::{create_router, run_http_server};
