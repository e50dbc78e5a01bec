// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Axum router and server loop.

use axum::{
    Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::Json,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::error::CoreError;
use crate::ingress::IngressAdapter;
use crate::promise::Outcome;

use super::api_error::ApiError;

type ApiResult<T> = std::result::Result<T, ApiError>;

/// Body of `POST /promise/{id}/reject`.
#[derive(Debug, Deserialize)]
pub struct RejectRequest {
    /// Rejection message.
    #[serde(alias = "errorMessage")]
    pub message: Option<String>,
}

/// Body of `GET /health`.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Whether the ledger answered.
    pub healthy: bool,
    /// Server version.
    pub version: String,
}

/// Build the ingress router.
pub fn create_router(ingress: IngressAdapter) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/promise/{id}/resolve", post(resolve))
        .route("/promise/{id}/reject", post(reject))
        .route("/promise/{id}/peek", get(peek))
        .route("/promise/{id}/await", post(await_promise))
        .route("/promise/{id}/dispose", post(dispose))
        .with_state(ingress)
}

/// Serve `ingress` on `listener` until `shutdown_rx` flips to `true`.
pub async fn run_http_server(
    listener: TcpListener,
    ingress: IngressAdapter,
    mut shutdown_rx: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "HTTP ingress listening");

    axum::serve(listener, create_router(ingress))
        .with_graceful_shutdown(async move {
            while shutdown_rx.changed().await.is_ok() {
                if *shutdown_rx.borrow() {
                    break;
                }
            }
            info!("HTTP ingress received shutdown signal");
        })
        .await?;

    info!("HTTP ingress stopped");
    Ok(())
}

async fn health(State(ingress): State<IngressAdapter>) -> Json<HealthResponse> {
    let healthy = ingress.health_check().await.unwrap_or(false);
    Json(HealthResponse {
        healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn resolve(
    State(ingress): State<IngressAdapter>,
    Path(id): Path<String>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> ApiResult<Json<Outcome>> {
    let Json(mut body) = body?;
    // `null` is a legal value; only an absent field is rejected.
    let value = body
        .as_object_mut()
        .and_then(|fields| fields.remove("value"))
        .ok_or_else(|| CoreError::validation("value", "field is required"))?;

    Ok(Json(ingress.resolve_external(&id, value).await?))
}

async fn reject(
    State(ingress): State<IngressAdapter>,
    Path(id): Path<String>,
    body: std::result::Result<Json<RejectRequest>, JsonRejection>,
) -> ApiResult<Json<Outcome>> {
    let Json(body) = body?;
    let message = body
        .message
        .ok_or_else(|| CoreError::validation("message", "field is required"))?;

    Ok(Json(ingress.reject_external(&id, &message).await?))
}

async fn peek(
    State(ingress): State<IngressAdapter>,
    Path(id): Path<String>,
) -> ApiResult<Json<Option<Outcome>>> {
    Ok(Json(ingress.peek_external(&id).await?))
}

async fn await_promise(
    State(ingress): State<IngressAdapter>,
    Path(id): Path<String>,
) -> ApiResult<Json<Outcome>> {
    Ok(Json(ingress.await_external(&id).await?))
}

async fn dispose(
    State(ingress): State<IngressAdapter>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    ingress.dispose_external(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
