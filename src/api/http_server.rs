// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::{future::Future, net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::parse_receipt::parse_receipt_handler;
use crate::storage::{MockObjectStore, ObjectStore};
use crate::vision::donut::Device;
use crate::vision::ModelHolder;

#[derive(Clone)]
pub struct AppState {
    pub model_holder: ModelHolder,
    pub object_store: Arc<dyn ObjectStore>,
}

impl AppState {
    pub fn new(model_holder: ModelHolder, object_store: Arc<dyn ObjectStore>) -> Self {
        Self {
            model_holder,
            object_store,
        }
    }

    /// Empty model holder over an in-memory store
    pub fn new_for_test() -> Self {
        Self::new(ModelHolder::new(), Arc::new(MockObjectStore::new()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model_loaded: bool,
    pub device: Option<Device>,
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_handler))
        // Receipt extraction
        .route("/parse_receipt", post(parse_receipt_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
pub async fn start_server<F>(state: AppState, addr: SocketAddr, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("API server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server error")?;

    tracing::info!("API server stopped");
    Ok(())
}

pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let model = state.model_holder.get().await;
    let health = HealthResponse {
        status: if model.is_some() { "ok" } else { "unavailable" }.to_string(),
        model_loaded: model.is_some(),
        device: model.as_ref().map(|m| m.device()),
    };

    let status = if health.model_loaded {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(health))
}
