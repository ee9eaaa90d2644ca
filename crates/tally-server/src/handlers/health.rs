//! Health check handler

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use tally_core::IntentClassifier;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    /// Classifier backend name, if one is configured
    pub classifier: Option<String>,
}

/// GET /api/health - Liveness check, no authentication
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        classifier: state.dispatcher.classifier().map(|c| c.name().to_string()),
    })
}
