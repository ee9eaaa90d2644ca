//! Conversational handlers: free-text messages and raw intents

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use tracing::info;

use crate::{AppError, AppState};
use tally_core::DispatchResult;

#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// POST /api/users/:user/messages - Run a message through the classifier and dispatch it
pub async fn post_message(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<MessageRequest>,
) -> Result<Json<DispatchResult>, AppError> {
    if body.text.trim().is_empty() {
        return Err(AppError::bad_request("Message text must not be empty"));
    }

    let result = state.dispatcher.handle_message(&user, &body.text).await?;
    info!(user = %user, action = %result.action, "Handled message");

    Ok(Json(result))
}

/// POST /api/users/:user/intents - Dispatch intent JSON without the classifier
pub async fn post_intent(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<Json<DispatchResult>, AppError> {
    let result = state.dispatcher.dispatch_json(&user, &body.to_string())?;
    info!(user = %user, action = %result.action, "Dispatched intent");

    Ok(Json(result))
}
