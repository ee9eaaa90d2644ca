//! Transfer handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, DeletedResponse, MAX_PAGE_LIMIT};
use tally_core::models::{NewTransfer, SavedTransfer, Transfer};

#[derive(Debug, Deserialize)]
pub struct TransferQuery {
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    20
}

/// GET /api/users/:user/transfers - Most recent first
pub async fn list_transfers(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Query(params): Query<TransferQuery>,
) -> Result<Json<Vec<Transfer>>, AppError> {
    let limit = params.limit.clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(state.db().list_transfers(&user, limit)?))
}

/// GET /api/users/:user/transfers/:id
pub async fn get_transfer(
    State(state): State<Arc<AppState>>,
    Path((user, id)): Path<(String, i64)>,
) -> Result<Json<Transfer>, AppError> {
    state
        .db()
        .get_transfer(&user, id)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Transfer not found"))
}

/// POST /api/users/:user/transfers - Record a balanced multi-leg transfer
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<NewTransfer>,
) -> Result<Json<SavedTransfer>, AppError> {
    Ok(Json(state.db().save_transfer(&user, &body)?))
}

/// DELETE /api/users/:user/transfers/:id - Reverse a transfer on every date it touched
pub async fn delete_transfer(
    State(state): State<Arc<AppState>>,
    Path((user, id)): Path<(String, i64)>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.db().delete_transfer(&user, id)?;
    Ok(Json(DeletedResponse { deleted }))
}
