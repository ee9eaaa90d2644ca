//! Budget handlers

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::{AppError, AppState, DeletedResponse};
use tally_core::models::{Budget, BudgetAlert, BudgetStatus};

/// GET /api/users/:user/budgets
pub async fn list_budgets(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<Vec<Budget>>, AppError> {
    Ok(Json(state.db().list_budgets(&user)?))
}

#[derive(Debug, Deserialize)]
pub struct SetBudgetRequest {
    pub category: String,
    pub amount: f64,
}

/// PUT /api/users/:user/budgets - Create or replace a monthly budget
pub async fn set_budget(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<SetBudgetRequest>,
) -> Result<Json<Budget>, AppError> {
    Ok(Json(state.db().set_budget(&user, &body.category, body.amount)?))
}

/// DELETE /api/users/:user/budgets/:category
pub async fn delete_budget(
    State(state): State<Arc<AppState>>,
    Path((user, category)): Path<(String, String)>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.db().delete_budget(&user, &category)?;
    Ok(Json(DeletedResponse { deleted }))
}

/// GET /api/users/:user/budgets/status - Every budget against this month's spend
pub async fn budget_status(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<Vec<BudgetStatus>>, AppError> {
    Ok(Json(state.db().get_budget_status(&user)?))
}

#[derive(Debug, Deserialize)]
pub struct BudgetAlertQuery {
    pub category: String,
    pub amount: f64,
}

/// GET /api/users/:user/budgets/alert?category=&amount= - Project a prospective expense
pub async fn budget_alert(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Query(params): Query<BudgetAlertQuery>,
) -> Result<Json<BudgetAlert>, AppError> {
    if !params.amount.is_finite() {
        return Err(AppError::bad_request("Amount must be a number"));
    }
    Ok(Json(
        state
            .db()
            .check_budget_alert(&user, &params.category, params.amount)?,
    ))
}
