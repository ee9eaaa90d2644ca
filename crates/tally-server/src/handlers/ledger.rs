//! Balance, day record and entry handlers
//!
//! Entry mutations by id only reach today's record.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState, DeletedResponse, SuccessResponse};
use tally_core::models::{
    BalanceSummary, BudgetAlert, DayRecord, EntryKind, NetWorth, NewEntry, PaymentAccount,
    PaymentBalance,
};

/// GET /api/users/:user/balance - Income, expense and balance, transfers excluded
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<BalanceSummary>, AppError> {
    Ok(Json(state.db().get_balance_summary(&user)?))
}

/// GET /api/users/:user/balance/methods - Net position per payment method
pub async fn get_balance_by_method(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<Vec<PaymentBalance>>, AppError> {
    Ok(Json(state.db().get_balance_by_payment_method(&user)?))
}

/// GET /api/users/:user/net-worth
pub async fn get_net_worth(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<NetWorth>, AppError> {
    Ok(Json(state.db().get_net_worth(&user)?))
}

/// GET /api/users/:user/days/:date - One day record with both lists
pub async fn get_day(
    State(state): State<Arc<AppState>>,
    Path((user, date)): Path<(String, String)>,
) -> Result<Json<DayRecord>, AppError> {
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("Invalid date format (use YYYY-MM-DD)"))?;

    state
        .db()
        .get_day_record(&user, date)?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No record for that day"))
}

/// Body for creating an entry
#[derive(Debug, Deserialize)]
pub struct CreateEntryRequest {
    #[serde(flatten)]
    pub entry: NewEntry,
    /// Defaults to today
    pub date: Option<NaiveDate>,
}

#[derive(Serialize)]
pub struct CreateEntryResponse {
    pub id: i64,
    /// Present when the expense pushes a budget into the warning or over band
    pub alert: Option<BudgetAlert>,
}

/// POST /api/users/:user/entries - Append an entry
///
/// Expenses are checked against the category budget before saving; the
/// check never blocks the save.
pub async fn create_entry(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Json(body): Json<CreateEntryRequest>,
) -> Result<Json<CreateEntryResponse>, AppError> {
    let db = state.db();
    let entry = body.entry;

    let alert = if entry.kind == EntryKind::Expense && !entry.category.trim().is_empty() {
        match db.check_budget_alert(&user, &entry.category, entry.amount) {
            Ok(alert) if alert.should_alert => Some(alert),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(user = %user, error = %e, "Budget check failed");
                None
            }
        }
    } else {
        None
    };

    let id = match body.date {
        Some(date) => db.save_entry(&user, date, &entry)?,
        None => db.save_entry_today(&user, &entry)?,
    };

    Ok(Json(CreateEntryResponse { id, alert }))
}

/// DELETE /api/users/:user/entries/:id - Remove one of today's entries
///
/// A missing id is not an error; the response says whether anything was removed.
pub async fn delete_entry(
    State(state): State<Arc<AppState>>,
    Path((user, id)): Path<(String, i64)>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.db().delete_entry(&user, id)?;
    Ok(Json(DeletedResponse { deleted }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateAmountRequest {
    pub amount: f64,
}

/// PUT /api/users/:user/entries/:id/amount
pub async fn update_entry_amount(
    State(state): State<Arc<AppState>>,
    Path((user, id)): Path<(String, i64)>,
    Json(body): Json<UpdateAmountRequest>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db().update_entry_amount(&user, id, body.amount)? {
        return Err(AppError::not_found("Entry not found in today's record"));
    }
    Ok(Json(SuccessResponse { success: true }))
}

/// PUT /api/users/:user/entries/:id/payment
pub async fn update_entry_payment(
    State(state): State<Arc<AppState>>,
    Path((user, id)): Path<(String, i64)>,
    Json(payment): Json<PaymentAccount>,
) -> Result<Json<SuccessResponse>, AppError> {
    if !state.db().update_entry_payment_method(&user, id, &payment)? {
        return Err(AppError::not_found("Entry not found in today's record"));
    }
    Ok(Json(SuccessResponse { success: true }))
}
