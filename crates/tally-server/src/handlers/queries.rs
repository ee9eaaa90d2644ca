//! Search, known-values and export handlers

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, Response, StatusCode},
    Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{AppError, AppState, MAX_PAGE_LIMIT};
use tally_core::export::rows_to_csv;
use tally_core::models::{Entry, KnownCategories, KnownPaymentMethods};

#[derive(Debug, Deserialize)]
pub struct KeywordQuery {
    pub keyword: String,
    pub limit: Option<i64>,
}

/// GET /api/users/:user/search?keyword=&limit= - Case-insensitive keyword search
pub async fn search_keyword(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Query(params): Query<KeywordQuery>,
) -> Result<Json<Vec<Entry>>, AppError> {
    let limit = params
        .limit
        .unwrap_or(state.dispatcher.settings().search_limit)
        .clamp(1, MAX_PAGE_LIMIT);
    Ok(Json(
        state.db().search_by_keyword(&user, &params.keyword, limit)?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Start date (YYYY-MM-DD)
    pub from: String,
    /// End date (YYYY-MM-DD)
    pub to: String,
    pub limit: Option<i64>,
}

/// GET /api/users/:user/search/range?from=&to=&limit= - Entries within a date range
pub async fn search_range(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Query(params): Query<RangeQuery>,
) -> Result<Json<Vec<Entry>>, AppError> {
    let from = NaiveDate::parse_from_str(&params.from, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("Invalid 'from' date format (use YYYY-MM-DD)"))?;
    let to = NaiveDate::parse_from_str(&params.to, "%Y-%m-%d")
        .map_err(|_| AppError::bad_request("Invalid 'to' date format (use YYYY-MM-DD)"))?;
    let limit = params
        .limit
        .unwrap_or(state.dispatcher.settings().range_limit)
        .clamp(1, MAX_PAGE_LIMIT);

    Ok(Json(
        state.db().search_by_date_range(&user, from, to, limit)?,
    ))
}

#[derive(Serialize)]
pub struct KnownResponse {
    pub payment_methods: KnownPaymentMethods,
    pub categories: KnownCategories,
}

/// GET /api/users/:user/known - Banks, cards and categories in use
pub async fn get_known(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
) -> Result<Json<KnownResponse>, AppError> {
    let db = state.db();
    Ok(Json(KnownResponse {
        payment_methods: db.get_distinct_payment_methods(&user)?,
        categories: db.get_distinct_categories(&user)?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub days: Option<i64>,
}

/// GET /api/users/:user/export?days= - Recent entries as CSV
pub async fn export_csv(
    State(state): State<Arc<AppState>>,
    Path(user): Path<String>,
    Query(params): Query<ExportQuery>,
) -> Result<Response<Body>, AppError> {
    let days = params
        .days
        .filter(|d| *d > 0)
        .unwrap_or(state.dispatcher.settings().export_days);
    let rows = state.db().export_rows(&user, days)?;
    let csv = rows_to_csv(&rows)?;

    info!(user = %user, days, rows = rows.len(), "Exported entries");

    let filename = format!("tally-{}-{}d.csv", state.db().today(), days);
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/csv; charset=utf-8")
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(csv))
        .map_err(|e| AppError::from(anyhow::Error::from(e)))
}
