//! Ledger export
//!
//! The core produces plain rows and totals; rendering them as a spreadsheet
//! or PDF is up to the caller. CSV is written here since it needs no layout.

use std::io::Write;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::db::{days_back, Database};
use crate::error::{Error, Result};
use crate::models::{Entry, EntryKind, PaymentMethod};

/// Window used when an export names no day count
pub const DEFAULT_EXPORT_DAYS: i64 = 30;

/// Export format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Excel,
    Pdf,
    Csv,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excel => "excel",
            Self::Pdf => "pdf",
            Self::Csv => "csv",
        }
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "excel" | "xlsx" | "xls" | "spreadsheet" => Ok(Self::Excel),
            "pdf" => Ok(Self::Pdf),
            "csv" => Ok(Self::Csv),
            _ => Err(format!("Unknown export format: {}", s)),
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the user asked to export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub format: ExportFormat,
    /// Days back from today; zero means the configured default
    pub days: i64,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            format: ExportFormat::default(),
            days: DEFAULT_EXPORT_DAYS,
        }
    }
}

/// One exported line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub date: NaiveDate,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub category: String,
    /// Description, or the merchant when the description is blank
    pub description: String,
    pub amount: f64,
    pub payment_method: PaymentMethod,
    pub account: String,
}

impl From<&Entry> for ExportRow {
    fn from(entry: &Entry) -> Self {
        let description = if entry.description.trim().is_empty() {
            entry.merchant.clone()
        } else {
            entry.description.clone()
        };
        Self {
            date: entry.date,
            kind: entry.kind,
            category: entry.category.clone(),
            description,
            amount: entry.amount,
            payment_method: entry.payment.method,
            account: entry.payment.sub_identifier.clone().unwrap_or_default(),
        }
    }
}

/// Expense share of one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub amount: f64,
    pub percentage: f64,
}

/// Rows plus the totals shown under them
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportReport {
    pub request: ExportRequest,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: Vec<ExportRow>,
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    /// Largest first
    pub categories: Vec<CategoryShare>,
}

impl Database {
    /// Non-transfer entries of the last `days` days, oldest first
    pub fn export_rows(&self, user_id: &str, days: i64) -> Result<Vec<ExportRow>> {
        let days = if days <= 0 { DEFAULT_EXPORT_DAYS } else { days };
        let today = self.today();
        let entries = self.list_entries(user_id, days_back(today, days), today)?;
        Ok(entries
            .iter()
            .filter(|e| !e.is_transfer())
            .map(ExportRow::from)
            .collect())
    }

    /// Rows and totals for an export request
    pub fn export_report(&self, user_id: &str, request: ExportRequest) -> Result<ExportReport> {
        let days = if request.days <= 0 { DEFAULT_EXPORT_DAYS } else { request.days };
        let end = self.today();
        let start = days_back(end, days);
        let rows = self.export_rows(user_id, days)?;

        let mut total_income = 0.0;
        let mut total_expense = 0.0;
        let mut by_category: Vec<CategoryShare> = Vec::new();
        for row in &rows {
            match row.kind {
                EntryKind::Income => total_income += row.amount,
                EntryKind::Expense => {
                    total_expense += row.amount;
                    match by_category.iter_mut().find(|c| c.category == row.category) {
                        Some(share) => share.amount += row.amount,
                        None => by_category.push(CategoryShare {
                            category: row.category.clone(),
                            amount: row.amount,
                            percentage: 0.0,
                        }),
                    }
                }
            }
        }
        for share in &mut by_category {
            share.percentage = if total_expense > 0.0 {
                share.amount / total_expense * 100.0
            } else {
                0.0
            };
        }
        by_category.sort_by(|a, b| b.amount.total_cmp(&a.amount));

        debug!(user = %user_id, days, rows = rows.len(), "Built export report");
        Ok(ExportReport {
            request: ExportRequest { days, ..request },
            start,
            end,
            rows,
            total_income,
            total_expense,
            balance: total_income - total_expense,
            categories: by_category,
        })
    }
}

/// Write rows as CSV with a header line
pub fn write_csv<W: Write>(rows: &[ExportRow], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record([
        "date",
        "type",
        "category",
        "description",
        "amount",
        "payment_method",
        "account",
    ])?;
    for row in rows {
        writer.write_record([
            row.date.to_string(),
            row.kind.to_string(),
            row.category.clone(),
            row.description.clone(),
            format!("{:.2}", row.amount),
            row.payment_method.to_string(),
            row.account.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// CSV as a string
pub fn rows_to_csv(rows: &[ExportRow]) -> Result<String> {
    let mut buf = Vec::new();
    write_csv(rows, &mut buf)?;
    String::from_utf8(buf).map_err(|e| Error::InvalidData(format!("CSV is not UTF-8: {}", e)))
}
