//! Monthly category budgets

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{parse_datetime, Database, DbConn};
use crate::error::{Error, Result};
use crate::models::{
    normalize_category, spending_key, AlertLevel, Budget, BudgetAlert, BudgetStatus,
    TRANSFER_CATEGORY,
};

/// Projected spend at or above this share of the budget raises a warning
pub const WARNING_PERCENT: f64 = 80.0;

/// First day of the month containing `date`, and first day of the next month
pub fn month_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start = date.with_day(1).unwrap_or(date);
    let next = if start.month() == 12 {
        NaiveDate::from_ymd_opt(start.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(start.year(), start.month() + 1, 1)
    };
    (start, next.unwrap_or(start))
}

/// Band for a projected spend
pub fn alert_level(projected: f64, budget: f64) -> AlertLevel {
    if budget <= 0.0 {
        return AlertLevel::Silent;
    }
    let percentage = projected / budget * 100.0;
    if percentage > 100.0 {
        AlertLevel::OverBudget
    } else if percentage >= WARNING_PERCENT {
        AlertLevel::Warning
    } else {
        AlertLevel::Silent
    }
}

/// Expense totals per spending key over `[start, end)`, transfers excluded
///
/// Every budget view reads spend through this one function.
fn spending_in_window(
    conn: &DbConn,
    user_id: &str,
    (start, end): (NaiveDate, NaiveDate),
) -> Result<BTreeMap<String, f64>> {
    let mut stmt = conn.prepare(
        r#"
        SELECT category, SUM(amount) FROM entries
        WHERE user_id = ? AND sign = -1 AND category != ? AND date >= ? AND date < ?
        GROUP BY category
        "#,
    )?;
    let rows = stmt
        .query_map(
            params![
                user_id,
                TRANSFER_CATEGORY,
                start.to_string(),
                end.to_string()
            ],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)),
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut spending = BTreeMap::new();
    for (category, amount) in rows {
        *spending.entry(spending_key(&category)).or_insert(0.0) += amount;
    }
    Ok(spending)
}

fn spent_for(spending: &BTreeMap<String, f64>, category: &str) -> f64 {
    spending.get(&spending_key(category)).copied().unwrap_or(0.0)
}

impl Database {
    /// Create or replace the monthly budget for a category
    pub fn set_budget(&self, user_id: &str, category: &str, monthly_amount: f64) -> Result<Budget> {
        let category = normalize_category(category);
        let category = category.as_str();
        if category.is_empty() {
            return Err(Error::Rejected("budget category must not be empty".into()));
        }
        if category == TRANSFER_CATEGORY {
            return Err(Error::Rejected("transfers cannot carry a budget".into()));
        }
        if !monthly_amount.is_finite() || monthly_amount <= 0.0 {
            return Err(Error::Rejected(format!(
                "budget amount must be positive, got {}",
                monthly_amount
            )));
        }

        {
            let conn = self.conn()?;
            conn.execute(
                r#"
                INSERT INTO budgets (user_id, category, amount) VALUES (?, ?, ?)
                ON CONFLICT(user_id, category) DO UPDATE SET
                    amount = excluded.amount,
                    updated_at = CURRENT_TIMESTAMP
                "#,
                params![user_id, category, monthly_amount],
            )?;
        }
        info!(user = %user_id, category, amount = monthly_amount, "Set budget");

        self.get_budget(user_id, category)?
            .ok_or_else(|| Error::NotFound(format!("budget {}", category)))
    }

    pub fn get_budget(&self, user_id: &str, category: &str) -> Result<Option<Budget>> {
        let conn = self.conn()?;
        let budget = conn
            .query_row(
                "SELECT id, category, amount, created_at, updated_at FROM budgets WHERE user_id = ? AND category = ?",
                params![user_id, normalize_category(category)],
                Self::row_to_budget,
            )
            .optional()?;
        Ok(budget)
    }

    pub fn list_budgets(&self, user_id: &str) -> Result<Vec<Budget>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, category, amount, created_at, updated_at FROM budgets WHERE user_id = ? ORDER BY category",
        )?;
        let budgets = stmt
            .query_map(params![user_id], Self::row_to_budget)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(budgets)
    }

    /// Remove a budget; a missing budget is a no-op returning `false`
    pub fn delete_budget(&self, user_id: &str, category: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM budgets WHERE user_id = ? AND category = ?",
            params![user_id, normalize_category(category)],
        )?;
        if removed > 0 {
            info!(user = %user_id, category, "Deleted budget");
        }
        Ok(removed > 0)
    }

    /// This month's spending per category, transfers excluded
    ///
    /// Keys are lowercased; blank categories are filed under "other".
    pub fn get_monthly_spending_by_category(&self, user_id: &str) -> Result<BTreeMap<String, f64>> {
        let conn = self.conn()?;
        spending_in_window(&conn, user_id, month_bounds(self.today()))
    }

    /// Every budget joined with this month's spend
    pub fn get_budget_status(&self, user_id: &str) -> Result<Vec<BudgetStatus>> {
        let budgets = self.list_budgets(user_id)?;
        let spending = self.get_monthly_spending_by_category(user_id)?;

        let mut statuses = Vec::with_capacity(budgets.len());
        for budget in budgets {
            let spent = spent_for(&spending, &budget.category);
            let percentage = if budget.amount > 0.0 {
                spent / budget.amount * 100.0
            } else {
                0.0
            };
            statuses.push(BudgetStatus {
                remaining: budget.amount - spent,
                is_over_budget: spent > budget.amount,
                category: budget.category,
                budget: budget.amount,
                spent,
                percentage,
            });
        }
        Ok(statuses)
    }

    /// Project `incoming_amount` on top of this month's spend for `category`
    ///
    /// Advisory only: call it before saving the expense and never let it block
    /// the save. No budget for the category means no alert.
    pub fn check_budget_alert(
        &self,
        user_id: &str,
        category: &str,
        incoming_amount: f64,
    ) -> Result<BudgetAlert> {
        let category = category.trim();
        let Some(budget) = self.get_budget(user_id, category)? else {
            return Ok(BudgetAlert {
                should_alert: false,
                level: AlertLevel::Silent,
                category: category.to_string(),
                budget: 0.0,
                spent: 0.0,
                projected: incoming_amount,
                percentage: 0.0,
                message: String::new(),
            });
        };

        let spending = self.get_monthly_spending_by_category(user_id)?;
        let spent = spent_for(&spending, &budget.category);
        let projected = spent + incoming_amount.max(0.0);
        let percentage = if budget.amount > 0.0 {
            projected / budget.amount * 100.0
        } else {
            0.0
        };
        let level = alert_level(projected, budget.amount);

        let message = match level {
            AlertLevel::OverBudget => format!(
                "Over budget for {}: {:.2} of {:.2} ({:.0}%)",
                budget.category, projected, budget.amount, percentage
            ),
            AlertLevel::Warning => format!(
                "Nearing budget for {}: {:.2} of {:.2} ({:.0}%)",
                budget.category, projected, budget.amount, percentage
            ),
            AlertLevel::Silent => String::new(),
        };

        debug!(user = %user_id, category, projected, budget = budget.amount, level = %level, "Checked budget");
        Ok(BudgetAlert {
            should_alert: level != AlertLevel::Silent,
            level,
            category: budget.category,
            budget: budget.amount,
            spent,
            projected,
            percentage,
            message,
        })
    }

    fn row_to_budget(row: &rusqlite::Row) -> rusqlite::Result<Budget> {
        let created_at: String = row.get(3)?;
        let updated_at: String = row.get(4)?;
        Ok(Budget {
            id: row.get(0)?,
            category: row.get(1)?,
            amount: row.get(2)?,
            created_at: parse_datetime(&created_at),
            updated_at: parse_datetime(&updated_at),
        })
    }
}
