//! Read-only queries over the ledger

use std::collections::BTreeSet;

use chrono::{Duration, NaiveDate};
use rusqlite::params;

use super::entries::ENTRY_COLUMNS;
use super::Database;
use crate::error::Result;
use crate::models::{
    Entry, EntryKind, KnownCategories, KnownPaymentMethods, PaymentMethod, RecentContext,
    TRANSFER_CATEGORY,
};

/// Default cap for keyword search
pub const DEFAULT_SEARCH_LIMIT: i64 = 20;

/// Default cap for date-range search
pub const DEFAULT_RANGE_LIMIT: i64 = 50;

/// Most lines in a recent-activity context
pub const MAX_CONTEXT_LINES: usize = 30;

/// The date `days` before `today`, clamped to the calendar range
pub fn days_back(today: NaiveDate, days: i64) -> NaiveDate {
    today
        .checked_sub_signed(Duration::days(days.clamp(0, 365 * 1000)))
        .unwrap_or(NaiveDate::MIN)
}

fn effective_limit(limit: i64, default: i64) -> usize {
    if limit <= 0 {
        default as usize
    } else {
        limit as usize
    }
}

fn matches_keyword(entry: &Entry, needle: &str) -> bool {
    [&entry.description, &entry.category, &entry.merchant]
        .iter()
        .any(|field| field.to_lowercase().contains(needle))
}

/// One line of recent-activity context
fn context_line(entry: &Entry) -> String {
    let mut line = format!(
        "{} {} {:.2} {} ({})",
        entry.date, entry.kind, entry.amount, entry.category, entry.payment
    );
    if !entry.description.is_empty() {
        line.push_str(" - ");
        line.push_str(&entry.description);
    }
    line
}

impl Database {
    /// Case-insensitive substring match on description, category and merchant
    ///
    /// Newest date first; within a date, incomes precede expenses and each
    /// list keeps its own order.
    pub fn search_by_keyword(&self, user_id: &str, keyword: &str, limit: i64) -> Result<Vec<Entry>> {
        let limit = effective_limit(limit, DEFAULT_SEARCH_LIMIT);
        self.keyword_matches(user_id, keyword, Some(limit))
    }

    /// Every keyword match, in the same order as [`Database::search_by_keyword`]
    pub fn search_all_by_keyword(&self, user_id: &str, keyword: &str) -> Result<Vec<Entry>> {
        self.keyword_matches(user_id, keyword, None)
    }

    fn keyword_matches(&self, user_id: &str, keyword: &str, limit: Option<usize>) -> Result<Vec<Entry>> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE user_id = ? ORDER BY date DESC, sign DESC, id ASC",
            ENTRY_COLUMNS
        ))?;
        let mut rows = stmt.query(params![user_id])?;

        let mut hits = Vec::new();
        while let Some(row) = rows.next()? {
            let entry = Self::row_to_entry(row)?;
            if matches_keyword(&entry, &needle) {
                hits.push(entry);
                if limit.is_some_and(|limit| hits.len() >= limit) {
                    break;
                }
            }
        }
        Ok(hits)
    }

    /// Entries dated within `[start, end]`, newest first, at most `limit` of them
    pub fn search_by_date_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: i64,
    ) -> Result<Vec<Entry>> {
        let limit = effective_limit(limit, DEFAULT_RANGE_LIMIT);
        self.range_newest_first(user_id, start, end, Some(limit))
    }

    /// Every entry dated within `[start, end]`, newest first
    pub fn search_all_by_date_range(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Entry>> {
        self.range_newest_first(user_id, start, end, None)
    }

    fn range_newest_first(
        &self,
        user_id: &str,
        start: NaiveDate,
        end: NaiveDate,
        limit: Option<usize>,
    ) -> Result<Vec<Entry>> {
        let (start, end) = if start <= end { (start, end) } else { (end, start) };

        let mut sql = format!(
            "SELECT {} FROM entries WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date DESC, sign DESC, id ASC",
            ENTRY_COLUMNS
        );
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(
                params![user_id, start.to_string(), end.to_string()],
                Self::row_to_entry,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Every entry dated within `[start, end]` in ledger order (oldest first)
    pub fn list_entries(&self, user_id: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<Entry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE user_id = ? AND date >= ? AND date <= ? ORDER BY date ASC, sign DESC, id ASC",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(
                params![user_id, start.to_string(), end.to_string()],
                Self::row_to_entry,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Bank and credit card names seen in entries and transfer legs
    pub fn get_distinct_payment_methods(&self, user_id: &str) -> Result<KnownPaymentMethods> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT method, sub_identifier FROM entries
            WHERE user_id = ?1 AND sub_identifier IS NOT NULL AND sub_identifier != ''
            UNION
            SELECT l.method, l.sub_identifier FROM transfer_legs l
            JOIN transfers t ON t.id = l.transfer_id
            WHERE t.user_id = ?1 AND l.sub_identifier IS NOT NULL AND l.sub_identifier != ''
            "#,
        )?;
        let rows = stmt
            .query_map(params![user_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut banks = BTreeSet::new();
        let mut credit_cards = BTreeSet::new();
        for (method, name) in rows {
            match method.parse::<PaymentMethod>() {
                Ok(PaymentMethod::Bank) => {
                    banks.insert(name.trim().to_string());
                }
                Ok(PaymentMethod::CreditCard) => {
                    credit_cards.insert(name.trim().to_string());
                }
                _ => {}
            }
        }

        Ok(KnownPaymentMethods {
            banks: banks.into_iter().collect(),
            credit_cards: credit_cards.into_iter().collect(),
        })
    }

    /// Income and expense categories in use, transfers excluded
    pub fn get_distinct_categories(&self, user_id: &str) -> Result<KnownCategories> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT DISTINCT sign, category FROM entries WHERE user_id = ? AND category != '' AND category != ? ORDER BY category",
        )?;
        let rows = stmt
            .query_map(params![user_id, TRANSFER_CATEGORY], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut known = KnownCategories::default();
        for (sign, category) in rows {
            match EntryKind::from_sign(sign) {
                Some(EntryKind::Income) => known.income.push(category),
                Some(EntryKind::Expense) => known.expense.push(category),
                None => {}
            }
        }
        Ok(known)
    }

    /// Compact summary of the last `days` days for the intent classifier
    pub fn get_recent_context(&self, user_id: &str, days: i64) -> Result<RecentContext> {
        let days = if days <= 0 { 7 } else { days };
        let today = self.today();
        let entries = self.search_all_by_date_range(user_id, days_back(today, days), today)?;

        let mut context = RecentContext {
            days,
            ..Default::default()
        };
        for entry in &entries {
            if !entry.is_transfer() {
                match entry.kind {
                    EntryKind::Income => context.total_income += entry.amount,
                    EntryKind::Expense => context.total_expense += entry.amount,
                }
            }
            if context.lines.len() < MAX_CONTEXT_LINES {
                context.lines.push(context_line(entry));
            }
        }
        Ok(context)
    }
}
