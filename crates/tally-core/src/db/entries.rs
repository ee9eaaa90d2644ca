//! Day record and entry operations

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::{debug, info};

use super::{parse_date, parse_datetime, Database, DbConn};
use crate::error::{Error, Result};
use crate::models::{
    normalize_category, DayRecord, DayTotals, Entry, EntryKind, NewEntry, PaymentAccount,
    PaymentMethod,
};

/// Column list matching `row_to_entry`
pub(crate) const ENTRY_COLUMNS: &str = "id, date, sign, amount, category, description, merchant, method, sub_identifier, transfer_id, created_at";

/// Reject amounts that would corrupt the ledger
pub(crate) fn validate_amount(amount: f64) -> Result<()> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(Error::Rejected(format!(
            "amount must be a positive number, got {}",
            amount
        )));
    }
    Ok(())
}

/// Create the day record if this is the first entry of the day
pub(crate) fn ensure_day(conn: &DbConn, user_id: &str, date: NaiveDate) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO day_records (user_id, date) VALUES (?, ?)",
        params![user_id, date.to_string()],
    )?;
    Ok(())
}

/// Append an entry and bump the day's cached total by its amount
pub(crate) fn append_entry(
    conn: &DbConn,
    user_id: &str,
    date: NaiveDate,
    entry: &NewEntry,
    transfer_id: Option<i64>,
) -> Result<i64> {
    validate_amount(entry.amount)?;
    ensure_day(conn, user_id, date)?;

    conn.execute(
        r#"
        INSERT INTO entries (user_id, date, sign, amount, category, description, merchant, method, sub_identifier, transfer_id)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            user_id,
            date.to_string(),
            entry.kind.sign(),
            entry.amount,
            normalize_category(&entry.category),
            entry.description,
            entry.merchant,
            entry.payment.method.as_str(),
            entry.payment.sub_identifier,
            transfer_id,
        ],
    )?;
    let id = conn.last_insert_rowid();

    let total_column = match entry.kind {
        EntryKind::Income => "total_income",
        EntryKind::Expense => "total_expense",
    };
    conn.execute(
        &format!(
            "UPDATE day_records SET {col} = {col} + ?, updated_at = CURRENT_TIMESTAMP WHERE user_id = ? AND date = ?",
            col = total_column
        ),
        params![entry.amount, user_id, date.to_string()],
    )?;

    Ok(id)
}

/// Re-sum both lists of a day record and overwrite its cached totals
pub(crate) fn recalculate_day(conn: &DbConn, user_id: &str, date: NaiveDate) -> Result<DayTotals> {
    let date_str = date.to_string();
    conn.execute(
        r#"
        UPDATE day_records SET
            total_income = COALESCE((SELECT SUM(amount) FROM entries WHERE user_id = ?1 AND date = ?2 AND sign = 1), 0),
            total_expense = COALESCE((SELECT SUM(amount) FROM entries WHERE user_id = ?1 AND date = ?2 AND sign = -1), 0),
            updated_at = CURRENT_TIMESTAMP
        WHERE user_id = ?1 AND date = ?2
        "#,
        params![user_id, date_str],
    )?;

    let totals = conn
        .query_row(
            "SELECT total_income, total_expense FROM day_records WHERE user_id = ? AND date = ?",
            params![user_id, date_str],
            |row| {
                Ok(DayTotals {
                    total_income: row.get(0)?,
                    total_expense: row.get(1)?,
                })
            },
        )
        .optional()?
        .unwrap_or_default();

    debug!(user = %user_id, %date, income = totals.total_income, expense = totals.total_expense, "Recalculated day totals");
    Ok(totals)
}

/// Find an entry in one day's lists, income list first
pub(crate) fn find_in_day(
    conn: &DbConn,
    user_id: &str,
    date: NaiveDate,
    entry_id: i64,
) -> Result<Option<Entry>> {
    let sql = format!(
        "SELECT {} FROM entries WHERE user_id = ? AND date = ? AND sign = ? AND id = ?",
        ENTRY_COLUMNS
    );
    for kind in [EntryKind::Income, EntryKind::Expense] {
        let entry = conn
            .query_row(
                &sql,
                params![user_id, date.to_string(), kind.sign(), entry_id],
                Database::row_to_entry,
            )
            .optional()?;
        if entry.is_some() {
            return Ok(entry);
        }
    }
    Ok(None)
}

/// Entries generated by a transfer may only change through the transfer
fn guard_transfer_entry(entry: &Entry) -> Result<()> {
    match entry.transfer_id {
        Some(transfer_id) => Err(Error::Rejected(format!(
            "entry {} is part of transfer {}; delete the transfer instead",
            entry.id, transfer_id
        ))),
        None => Ok(()),
    }
}

impl Database {
    pub(crate) fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
        let date_str: String = row.get(1)?;
        let sign: i64 = row.get(2)?;
        let method_str: String = row.get(7)?;
        let sub_identifier: Option<String> = row.get(8)?;
        let created_at_str: String = row.get(10)?;
        Ok(Entry {
            id: row.get(0)?,
            date: parse_date(&date_str),
            kind: EntryKind::from_sign(sign).unwrap_or(EntryKind::Expense),
            amount: row.get(3)?,
            category: row.get(4)?,
            description: row.get(5)?,
            merchant: row.get(6)?,
            payment: PaymentAccount::new(
                method_str.parse().unwrap_or(PaymentMethod::Cash),
                sub_identifier.as_deref(),
            ),
            transfer_id: row.get(9)?,
            created_at: parse_datetime(&created_at_str),
        })
    }

    /// Append an entry to the day record for `(user_id, date)`, creating it if absent
    ///
    /// Duplicate content is allowed; every call appends a new entry.
    pub fn save_entry(&self, user_id: &str, date: NaiveDate, entry: &NewEntry) -> Result<i64> {
        let id = self.write_tx(|conn| append_entry(conn, user_id, date, entry, None))?;
        info!(
            user = %user_id,
            %date,
            entry_id = id,
            kind = %entry.kind,
            amount = entry.amount,
            category = %entry.category,
            "Saved entry"
        );
        Ok(id)
    }

    /// Append an entry to today's day record
    pub fn save_entry_today(&self, user_id: &str, entry: &NewEntry) -> Result<i64> {
        self.save_entry(user_id, self.today(), entry)
    }

    /// Append a batch of entries to one day record in a single transaction
    ///
    /// Either every entry is saved or none is. Ids come back in input order.
    pub fn save_entries(
        &self,
        user_id: &str,
        date: NaiveDate,
        entries: &[NewEntry],
    ) -> Result<Vec<i64>> {
        let ids = self.write_tx(|conn| {
            entries
                .iter()
                .map(|entry| append_entry(conn, user_id, date, entry, None))
                .collect::<Result<Vec<_>>>()
        })?;
        info!(user = %user_id, %date, count = ids.len(), "Saved entries");
        Ok(ids)
    }

    /// Remove an entry from today's day record
    ///
    /// Only today's record is searched. A missing id is a no-op and
    /// returns `false`.
    pub fn delete_entry(&self, user_id: &str, entry_id: i64) -> Result<bool> {
        let today = self.today();
        let removed = self.write_tx(|conn| {
            let Some(entry) = find_in_day(conn, user_id, today, entry_id)? else {
                return Ok(false);
            };
            guard_transfer_entry(&entry)?;

            conn.execute(
                "DELETE FROM entries WHERE user_id = ? AND date = ? AND id = ?",
                params![user_id, today.to_string(), entry_id],
            )?;
            recalculate_day(conn, user_id, today)?;
            Ok(true)
        })?;

        if removed {
            info!(user = %user_id, entry_id, "Deleted entry");
        } else {
            debug!(user = %user_id, entry_id, "Delete target not in today's record");
        }
        Ok(removed)
    }

    /// Change the amount of one of today's entries
    ///
    /// Returns `false` when today's record has no such entry.
    pub fn update_entry_amount(&self, user_id: &str, entry_id: i64, new_amount: f64) -> Result<bool> {
        validate_amount(new_amount)?;
        let today = self.today();
        let updated = self.write_tx(|conn| {
            let Some(entry) = find_in_day(conn, user_id, today, entry_id)? else {
                return Ok(false);
            };
            guard_transfer_entry(&entry)?;

            conn.execute(
                "UPDATE entries SET amount = ? WHERE id = ?",
                params![new_amount, entry.id],
            )?;
            recalculate_day(conn, user_id, today)?;
            Ok(true)
        })?;

        if updated {
            info!(user = %user_id, entry_id, amount = new_amount, "Updated entry amount");
        }
        Ok(updated)
    }

    /// Change the payment method of one of today's entries
    ///
    /// Returns `false` when today's record has no such entry.
    pub fn update_entry_payment_method(
        &self,
        user_id: &str,
        entry_id: i64,
        payment: &PaymentAccount,
    ) -> Result<bool> {
        let today = self.today();
        let payment = PaymentAccount::new(payment.method, payment.sub_identifier.as_deref());
        let updated = self.write_tx(|conn| {
            let Some(entry) = find_in_day(conn, user_id, today, entry_id)? else {
                return Ok(false);
            };
            guard_transfer_entry(&entry)?;

            conn.execute(
                "UPDATE entries SET method = ?, sub_identifier = ? WHERE id = ?",
                params![payment.method.as_str(), payment.sub_identifier, entry.id],
            )?;
            recalculate_day(conn, user_id, today)?;
            Ok(true)
        })?;

        if updated {
            info!(user = %user_id, entry_id, payment = %payment, "Updated entry payment method");
        }
        Ok(updated)
    }

    /// Overwrite a day record's cached totals with the sums of its lists
    pub fn recalculate_totals(&self, user_id: &str, date: NaiveDate) -> Result<DayTotals> {
        self.write_tx(|conn| recalculate_day(conn, user_id, date))
    }

    /// Load a day record with both ordered lists
    pub fn get_day_record(&self, user_id: &str, date: NaiveDate) -> Result<Option<DayRecord>> {
        let conn = self.conn()?;
        let date_str = date.to_string();

        let header = conn
            .query_row(
                "SELECT total_income, total_expense, updated_at FROM day_records WHERE user_id = ? AND date = ?",
                params![user_id, date_str],
                |row| {
                    let updated_at: String = row.get(2)?;
                    Ok((row.get::<_, f64>(0)?, row.get::<_, f64>(1)?, updated_at))
                },
            )
            .optional()?;

        let Some((total_income, total_expense, updated_at)) = header else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM entries WHERE user_id = ? AND date = ? ORDER BY id",
            ENTRY_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![user_id, date_str], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let (incomes, expenses) = entries
            .into_iter()
            .partition(|e| e.kind == EntryKind::Income);

        Ok(Some(DayRecord {
            user_id: user_id.to_string(),
            date,
            incomes,
            expenses,
            total_income,
            total_expense,
            updated_at: parse_datetime(&updated_at),
        }))
    }

    /// Look up an entry by id on any date
    pub fn get_entry(&self, user_id: &str, entry_id: i64) -> Result<Option<Entry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM entries WHERE user_id = ? AND id = ?",
                    ENTRY_COLUMNS
                ),
                params![user_id, entry_id],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Today's most recent expense, else today's most recent income
    ///
    /// This is what "fix my last entry" refers to. Transfer entries are
    /// skipped; they only change through their transfer.
    pub fn last_entry(&self, user_id: &str) -> Result<Option<Entry>> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                &format!(
                    "SELECT {} FROM entries WHERE user_id = ? AND date = ? AND transfer_id IS NULL ORDER BY sign ASC, id DESC LIMIT 1",
                    ENTRY_COLUMNS
                ),
                params![user_id, self.today().to_string()],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }
}
