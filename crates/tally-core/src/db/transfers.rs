//! Transfer expansion and reversal
//!
//! A transfer becomes one expense entry per source leg and one income entry
//! per destination leg, all in the reserved transfer category and tagged with
//! the transfer id. Globally it nets to zero; per payment method it moves money.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use tracing::{info, warn};

use super::entries::{append_entry, recalculate_day, validate_amount};
use super::{parse_date, parse_datetime, Database, DbConn};
use crate::error::{Error, Result};
use crate::models::{
    EntryKind, NewEntry, NewTransfer, PaymentAccount, PaymentMethod, SavedTransfer, Transfer,
    TransferLeg, TRANSFER_CATEGORY,
};

/// Largest tolerated difference between the two sides of a transfer
pub const TRANSFER_TOLERANCE: f64 = 0.005;

/// Check a transfer before anything is written
pub fn validate_transfer(transfer: &NewTransfer) -> Result<f64> {
    if transfer.from.is_empty() {
        return Err(Error::Rejected("transfer has no source legs".into()));
    }
    if transfer.to.is_empty() {
        return Err(Error::Rejected("transfer has no destination legs".into()));
    }
    for leg in transfer.from.iter().chain(transfer.to.iter()) {
        validate_amount(leg.amount)
            .map_err(|_| Error::Rejected(format!("transfer leg amount {} is not positive", leg.amount)))?;
    }

    let total_from: f64 = transfer.from.iter().map(|l| l.amount).sum();
    let total_to: f64 = transfer.to.iter().map(|l| l.amount).sum();
    if (total_from - total_to).abs() > TRANSFER_TOLERANCE {
        return Err(Error::Rejected(format!(
            "transfer does not balance: {:.2} out, {:.2} in",
            total_from, total_to
        )));
    }
    Ok(total_from)
}

fn leg_entry(kind: EntryKind, leg: &TransferLeg, description: &str) -> NewEntry {
    NewEntry {
        kind,
        amount: leg.amount,
        category: TRANSFER_CATEGORY.to_string(),
        description: description.to_string(),
        merchant: String::new(),
        payment: PaymentAccount::new(leg.payment.method, leg.payment.sub_identifier.as_deref()),
    }
}

fn load_legs(conn: &DbConn, transfer_id: i64) -> Result<(Vec<TransferLeg>, Vec<TransferLeg>)> {
    let mut stmt = conn.prepare(
        "SELECT side, amount, method, sub_identifier FROM transfer_legs WHERE transfer_id = ? ORDER BY side, position",
    )?;
    let rows = stmt
        .query_map(params![transfer_id], |row| {
            let side: String = row.get(0)?;
            let method_str: String = row.get(2)?;
            let sub_identifier: Option<String> = row.get(3)?;
            Ok((
                side,
                TransferLeg::new(
                    row.get(1)?,
                    PaymentAccount::new(
                        method_str.parse().unwrap_or(PaymentMethod::Cash),
                        sub_identifier.as_deref(),
                    ),
                ),
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut from = Vec::new();
    let mut to = Vec::new();
    for (side, leg) in rows {
        if side == "from" {
            from.push(leg);
        } else {
            to.push(leg);
        }
    }
    Ok((from, to))
}

impl Database {
    /// Persist a transfer and expand it into today's entries
    ///
    /// Rejected without writing anything if either side is empty, a leg is
    /// not positive, or the sides do not sum to the same amount.
    pub fn save_transfer(&self, user_id: &str, transfer: &NewTransfer) -> Result<SavedTransfer> {
        let total = match validate_transfer(transfer) {
            Ok(total) => total,
            Err(e) => {
                warn!(user = %user_id, error = %e, "Rejected transfer");
                return Err(e);
            }
        };
        let today = self.today();
        let description = transfer.description.trim();

        let saved = self.write_tx(|conn| {
            conn.execute(
                "INSERT INTO transfers (user_id, date, description, total_amount) VALUES (?, ?, ?, ?)",
                params![user_id, today.to_string(), description, total],
            )?;
            let transfer_id = conn.last_insert_rowid();

            let sides = [
                ("from", EntryKind::Expense, &transfer.from),
                ("to", EntryKind::Income, &transfer.to),
            ];

            let mut entry_ids = Vec::with_capacity(transfer.from.len() + transfer.to.len());
            for (side, kind, legs) in sides {
                for (position, leg) in legs.iter().enumerate() {
                    conn.execute(
                        r#"
                        INSERT INTO transfer_legs (transfer_id, side, position, amount, method, sub_identifier)
                        VALUES (?, ?, ?, ?, ?, ?)
                        "#,
                        params![
                            transfer_id,
                            side,
                            position as i64,
                            leg.amount,
                            leg.payment.method.as_str(),
                            leg.payment.sub_identifier,
                        ],
                    )?;
                    let entry = leg_entry(kind, leg, description);
                    entry_ids.push(append_entry(conn, user_id, today, &entry, Some(transfer_id))?);
                }
            }

            Ok(SavedTransfer {
                transfer_id,
                entry_ids,
            })
        })?;

        info!(
            user = %user_id,
            transfer_id = saved.transfer_id,
            total,
            entries = saved.entry_ids.len(),
            "Saved transfer"
        );
        Ok(saved)
    }

    /// Remove a transfer and every entry carrying its id, on any date
    ///
    /// Idempotent: returns `false` when nothing was left to remove.
    pub fn delete_transfer(&self, user_id: &str, transfer_id: i64) -> Result<bool> {
        let removed = self.write_tx(|conn| {
            let mut stmt = conn.prepare(
                "SELECT DISTINCT date FROM entries WHERE user_id = ? AND transfer_id = ?",
            )?;
            let dates: BTreeSet<NaiveDate> = stmt
                .query_map(params![user_id, transfer_id], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
                .iter()
                .map(|s| parse_date(s))
                .collect();

            let entries_removed = conn.execute(
                "DELETE FROM entries WHERE user_id = ? AND transfer_id = ?",
                params![user_id, transfer_id],
            )?;
            conn.execute(
                "DELETE FROM transfer_legs WHERE transfer_id IN (SELECT id FROM transfers WHERE id = ? AND user_id = ?)",
                params![transfer_id, user_id],
            )?;
            let transfers_removed = conn.execute(
                "DELETE FROM transfers WHERE id = ? AND user_id = ?",
                params![transfer_id, user_id],
            )?;

            for date in &dates {
                recalculate_day(conn, user_id, *date)?;
            }

            Ok(entries_removed > 0 || transfers_removed > 0)
        })?;

        if removed {
            info!(user = %user_id, transfer_id, "Deleted transfer");
        }
        Ok(removed)
    }

    /// Load one transfer with its legs
    pub fn get_transfer(&self, user_id: &str, transfer_id: i64) -> Result<Option<Transfer>> {
        let conn = self.conn()?;
        let header = conn
            .query_row(
                "SELECT id, date, description, total_amount, created_at FROM transfers WHERE id = ? AND user_id = ?",
                params![transfer_id, user_id],
                Self::row_to_transfer_header,
            )
            .optional()?;

        match header {
            Some(mut transfer) => {
                let (from, to) = load_legs(&conn, transfer.id)?;
                transfer.from = from;
                transfer.to = to;
                Ok(Some(transfer))
            }
            None => Ok(None),
        }
    }

    /// Most recent transfers first
    pub fn list_transfers(&self, user_id: &str, limit: i64) -> Result<Vec<Transfer>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, date, description, total_amount, created_at FROM transfers WHERE user_id = ? ORDER BY id DESC LIMIT ?",
        )?;
        let mut transfers = stmt
            .query_map(params![user_id, limit.max(1)], Self::row_to_transfer_header)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for transfer in &mut transfers {
            let (from, to) = load_legs(&conn, transfer.id)?;
            transfer.from = from;
            transfer.to = to;
        }
        Ok(transfers)
    }

    fn row_to_transfer_header(row: &rusqlite::Row) -> rusqlite::Result<Transfer> {
        let date_str: String = row.get(1)?;
        let created_at_str: String = row.get(4)?;
        Ok(Transfer {
            id: row.get(0)?,
            date: parse_date(&date_str),
            description: row.get(2)?,
            from: Vec::new(),
            to: Vec::new(),
            total_amount: row.get(3)?,
            created_at: parse_datetime(&created_at_str),
        })
    }
}
