//! Search, range and export command implementations

use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use tally_core::export::write_csv;
use tally_core::{Database, Entry, EntryKind};

use super::print_entries;

fn print_totals(entries: &[Entry]) {
    let (income, expense) = entries
        .iter()
        .filter(|e| !e.is_transfer())
        .fold((0.0, 0.0), |(inc, exp), e| match e.kind {
            EntryKind::Income => (inc + e.amount, exp),
            EntryKind::Expense => (inc, exp + e.amount),
        });
    println!();
    println!(
        "   {} entries │ income {:.2} │ expenses {:.2}",
        entries.len(),
        income,
        expense
    );
}

pub fn cmd_search(db: &Database, user: &str, keyword: &str, limit: i64) -> Result<()> {
    let entries = db.search_by_keyword(user, keyword, limit)?;

    if entries.is_empty() {
        println!("No entries matching '{}'.", keyword);
        return Ok(());
    }

    println!();
    println!("🔎 Entries matching '{}'", keyword);
    println!("   ─────────────────────────────────────────────────────────────");
    print_entries(&entries);
    print_totals(&entries);

    Ok(())
}

pub fn cmd_range(
    db: &Database,
    user: &str,
    from: NaiveDate,
    to: NaiveDate,
    limit: i64,
) -> Result<()> {
    let entries = db.search_by_date_range(user, from, to, limit)?;

    if entries.is_empty() {
        println!("No entries between {} and {}.", from, to);
        return Ok(());
    }

    println!();
    println!("📅 Entries {} → {}", from, to);
    println!("   ─────────────────────────────────────────────────────────────");
    print_entries(&entries);
    print_totals(&entries);

    Ok(())
}

/// Write the last `days` days as CSV to `output`, or stdout
pub fn cmd_export(db: &Database, user: &str, days: i64, output: Option<&Path>) -> Result<()> {
    let rows = db.export_rows(user, days)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_csv(&rows, file)?;
            println!("✅ Exported {} rows to {}", rows.len(), path.display());
        }
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            write_csv(&rows, &mut lock)?;
            lock.flush()?;
        }
    }

    Ok(())
}
