//! Entry and balance command implementations

use anyhow::Result;
use chrono::NaiveDate;
use tally_core::{Database, EntryKind, NewEntry};

use super::{format_account, format_amount};

pub fn cmd_add(db: &Database, user: &str, entry: &NewEntry, date: Option<NaiveDate>) -> Result<()> {
    // Advisory only; the entry is saved whatever the budget says
    let alert = match entry.kind {
        EntryKind::Expense => Some(db.check_budget_alert(user, &entry.category, entry.amount)?),
        EntryKind::Income => None,
    };

    let date = date.unwrap_or_else(|| db.today());
    let id = db.save_entry(user, date, entry)?;

    println!(
        "✅ Recorded {} {} │ {} │ {} (entry {})",
        entry.kind,
        format_amount(entry.kind, entry.amount),
        entry.category,
        format_account(&entry.payment),
        id
    );
    if let Some(alert) = alert.filter(|a| a.should_alert) {
        println!("   ⚠️  {}", alert.message);
    }

    Ok(())
}

pub fn cmd_delete(db: &Database, user: &str, id: i64) -> Result<()> {
    if db.delete_entry(user, id)? {
        println!("✅ Deleted entry {}", id);
    } else {
        println!("No entry {} in today's record. Only today's entries can be deleted.", id);
    }
    Ok(())
}

pub fn cmd_balance(db: &Database, user: &str) -> Result<()> {
    let summary = db.get_balance_summary(user)?;
    let net_worth = db.get_net_worth(user)?;

    println!();
    println!("💰 Balance");
    println!("   ─────────────────────────────");
    println!("   Income:      {:>12.2}", summary.total_income);
    println!("   Expenses:    {:>12.2}", summary.total_expense);
    println!("   Balance:     {:>12.2}", summary.balance);
    println!();
    println!("   Today:       {:>12.2}", summary.today_balance);
    println!(
        "                (+{:.2} / -{:.2})",
        summary.today_income, summary.today_expense
    );

    if !net_worth.accounts.is_empty() {
        println!();
        println!("🏦 Accounts");
        println!("   ─────────────────────────────");
        for account in &net_worth.accounts {
            let label = match &account.sub_identifier {
                Some(name) => format!("{}:{}", account.method, name),
                None => account.method.to_string(),
            };
            println!("   {:<20} {:>12.2}", label, account.net_balance);
        }
    }

    println!();
    println!("   Cash:        {:>12.2}", net_worth.cash);
    println!("   Bank:        {:>12.2}", net_worth.bank);
    println!("   Credit card: {:>12.2}", net_worth.credit_card);
    println!("   Net worth:   {:>12.2}", net_worth.net_worth);

    Ok(())
}
