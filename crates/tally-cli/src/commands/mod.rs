//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Database setup (init) and shared utilities (open_db)
//! - `ledger` - Entries and balances (add, delete, balance)
//! - `transfers` - Transfer commands (add, delete, list)
//! - `budgets` - Budget commands (set, list, status, delete, check)
//! - `queries` - Search, date ranges and CSV export
//! - `messages` - JSON intents and classifier chat
//! - `serve` - Web server command

pub mod budgets;
pub mod core;
pub mod ledger;
pub mod messages;
pub mod queries;
pub mod serve;
pub mod transfers;

// Re-export command functions for main.rs
pub use budgets::*;
pub use core::*;
pub use ledger::*;
pub use messages::*;
pub use queries::*;
pub use serve::*;
pub use transfers::*;

use tally_core::{Entry, EntryKind, PaymentAccount};

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// `cash`, `bank:Chase`, `creditCard:Visa`
pub fn format_account(payment: &PaymentAccount) -> String {
    match &payment.sub_identifier {
        Some(name) => format!("{}:{}", payment.method, name),
        None => payment.method.to_string(),
    }
}

/// Signed, colored amount: red for expenses, green for income
pub fn format_amount(kind: EntryKind, amount: f64) -> String {
    match kind {
        EntryKind::Expense => format!("\x1b[31m-{:.2}\x1b[0m", amount),
        EntryKind::Income => format!("\x1b[32m+{:.2}\x1b[0m", amount),
    }
}

/// Print entries as a table, one line each
pub fn print_entries(entries: &[Entry]) {
    for entry in entries {
        let label = if entry.description.is_empty() {
            entry.merchant.as_str()
        } else {
            entry.description.as_str()
        };
        println!(
            "   [{}] {} │ {:>10} │ {:<12} │ {:<16} │ {}",
            entry.id,
            entry.date,
            format_amount(entry.kind, entry.amount),
            truncate(&entry.category, 12),
            truncate(&format_account(&entry.payment), 16),
            truncate(label, 30)
        );
    }
}
