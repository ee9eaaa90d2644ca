//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tally_core::{PaymentAccount, PaymentMethod, TransferLeg};

/// Tally - a conversational ledger
#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "Personal ledger driven by natural-language messages", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the configured path, then tally.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// User whose ledger to operate on
    #[arg(short, long, default_value = "local", global = true)]
    pub user: String,

    /// Config file (defaults to ~/.config/tally/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set TALLY_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Record an expense (or income with --income)
    Add {
        /// Amount, always positive
        amount: f64,

        /// Category (defaults to "other")
        #[arg(short, long, default_value = "")]
        category: String,

        /// Record as income instead of expense
        #[arg(long)]
        income: bool,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Merchant name
        #[arg(short, long, default_value = "")]
        merchant: String,

        /// Payment account: cash, bank:<name> or creditCard:<name>
        #[arg(short, long, default_value = "cash", value_parser = parse_account)]
        payment: PaymentAccount,

        /// Day to record on (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete one of today's entries
    Delete {
        /// Entry ID
        id: i64,
    },

    /// Show balances, per-account balances and net worth
    Balance,

    /// Move money between accounts
    Transfer {
        #[command(subcommand)]
        action: Option<TransferAction>,
    },

    /// Manage monthly category budgets
    Budget {
        #[command(subcommand)]
        action: Option<BudgetAction>,
    },

    /// Search entries by keyword (category, description or merchant)
    Search {
        keyword: String,

        /// Maximum number of results (defaults to the configured search limit)
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// List entries between two dates (inclusive)
    Range {
        /// Start date (YYYY-MM-DD)
        from: NaiveDate,

        /// End date (YYYY-MM-DD)
        to: NaiveDate,

        /// Maximum number of results (defaults to the configured range limit)
        #[arg(short, long)]
        limit: Option<i64>,
    },

    /// Export recent entries as CSV
    Export {
        /// Number of days back from today (defaults to the configured window)
        #[arg(long)]
        days: Option<i64>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Dispatch a classifier-style JSON intent
    Intent {
        /// Intent JSON; read from stdin when omitted
        json: Option<String>,

        /// Print the full dispatch result as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Run one message through the intent classifier
    Chat {
        /// The message, e.g. "lunch 12 cash"
        #[arg(required = true, num_args = 1..)]
        message: Vec<String>,

        /// Print the full dispatch result as JSON
        #[arg(long)]
        json_output: bool,
    },

    /// Start the web server
    Serve {
        /// Port to listen on (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum TransferAction {
    /// Record a transfer; legs are <account>=<amount>, e.g. bank:Chase=200
    Add {
        /// Source leg (repeatable)
        #[arg(long = "from", required = true, value_parser = parse_leg)]
        from: Vec<TransferLeg>,

        /// Destination leg (repeatable)
        #[arg(long = "to", required = true, value_parser = parse_leg)]
        to: Vec<TransferLeg>,

        /// Free-text description
        #[arg(short, long, default_value = "")]
        description: String,
    },

    /// Reverse a transfer and remove its entries
    Delete {
        /// Transfer ID
        id: i64,
    },

    /// List recent transfers
    List {
        /// Number of transfers to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Subcommand)]
pub enum BudgetAction {
    /// Set (or replace) the monthly budget for a category
    Set { category: String, amount: f64 },

    /// List budgets
    List,

    /// Show this month's spend against each budget
    Status,

    /// Remove a category budget
    Delete { category: String },

    /// Preview the alert an expense would trigger, without recording it
    Check { category: String, amount: f64 },
}

/// Parse `cash`, `bank:<name>` or `creditCard:<name>`
pub fn parse_account(s: &str) -> Result<PaymentAccount, String> {
    let (method, name) = match s.split_once(':') {
        Some((method, name)) => (method, Some(name.trim())),
        None => (s, None),
    };
    let method: PaymentMethod = method.parse()?;
    Ok(PaymentAccount::new(method, name))
}

/// Parse `<account>=<amount>` into a transfer leg
pub fn parse_leg(s: &str) -> Result<TransferLeg, String> {
    let (account, amount) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("Expected <account>=<amount>, got '{}'", s))?;
    let amount: f64 = amount
        .trim()
        .parse()
        .map_err(|_| format!("Invalid amount in '{}'", s))?;
    Ok(TransferLeg::new(amount, parse_account(account.trim())?))
}
