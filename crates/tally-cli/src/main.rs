//! Tally CLI - conversational ledger
//!
//! Usage:
//!   tally init                         Initialize database
//!   tally add 12.50 -c food -p cash    Record an expense
//!   tally chat "lunch 12 cash"         Run a message through the classifier
//!   tally serve --port 3000            Start web server

mod cli;
mod commands;


use anyhow::{Context, Result};
use clap::Parser;
use tally_core::{NewEntry, NewTransfer, TallyConfig};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = TallyConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.database.path.clone());
    let user = cli.user.as_str();

    match cli.command {
        Commands::Init => commands::cmd_init(&db_path, cli.no_encrypt),
        Commands::Add {
            amount,
            category,
            income,
            description,
            merchant,
            payment,
            date,
        } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            let entry = if income {
                NewEntry::income(amount, &category, payment)
            } else {
                NewEntry::expense(amount, &category, payment)
            }
            .with_description(&description)
            .with_merchant(&merchant);
            commands::cmd_add(&db, user, &entry, date)
        }
        Commands::Delete { id } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_delete(&db, user, id)
        }
        Commands::Balance => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            commands::cmd_balance(&db, user)
        }
        Commands::Transfer { action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None => commands::cmd_transfer_list(&db, user, 20),
                Some(TransferAction::List { limit }) => {
                    commands::cmd_transfer_list(&db, user, limit)
                }
                Some(TransferAction::Add {
                    from,
                    to,
                    description,
                }) => {
                    let transfer = NewTransfer {
                        from,
                        to,
                        description,
                    };
                    commands::cmd_transfer_add(&db, user, &transfer)
                }
                Some(TransferAction::Delete { id }) => {
                    commands::cmd_transfer_delete(&db, user, id)
                }
            }
        }
        Commands::Budget { action } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            match action {
                None | Some(BudgetAction::Status) => commands::cmd_budget_status(&db, user),
                Some(BudgetAction::List) => commands::cmd_budget_list(&db, user),
                Some(BudgetAction::Set { category, amount }) => {
                    commands::cmd_budget_set(&db, user, &category, amount)
                }
                Some(BudgetAction::Delete { category }) => {
                    commands::cmd_budget_delete(&db, user, &category)
                }
                Some(BudgetAction::Check { category, amount }) => {
                    commands::cmd_budget_check(&db, user, &category, amount)
                }
            }
        }
        Commands::Search { keyword, limit } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            let limit = limit.unwrap_or(config.ledger.search_limit);
            commands::cmd_search(&db, user, &keyword, limit)
        }
        Commands::Range { from, to, limit } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            let limit = limit.unwrap_or(config.ledger.range_limit);
            commands::cmd_range(&db, user, from, to, limit)
        }
        Commands::Export { days, output } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            let days = days.unwrap_or(config.ledger.export_days);
            commands::cmd_export(&db, user, days, output.as_deref())
        }
        Commands::Intent { json, json_output } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            let dispatcher = tally_core::Dispatcher::from_config(db, &config)?;
            let raw = match json {
                Some(json) => json,
                None => commands::read_stdin()?,
            };
            commands::cmd_intent(&dispatcher, user, &raw, json_output)
        }
        Commands::Chat {
            message,
            json_output,
        } => {
            let db = commands::open_db(&db_path, cli.no_encrypt)?;
            let dispatcher = tally_core::Dispatcher::from_config(db, &config)?;
            commands::cmd_chat(&dispatcher, user, &message.join(" "), json_output).await
        }
        Commands::Serve { port, host } => {
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            commands::cmd_serve(&db_path, &host, port, cli.no_encrypt, &config).await
        }
    }
}
