//! Budget command implementations

use anyhow::Result;
use tally_core::{AlertLevel, Database};

pub fn cmd_budget_set(db: &Database, user: &str, category: &str, amount: f64) -> Result<()> {
    let budget = db.set_budget(user, category, amount)?;
    println!(
        "✅ Budget for {} set to {:.2} per month",
        budget.category, budget.amount
    );
    Ok(())
}

pub fn cmd_budget_list(db: &Database, user: &str) -> Result<()> {
    let budgets = db.list_budgets(user)?;

    if budgets.is_empty() {
        println!("No budgets set. Add one with:");
        println!("  tally budget set food 400");
        return Ok(());
    }

    println!();
    println!("📋 Budgets");
    println!("   ─────────────────────────────");
    for budget in budgets {
        println!("   {:<20} {:>10.2}", budget.category, budget.amount);
    }

    Ok(())
}

pub fn cmd_budget_status(db: &Database, user: &str) -> Result<()> {
    let statuses = db.get_budget_status(user)?;

    if statuses.is_empty() {
        println!("No budgets set.");
        return Ok(());
    }

    println!();
    println!("📊 Budget Status ({})", db.today().format("%B %Y"));
    println!("   ─────────────────────────────────────────────────────────────");
    for status in statuses {
        let marker = if status.is_over_budget { "🔴" } else { "🟢" };
        println!(
            "   {} {:<16} {:>10.2} / {:>10.2} │ {:>5.1}% │ {:.2} left",
            marker,
            status.category,
            status.spent,
            status.budget,
            status.percentage,
            status.remaining
        );
    }

    Ok(())
}

pub fn cmd_budget_delete(db: &Database, user: &str, category: &str) -> Result<()> {
    if db.delete_budget(user, category)? {
        println!("✅ Removed budget for {}", category);
    } else {
        println!("No budget for {}.", category);
    }
    Ok(())
}

pub fn cmd_budget_check(db: &Database, user: &str, category: &str, amount: f64) -> Result<()> {
    let alert = db.check_budget_alert(user, category, amount)?;

    match alert.level {
        AlertLevel::Silent if alert.budget <= 0.0 => {
            println!("No budget for {}; nothing to check.", category);
        }
        AlertLevel::Silent => {
            println!(
                "🟢 {:.2} keeps {} at {:.1}% of {:.2}",
                amount, category, alert.percentage, alert.budget
            );
        }
        AlertLevel::Warning | AlertLevel::OverBudget => {
            println!("⚠️  {}", alert.message);
        }
    }

    Ok(())
}
