//! Context assembler
//!
//! Gathers what the intent classifier needs to resolve a message against the
//! user's own ledger: which banks, cards and categories already exist, where
//! the money sits, recent activity and the conversation so far.

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::db::Database;
use crate::error::Result;
use crate::models::{
    BalanceSummary, ChatTurn, KnownCategories, KnownPaymentMethods, PaymentBalance, RecentContext,
};

/// Everything rendered into the classifier prompt
#[derive(Debug, Clone, Default)]
pub struct ClassifierContext {
    pub today: NaiveDate,
    pub payment_methods: KnownPaymentMethods,
    pub categories: KnownCategories,
    pub summary: BalanceSummary,
    pub balances: Vec<PaymentBalance>,
    pub recent: RecentContext,
    pub history: Vec<ChatTurn>,
}

impl ClassifierContext {
    /// Empty context for `today`
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            ..Default::default()
        }
    }

    /// Template variables for the prompt's context section
    pub fn to_template_vars(&self) -> HashMap<&'static str, String> {
        let mut vars = HashMap::new();
        vars.insert("today", self.today.to_string());

        let mut accounts = Vec::new();
        if !self.payment_methods.banks.is_empty() {
            accounts.push(format!("Banks: {}", self.payment_methods.banks.join(", ")));
        }
        if !self.payment_methods.credit_cards.is_empty() {
            accounts.push(format!(
                "Credit cards: {}",
                self.payment_methods.credit_cards.join(", ")
            ));
        }
        vars.insert("accounts", accounts.join(" | "));

        let mut categories = Vec::new();
        if !self.categories.expense.is_empty() {
            categories.push(format!("Expense: {}", self.categories.expense.join(", ")));
        }
        if !self.categories.income.is_empty() {
            categories.push(format!("Income: {}", self.categories.income.join(", ")));
        }
        vars.insert("categories", categories.join(" | "));

        vars.insert("balances", self.format_balances());
        vars.insert("recent", self.recent.lines.join("\n"));
        vars.insert(
            "history",
            self.history
                .iter()
                .map(|turn| format!("{}: {}", turn.role, turn.content))
                .collect::<Vec<_>>()
                .join("\n"),
        );

        vars
    }

    fn format_balances(&self) -> String {
        let has_activity = self.summary.total_income != 0.0
            || self.summary.total_expense != 0.0
            || !self.balances.is_empty();
        if !has_activity {
            return String::new();
        }

        let mut lines = vec![format!(
            "Overall: income {:.2}, expense {:.2}, balance {:.2} (today {:.2} / {:.2})",
            self.summary.total_income,
            self.summary.total_expense,
            self.summary.balance,
            self.summary.today_income,
            self.summary.today_expense,
        )];
        for b in &self.balances {
            let account = match &b.sub_identifier {
                Some(name) => format!("{} {}", b.method, name),
                None => b.method.to_string(),
            };
            lines.push(format!("{}: {:.2}", account, b.net_balance));
        }
        lines.join("\n")
    }
}

/// Assembles classifier context from the database
pub struct ContextAssembler<'a> {
    db: &'a Database,
    recent_days: i64,
}

impl<'a> ContextAssembler<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db, recent_days: 7 }
    }

    pub fn with_recent_days(mut self, days: i64) -> Self {
        self.recent_days = days;
        self
    }

    /// Context for classifying one message, with `history` already loaded
    pub fn for_message(&self, user_id: &str, history: Vec<ChatTurn>) -> Result<ClassifierContext> {
        Ok(ClassifierContext {
            today: self.db.today(),
            payment_methods: self.db.get_distinct_payment_methods(user_id)?,
            categories: self.db.get_distinct_categories(user_id)?,
            summary: self.db.get_balance_summary(user_id)?,
            balances: self.db.get_balance_by_payment_method(user_id)?,
            recent: self.db.get_recent_context(user_id, self.recent_days)?,
            history,
        })
    }
}
