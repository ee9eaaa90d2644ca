//! Balance aggregation
//!
//! Two deliberately different inclusion rules:
//! - `get_balance_summary` excludes transfer entries (they are not income or spending)
//! - `get_balance_by_payment_method` includes them (money moved between buckets)

use rusqlite::params;

use super::Database;
use crate::error::Result;
use crate::models::{
    BalanceSummary, NetWorth, PaymentAccount, PaymentBalance, PaymentMethod, TRANSFER_CATEGORY,
};

impl Database {
    /// Total income/expense over every day record, plus today's figures
    pub fn get_balance_summary(&self, user_id: &str) -> Result<BalanceSummary> {
        let conn = self.conn()?;
        let today = self.today().to_string();

        let (total_income, total_expense, today_income, today_expense): (f64, f64, f64, f64) = conn
            .query_row(
                r#"
                SELECT
                    COALESCE(SUM(CASE WHEN sign = 1 THEN amount END), 0),
                    COALESCE(SUM(CASE WHEN sign = -1 THEN amount END), 0),
                    COALESCE(SUM(CASE WHEN sign = 1 AND date = ?2 THEN amount END), 0),
                    COALESCE(SUM(CASE WHEN sign = -1 AND date = ?2 THEN amount END), 0)
                FROM entries
                WHERE user_id = ?1 AND category != ?3
                "#,
                params![user_id, today, TRANSFER_CATEGORY],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
            )?;

        Ok(BalanceSummary {
            total_income,
            total_expense,
            balance: total_income - total_expense,
            today_income,
            today_expense,
            today_balance: today_income - today_expense,
        })
    }

    /// Net position per (method, sub-identifier), transfers included
    pub fn get_balance_by_payment_method(&self, user_id: &str) -> Result<Vec<PaymentBalance>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT
                method,
                sub_identifier,
                COALESCE(SUM(CASE WHEN sign = 1 THEN amount END), 0),
                COALESCE(SUM(CASE WHEN sign = -1 THEN amount END), 0)
            FROM entries
            WHERE user_id = ?
            GROUP BY method, sub_identifier
            "#,
        )?;

        let mut balances = stmt
            .query_map(params![user_id], |row| {
                let method_str: String = row.get(0)?;
                let sub_identifier: Option<String> = row.get(1)?;
                let total_income: f64 = row.get(2)?;
                let total_expense: f64 = row.get(3)?;
                let account = PaymentAccount::new(
                    method_str.parse().unwrap_or(PaymentMethod::Cash),
                    sub_identifier.as_deref(),
                );
                Ok(PaymentBalance {
                    method: account.method,
                    sub_identifier: account.sub_identifier,
                    total_income,
                    total_expense,
                    net_balance: total_income - total_expense,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        balances.sort_by(|a, b| {
            a.method
                .cmp(&b.method)
                .then_with(|| a.sub_identifier.cmp(&b.sub_identifier))
        });
        Ok(balances)
    }

    /// Cash + bank + credit card net balances
    pub fn get_net_worth(&self, user_id: &str) -> Result<NetWorth> {
        let accounts = self.get_balance_by_payment_method(user_id)?;

        let mut worth = NetWorth::default();
        for account in &accounts {
            match account.method {
                PaymentMethod::Cash => worth.cash += account.net_balance,
                PaymentMethod::Bank => worth.bank += account.net_balance,
                PaymentMethod::CreditCard => worth.credit_card += account.net_balance,
            }
        }
        worth.net_worth = worth.cash + worth.bank + worth.credit_card;
        worth.accounts = accounts;
        Ok(worth)
    }
}
