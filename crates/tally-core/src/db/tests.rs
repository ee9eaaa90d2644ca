//! Database tests

use super::*;
use crate::models::*;

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn test_db() -> Database {
        Database::in_memory()
            .unwrap()
            .with_clock(Clock::Fixed(day(2024, 3, 15)))
    }

    fn net_of(db: &Database, user: &str, method: PaymentMethod, name: Option<&str>) -> f64 {
        db.get_balance_by_payment_method(user)
            .unwrap()
            .into_iter()
            .find(|b| b.method == method && b.sub_identifier.as_deref() == name)
            .map(|b| b.net_balance)
            .unwrap_or(0.0)
    }

    fn bank_transfer(amount: f64, from: &str, to: &str) -> NewTransfer {
        NewTransfer {
            from: vec![TransferLeg::new(amount, PaymentAccount::bank(from))],
            to: vec![TransferLeg::new(amount, PaymentAccount::bank(to))],
            description: String::new(),
        }
    }

    #[test]
    fn test_in_memory_db() {
        let db = test_db();
        assert!(db.get_day_record("u1", db.today()).unwrap().is_none());
        assert_eq!(db.get_balance_summary("u1").unwrap(), BalanceSummary::default());
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = test_db();
        let conn = db.conn().unwrap();
        for table in ["day_records", "entries", "transfers", "transfer_legs", "budgets", "chat_history"] {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {}", table);
        }
    }

    #[test]
    fn test_save_entry_creates_day_record() {
        let db = test_db();
        let today = db.today();

        db.save_entry_today("u1", &NewEntry::income(1000.0, "salary", PaymentAccount::bank("SCB")))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(150.0, "Food", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(150.0, "food", PaymentAccount::cash()))
            .unwrap();

        let record = db.get_day_record("u1", today).unwrap().unwrap();
        assert_eq!(record.incomes.len(), 1);
        assert_eq!(record.expenses.len(), 2);
        assert_eq!(record.total_income, 1000.0);
        assert_eq!(record.total_expense, 300.0);
        // Categories are stored normalized
        assert_eq!(record.expenses[0].category, "food");
        // Insertion order within a list
        assert!(record.expenses[0].id < record.expenses[1].id);
    }

    #[test]
    fn test_save_entry_rejects_bad_amounts() {
        let db = test_db();
        for amount in [0.0, -10.0, f64::NAN, f64::INFINITY] {
            let err = db
                .save_entry_today("u1", &NewEntry::expense(amount, "food", PaymentAccount::cash()))
                .unwrap_err();
            assert!(err.is_rejection());
        }
        assert!(db.get_day_record("u1", db.today()).unwrap().is_none());
    }

    #[test]
    fn test_save_entries_batch() {
        let db = test_db();
        let ids = db
            .save_entries(
                "u1",
                db.today(),
                &[
                    NewEntry::expense(150.0, "food", PaymentAccount::cash()),
                    NewEntry::income(40.0, "refund", PaymentAccount::cash()),
                ],
            )
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);

        let record = db.get_day_record("u1", db.today()).unwrap().unwrap();
        assert_eq!(record.total_expense, 150.0);
        assert_eq!(record.total_income, 40.0);

        // A bad entry anywhere in the batch rolls back the whole batch
        let err = db
            .save_entries(
                "u1",
                day(2024, 3, 14),
                &[
                    NewEntry::expense(150.0, "food", PaymentAccount::cash()),
                    NewEntry::expense(-20.0, "food", PaymentAccount::cash()),
                ],
            )
            .unwrap_err();
        assert!(err.is_rejection());
        assert!(db.get_day_record("u1", day(2024, 3, 14)).unwrap().is_none());
        assert_eq!(db.get_balance_summary("u1").unwrap().total_expense, 150.0);
    }

    #[test]
    fn test_users_are_isolated() {
        let db = test_db();
        db.save_entry_today("u1", &NewEntry::expense(10.0, "food", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u2", &NewEntry::expense(99.0, "food", PaymentAccount::cash()))
            .unwrap();

        assert_eq!(db.get_balance_summary("u1").unwrap().total_expense, 10.0);
        assert_eq!(db.get_balance_summary("u2").unwrap().total_expense, 99.0);
        assert_eq!(db.search_by_keyword("u1", "food", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_balance_identity() {
        let db = test_db();
        db.save_entry(
            "u1",
            day(2024, 3, 1),
            &NewEntry::income(5000.0, "salary", PaymentAccount::bank("SCB")),
        )
        .unwrap();
        db.save_entry(
            "u1",
            day(2024, 3, 2),
            &NewEntry::expense(120.5, "food", PaymentAccount::credit_card("Visa")),
        )
        .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(79.5, "food", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::income(30.0, "refund", PaymentAccount::cash()))
            .unwrap();
        db.save_transfer("u1", &bank_transfer(700.0, "SCB", "KBank"))
            .unwrap();

        let summary = db.get_balance_summary("u1").unwrap();
        assert_eq!(summary.balance, summary.total_income - summary.total_expense);

        let signed: f64 = db
            .list_entries("u1", day(2024, 1, 1), day(2024, 12, 31))
            .unwrap()
            .iter()
            .filter(|e| !e.is_transfer())
            .map(|e| e.signed_amount())
            .sum();
        assert!((summary.balance - signed).abs() < 1e-9);
        assert_eq!(summary.balance, 4830.0);
        assert_eq!(summary.today_income, 30.0);
        assert_eq!(summary.today_expense, 79.5);
    }

    #[test]
    fn test_transfer_zero_sum() {
        let db = test_db();
        db.save_entry_today("u1", &NewEntry::income(3000.0, "salary", PaymentAccount::bank("BankA")))
            .unwrap();
        let before = db.get_balance_summary("u1").unwrap();

        let saved = db.save_transfer("u1", &bank_transfer(1000.0, "BankA", "BankB")).unwrap();
        assert_eq!(saved.entry_ids.len(), 2);

        assert_eq!(db.get_balance_summary("u1").unwrap(), before);
        assert_eq!(net_of(&db, "u1", PaymentMethod::Bank, Some("BankA")), 2000.0);
        assert_eq!(net_of(&db, "u1", PaymentMethod::Bank, Some("BankB")), 1000.0);
        assert_eq!(db.get_net_worth("u1").unwrap().net_worth, 3000.0);

        let record = db.get_day_record("u1", db.today()).unwrap().unwrap();
        let expense = &record.expenses[0];
        let income = &record.incomes[1];
        assert_eq!(expense.category, TRANSFER_CATEGORY);
        assert_eq!(expense.transfer_id, Some(saved.transfer_id));
        assert_eq!(income.payment, PaymentAccount::bank("BankB"));
    }

    #[test]
    fn test_multi_leg_transfer() {
        let db = test_db();
        let transfer = NewTransfer {
            from: vec![
                TransferLeg::new(600.0, PaymentAccount::bank("SCB")),
                TransferLeg::new(400.0, PaymentAccount::cash()),
            ],
            to: vec![TransferLeg::new(1000.0, PaymentAccount::credit_card("Visa"))],
            description: "pay off card".into(),
        };
        let saved = db.save_transfer("u1", &transfer).unwrap();
        assert_eq!(saved.entry_ids.len(), 3);

        let loaded = db.get_transfer("u1", saved.transfer_id).unwrap().unwrap();
        assert_eq!(loaded.from, transfer.from);
        assert_eq!(loaded.to, transfer.to);
        assert_eq!(loaded.total_amount, 1000.0);
        assert_eq!(loaded.description, "pay off card");

        assert_eq!(net_of(&db, "u1", PaymentMethod::Cash, None), -400.0);
        assert_eq!(net_of(&db, "u1", PaymentMethod::CreditCard, Some("Visa")), 1000.0);
    }

    #[test]
    fn test_transfer_validation_writes_nothing() {
        let db = test_db();
        let unbalanced = NewTransfer {
            from: vec![TransferLeg::new(100.0, PaymentAccount::cash())],
            to: vec![TransferLeg::new(90.0, PaymentAccount::bank("SCB"))],
            description: String::new(),
        };
        let empty_side = NewTransfer {
            from: vec![],
            to: vec![TransferLeg::new(90.0, PaymentAccount::bank("SCB"))],
            description: String::new(),
        };
        let zero_leg = NewTransfer {
            from: vec![TransferLeg::new(0.0, PaymentAccount::cash())],
            to: vec![TransferLeg::new(0.0, PaymentAccount::bank("SCB"))],
            description: String::new(),
        };

        for transfer in [unbalanced, empty_side, zero_leg] {
            assert!(db.save_transfer("u1", &transfer).unwrap_err().is_rejection());
        }
        assert!(db.list_transfers("u1", 10).unwrap().is_empty());
        assert!(db.get_day_record("u1", db.today()).unwrap().is_none());

        // Rounding noise within tolerance is accepted
        let near = NewTransfer {
            from: vec![TransferLeg::new(33.33, PaymentAccount::cash()); 3],
            to: vec![TransferLeg::new(99.99, PaymentAccount::bank("SCB"))],
            description: String::new(),
        };
        assert!(validate_transfer(&near).is_ok());
    }

    #[test]
    fn test_transfer_reversal() {
        let db = test_db();
        let today = db.today();
        db.save_entry_today("u1", &NewEntry::income(500.0, "salary", PaymentAccount::bank("BankA")))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(40.0, "food", PaymentAccount::cash()))
            .unwrap();

        let record_before = db.get_day_record("u1", today).unwrap().unwrap();
        let methods_before = db.get_balance_by_payment_method("u1").unwrap();

        let saved = db.save_transfer("u1", &bank_transfer(200.0, "BankA", "BankB")).unwrap();
        assert!(db.delete_transfer("u1", saved.transfer_id).unwrap());

        let record_after = db.get_day_record("u1", today).unwrap().unwrap();
        assert_eq!(record_after.total_income, record_before.total_income);
        assert_eq!(record_after.total_expense, record_before.total_expense);
        assert_eq!(record_after.incomes, record_before.incomes);
        assert_eq!(record_after.expenses, record_before.expenses);

        let methods_after: Vec<_> = db
            .get_balance_by_payment_method("u1")
            .unwrap()
            .into_iter()
            .filter(|b| b.total_income != 0.0 || b.total_expense != 0.0)
            .collect();
        assert_eq!(methods_after, methods_before);
        assert!(db.get_transfer("u1", saved.transfer_id).unwrap().is_none());

        // Idempotent
        assert!(!db.delete_transfer("u1", saved.transfer_id).unwrap());
    }

    #[test]
    fn test_transfer_entries_are_immutable() {
        let db = test_db();
        let saved = db.save_transfer("u1", &bank_transfer(50.0, "BankA", "BankB")).unwrap();
        let entry_id = saved.entry_ids[0];

        assert!(db.delete_entry("u1", entry_id).unwrap_err().is_rejection());
        assert!(db.update_entry_amount("u1", entry_id, 10.0).unwrap_err().is_rejection());
        assert!(db
            .update_entry_payment_method("u1", entry_id, &PaymentAccount::cash())
            .unwrap_err()
            .is_rejection());
        assert!(db.last_entry("u1").unwrap().is_none());
    }

    #[test]
    fn test_list_transfers_newest_first() {
        let db = test_db();
        let first = db.save_transfer("u1", &bank_transfer(10.0, "A", "B")).unwrap();
        let second = db.save_transfer("u1", &bank_transfer(20.0, "B", "C")).unwrap();
        db.save_transfer("u2", &bank_transfer(30.0, "A", "B")).unwrap();

        let listed = db.list_transfers("u1", 10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.transfer_id);
        assert_eq!(listed[1].id, first.transfer_id);
        assert_eq!(db.list_transfers("u1", 1).unwrap().len(), 1);
        assert!(db.get_transfer("u2", first.transfer_id).unwrap().is_none());
    }

    #[test]
    fn test_recalculation_idempotence() {
        let db = test_db();
        let today = db.today();
        db.save_entry_today("u1", &NewEntry::income(100.0, "gift", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(35.25, "food", PaymentAccount::cash()))
            .unwrap();

        // Corrupt the cached totals, then repair them
        db.conn()
            .unwrap()
            .execute(
                "UPDATE day_records SET total_income = 1, total_expense = 2 WHERE user_id = 'u1'",
                [],
            )
            .unwrap();

        let first = db.recalculate_totals("u1", today).unwrap();
        let second = db.recalculate_totals("u1", today).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.total_income, 100.0);
        assert_eq!(first.total_expense, 35.25);
    }

    #[test]
    fn test_delete_entry() {
        let db = test_db();
        let today = db.today();
        let keep = db
            .save_entry_today("u1", &NewEntry::expense(20.0, "food", PaymentAccount::cash()))
            .unwrap();
        let gone = db
            .save_entry_today("u1", &NewEntry::expense(30.0, "taxi", PaymentAccount::cash()))
            .unwrap();

        assert!(db.delete_entry("u1", gone).unwrap());
        let record = db.get_day_record("u1", today).unwrap().unwrap();
        assert_eq!(record.expenses.len(), 1);
        assert_eq!(record.expenses[0].id, keep);
        assert_eq!(record.total_expense, 20.0);

        // Other users cannot delete it
        assert!(!db.delete_entry("u2", keep).unwrap());
    }

    #[test]
    fn test_delete_finds_either_list() {
        let db = test_db();
        let today = db.today();
        let income = db
            .save_entry_today("u1", &NewEntry::income(500.0, "gift", PaymentAccount::cash()))
            .unwrap();
        let expense = db
            .save_entry_today("u1", &NewEntry::expense(40.0, "food", PaymentAccount::cash()))
            .unwrap();

        assert!(db.delete_entry("u1", income).unwrap());
        let record = db.get_day_record("u1", today).unwrap().unwrap();
        assert!(record.incomes.is_empty());
        assert_eq!(record.total_income, 0.0);
        assert_eq!(record.total_expense, 40.0);

        assert!(db.delete_entry("u1", expense).unwrap());
        let record = db.get_day_record("u1", today).unwrap().unwrap();
        assert!(record.expenses.is_empty());
        assert_eq!(record.total_expense, 0.0);
    }

    #[test]
    fn test_delete_missing_entry_is_noop() {
        let db = test_db();
        let today = db.today();
        db.save_entry_today("u1", &NewEntry::expense(20.0, "food", PaymentAccount::cash()))
            .unwrap();
        let before = db.get_day_record("u1", today).unwrap().unwrap();

        assert!(!db.delete_entry("u1", 9999).unwrap());

        let after = db.get_day_record("u1", today).unwrap().unwrap();
        assert_eq!(after.total_expense, before.total_expense);
        assert_eq!(after.expenses.len(), 1);
    }

    #[test]
    fn test_delete_only_searches_today() {
        let db = test_db();
        let yesterday = day(2024, 3, 14);
        let old = db
            .save_entry("u1", yesterday, &NewEntry::expense(5.0, "food", PaymentAccount::cash()))
            .unwrap();

        assert!(!db.delete_entry("u1", old).unwrap());
        assert!(!db.update_entry_amount("u1", old, 6.0).unwrap());
        assert_eq!(db.get_entry("u1", old).unwrap().unwrap().amount, 5.0);
    }

    #[test]
    fn test_update_entry_amount_and_method() {
        let db = test_db();
        let today = db.today();
        let id = db
            .save_entry_today("u1", &NewEntry::expense(60.0, "coffee", PaymentAccount::cash()))
            .unwrap();

        assert!(db.update_entry_amount("u1", id, 75.0).unwrap());
        assert_eq!(db.get_day_record("u1", today).unwrap().unwrap().total_expense, 75.0);
        assert!(db.update_entry_amount("u1", id, 0.0).unwrap_err().is_rejection());

        assert!(db
            .update_entry_payment_method("u1", id, &PaymentAccount::credit_card("Visa"))
            .unwrap());
        let entry = db.get_entry("u1", id).unwrap().unwrap();
        assert_eq!(entry.payment, PaymentAccount::credit_card("Visa"));
        assert_eq!(net_of(&db, "u1", PaymentMethod::Cash, None), 0.0);
        assert_eq!(net_of(&db, "u1", PaymentMethod::CreditCard, Some("Visa")), -75.0);

        // Cash never carries a sub-identifier
        assert!(db
            .update_entry_payment_method("u1", id, &PaymentAccount::new(PaymentMethod::Cash, Some("wallet")))
            .unwrap());
        assert_eq!(db.get_entry("u1", id).unwrap().unwrap().payment, PaymentAccount::cash());
    }

    #[test]
    fn test_last_entry_prefers_expense() {
        let db = test_db();
        assert!(db.last_entry("u1").unwrap().is_none());

        let income = db
            .save_entry_today("u1", &NewEntry::income(10.0, "gift", PaymentAccount::cash()))
            .unwrap();
        assert_eq!(db.last_entry("u1").unwrap().unwrap().id, income);

        let first = db
            .save_entry_today("u1", &NewEntry::expense(1.0, "a", PaymentAccount::cash()))
            .unwrap();
        let second = db
            .save_entry_today("u1", &NewEntry::expense(2.0, "b", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::income(3.0, "c", PaymentAccount::cash()))
            .unwrap();
        assert!(first < second);
        assert_eq!(db.last_entry("u1").unwrap().unwrap().id, second);
    }

    #[test]
    fn test_budget_crud() {
        let db = test_db();
        let budget = db.set_budget("u1", "Food", 3000.0).unwrap();
        assert_eq!(budget.amount, 3000.0);

        // Replaces, case-insensitively
        let replaced = db.set_budget("u1", "food", 4000.0).unwrap();
        assert_eq!(replaced.id, budget.id);
        assert_eq!(db.list_budgets("u1").unwrap().len(), 1);
        assert_eq!(db.get_budget("u1", "FOOD").unwrap().unwrap().amount, 4000.0);

        assert!(db.set_budget("u1", "", 10.0).unwrap_err().is_rejection());
        assert!(db.set_budget("u1", "rent", -1.0).unwrap_err().is_rejection());
        assert!(db.set_budget("u1", "transfer", 10.0).unwrap_err().is_rejection());

        assert!(db.delete_budget("u1", "food").unwrap());
        assert!(!db.delete_budget("u1", "food").unwrap());
        assert!(db.list_budgets("u1").unwrap().is_empty());
    }

    #[test]
    fn test_budget_threshold() {
        let db = test_db();
        db.set_budget("u1", "food", 5000.0).unwrap();
        db.save_entry("u1", day(2024, 3, 2), &NewEntry::expense(4200.0, "food", PaymentAccount::cash()))
            .unwrap();

        let warning = db.check_budget_alert("u1", "food", 300.0).unwrap();
        assert!(warning.should_alert);
        assert_eq!(warning.level, AlertLevel::Warning);
        assert_eq!(warning.projected, 4500.0);
        assert!(warning.message.contains("Nearing"));

        let over = db.check_budget_alert("u1", "food", 900.0).unwrap();
        assert!(over.should_alert);
        assert_eq!(over.level, AlertLevel::OverBudget);
        assert!(over.message.contains("Over budget"));

        let still_warning = db.check_budget_alert("u1", "food", 100.0).unwrap();
        assert!(still_warning.should_alert);
        assert_eq!(still_warning.level, AlertLevel::Warning);

        // The check never writes
        assert_eq!(db.get_budget_status("u1").unwrap()[0].spent, 4200.0);
    }

    #[test]
    fn test_budget_silent_below_warning_band() {
        let db = test_db();
        db.set_budget("u1", "food", 5000.0).unwrap();
        db.save_entry_today("u1", &NewEntry::expense(3000.0, "food", PaymentAccount::cash()))
            .unwrap();

        let alert = db.check_budget_alert("u1", "food", 100.0).unwrap();
        assert!(!alert.should_alert);
        assert_eq!(alert.level, AlertLevel::Silent);
        assert!(alert.message.is_empty());

        // No budget, no alert
        assert!(!db.check_budget_alert("u1", "travel", 1e9).unwrap().should_alert);
    }

    #[test]
    fn test_alert_level_boundaries() {
        assert_eq!(alert_level(3999.0, 5000.0), AlertLevel::Silent);
        assert_eq!(alert_level(4000.0, 5000.0), AlertLevel::Warning);
        assert_eq!(alert_level(5000.0, 5000.0), AlertLevel::Warning);
        assert_eq!(alert_level(5000.01, 5000.0), AlertLevel::OverBudget);
        assert_eq!(alert_level(10.0, 0.0), AlertLevel::Silent);
    }

    #[test]
    fn test_budget_status_current_month_only() {
        let db = test_db();
        db.set_budget("u1", "food", 1000.0).unwrap();
        db.save_entry("u1", day(2024, 2, 28), &NewEntry::expense(900.0, "food", PaymentAccount::cash()))
            .unwrap();
        db.save_entry("u1", day(2024, 3, 1), &NewEntry::expense(1100.0, "food", PaymentAccount::cash()))
            .unwrap();
        db.save_transfer("u1", &bank_transfer(500.0, "A", "B")).unwrap();

        let status = db.get_budget_status("u1").unwrap();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].spent, 1100.0);
        assert_eq!(status[0].remaining, -100.0);
        assert!(status[0].is_over_budget);

        let spending = db.get_monthly_spending_by_category("u1").unwrap();
        assert_eq!(spending.get("food"), Some(&1100.0));
        assert!(!spending.contains_key(TRANSFER_CATEGORY));
    }

    #[test]
    fn test_budget_views_share_category_keys() {
        let db = test_db();
        db.set_budget("u1", "food", 1000.0).unwrap();
        db.set_budget("u1", "other", 100.0).unwrap();
        db.save_entry_today("u1", &NewEntry::expense(100.0, "Food", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(50.0, "food", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(70.0, "", PaymentAccount::cash()))
            .unwrap();

        let spending = db.get_monthly_spending_by_category("u1").unwrap();
        assert_eq!(spending.len(), 2);
        assert_eq!(spending.get("food"), Some(&150.0));
        assert_eq!(spending.get("other"), Some(&70.0));

        let status = db.get_budget_status("u1").unwrap();
        let spent_on = |category: &str| {
            status
                .iter()
                .find(|s| s.category == category)
                .map(|s| s.spent)
                .unwrap()
        };
        assert_eq!(spent_on("food"), 150.0);
        assert_eq!(spent_on("other"), 70.0);

        // Blank spend counts against the "other" budget
        let alert = db.check_budget_alert("u1", "other", 100.0).unwrap();
        assert!(alert.should_alert);
        assert_eq!(alert.level, AlertLevel::OverBudget);
        assert_eq!(alert.spent, 70.0);
        assert_eq!(alert.projected, 170.0);
        assert!((alert.percentage - 170.0).abs() < 1e-9);

        let alert = db.check_budget_alert("u1", "FOOD", 700.0).unwrap();
        assert_eq!(alert.spent, 150.0);
        assert_eq!(alert.level, AlertLevel::Warning);
    }

    #[test]
    fn test_month_bounds() {
        assert_eq!(month_bounds(day(2024, 2, 10)), (day(2024, 2, 1), day(2024, 3, 1)));
        assert_eq!(month_bounds(day(2024, 12, 31)), (day(2024, 12, 1), day(2025, 1, 1)));
    }

    #[test]
    fn test_search_by_keyword_ordering() {
        let db = test_db();
        db.save_entry(
            "u1",
            day(2024, 3, 1),
            &NewEntry::expense(10.0, "food", PaymentAccount::cash()).with_description("Pad Thai"),
        )
        .unwrap();
        db.save_entry_today(
            "u1",
            &NewEntry::expense(20.0, "food", PaymentAccount::cash()).with_merchant("Thai Express"),
        )
        .unwrap();
        db.save_entry_today("u1", &NewEntry::income(5.0, "thai lessons", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(7.0, "bus", PaymentAccount::cash()))
            .unwrap();

        let hits = db.search_by_keyword("u1", "THAI", 10).unwrap();
        let amounts: Vec<f64> = hits.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![5.0, 20.0, 10.0]);

        assert_eq!(db.search_by_keyword("u1", "thai", 1).unwrap().len(), 1);
        assert!(db.search_by_keyword("u1", "   ", 10).unwrap().is_empty());
    }

    #[test]
    fn test_search_by_date_range() {
        let db = test_db();
        for (d, amount) in [(1, 1.0), (5, 5.0), (10, 10.0)] {
            db.save_entry("u1", day(2024, 3, d), &NewEntry::expense(amount, "x", PaymentAccount::cash()))
                .unwrap();
        }

        let hits = db
            .search_by_date_range("u1", day(2024, 3, 2), day(2024, 3, 10), 10)
            .unwrap();
        let amounts: Vec<f64> = hits.iter().map(|e| e.amount).collect();
        assert_eq!(amounts, vec![10.0, 5.0]);

        let listed = db.list_entries("u1", day(2024, 3, 1), day(2024, 3, 31)).unwrap();
        assert_eq!(listed.first().unwrap().amount, 1.0);
        assert_eq!(listed.len(), 3);
    }

    #[test]
    fn test_unbounded_search_returns_every_match() {
        let db = test_db();
        let batch: Vec<NewEntry> = (1..=60)
            .map(|i| NewEntry::expense(i as f64, "snack", PaymentAccount::cash()))
            .collect();
        db.save_entries("u1", db.today(), &batch).unwrap();

        // Non-positive limits fall back to the defaults
        assert_eq!(
            db.search_by_date_range("u1", db.today(), db.today(), 0).unwrap().len(),
            DEFAULT_RANGE_LIMIT as usize
        );
        assert_eq!(
            db.search_by_keyword("u1", "snack", -1).unwrap().len(),
            DEFAULT_SEARCH_LIMIT as usize
        );

        let all = db
            .search_all_by_date_range("u1", day(2024, 3, 1), db.today())
            .unwrap();
        assert_eq!(all.len(), 60);
        assert_eq!(all.first().unwrap().amount, 1.0);
        assert_eq!(db.search_all_by_keyword("u1", "snack").unwrap().len(), 60);
    }

    #[test]
    fn test_known_methods_and_categories() {
        let db = test_db();
        db.save_entry_today("u1", &NewEntry::expense(1.0, "food", PaymentAccount::bank("SCB")))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::expense(1.0, "food", PaymentAccount::credit_card("Visa")))
            .unwrap();
        db.save_entry_today("u1", &NewEntry::income(1.0, "salary", PaymentAccount::bank("KBank")))
            .unwrap();
        db.save_transfer("u1", &bank_transfer(5.0, "SCB", "TTB")).unwrap();

        let methods = db.get_distinct_payment_methods("u1").unwrap();
        assert!(methods.banks.contains(&"SCB".to_string()));
        assert!(methods.banks.contains(&"TTB".to_string()));
        assert_eq!(methods.credit_cards, vec!["Visa".to_string()]);

        let categories = db.get_distinct_categories("u1").unwrap();
        assert_eq!(categories.expense, vec!["food".to_string()]);
        assert_eq!(categories.income, vec!["salary".to_string()]);
    }

    #[test]
    fn test_recent_context() {
        let db = test_db();
        db.save_entry("u1", day(2024, 1, 1), &NewEntry::expense(999.0, "old", PaymentAccount::cash()))
            .unwrap();
        db.save_entry_today(
            "u1",
            &NewEntry::expense(60.0, "coffee", PaymentAccount::cash()).with_description("latte"),
        )
        .unwrap();

        let recent = db.get_recent_context("u1", 7).unwrap();
        assert_eq!(recent.days, 7);
        assert_eq!(recent.lines.len(), 1);
        assert!(recent.lines[0].contains("coffee"));
        assert!(recent.lines[0].contains("latte"));
        assert_eq!(recent.total_expense, 60.0);
    }

    #[test]
    fn test_chat_history_bounded() {
        let db = test_db().with_chat_history_limit(3);
        for i in 0..5 {
            let role = if i % 2 == 0 { ChatRole::User } else { ChatRole::Assistant };
            db.save_chat_turn("u1", role, &format!("turn {}", i)).unwrap();
        }
        db.save_chat_turn("u2", ChatRole::User, "hello").unwrap();

        let history = db.get_chat_history("u1", 10).unwrap();
        let contents: Vec<&str> = history.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["turn 2", "turn 3", "turn 4"]);
        assert_eq!(history[0].role, ChatRole::User);

        assert_eq!(db.get_chat_history("u1", 1).unwrap()[0].content, "turn 4");
        assert_eq!(db.clear_chat_history("u1").unwrap(), 3);
        assert!(db.get_chat_history("u1", 10).unwrap().is_empty());
        assert_eq!(db.get_chat_history("u2", 10).unwrap().len(), 1);
    }

    #[test]
    fn test_concurrent_saves_keep_totals() {
        let db = test_db();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = db.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        db.save_entry_today("u1", &NewEntry::expense(1.0, "x", PaymentAccount::cash()))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let record = db.get_day_record("u1", db.today()).unwrap().unwrap();
        assert_eq!(record.expenses.len(), 80);
        assert_eq!(record.total_expense, 80.0);
    }

    #[test]
    fn test_encrypted_database_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.db");
        let path = path.to_str().unwrap();

        {
            let db = Database::new_with_key(path, Some("correct horse")).unwrap();
            db.save_entry_today("u1", &NewEntry::expense(12.0, "food", PaymentAccount::cash()))
                .unwrap();
        }

        let reopened = Database::new_with_key(path, Some("correct horse")).unwrap();
        assert_eq!(reopened.get_balance_summary("u1").unwrap().total_expense, 12.0);
    }
}
