//! Domain models for Tally

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Reserved category carried by every entry generated from a transfer.
///
/// Entries in this category never count toward income/expense totals or
/// budgets, but they do count toward per-payment-method balances.
pub const TRANSFER_CATEGORY: &str = "transfer";

/// Category used when spending has no category recorded
pub const UNCATEGORIZED: &str = "other";

/// Stored form of a category: trimmed and lowercased
///
/// Any spelling of the transfer marker folds onto [`TRANSFER_CATEGORY`].
pub fn normalize_category(category: &str) -> String {
    category.trim().to_lowercase()
}

/// Key that spending and budgets are matched on
///
/// Blank categories count as [`UNCATEGORIZED`], so a budget on "other"
/// covers spending recorded without a category.
pub fn spending_key(category: &str) -> String {
    let category = normalize_category(category);
    if category.is_empty() {
        UNCATEGORIZED.to_string()
    } else {
        category
    }
}

/// Whether an entry adds to or draws from the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Income,
    Expense,
}

impl EntryKind {
    /// +1 for income, -1 for expense. Never 0.
    pub fn sign(&self) -> i64 {
        match self {
            Self::Income => 1,
            Self::Expense => -1,
        }
    }

    pub fn from_sign(sign: i64) -> Option<Self> {
        match sign {
            1 => Some(Self::Income),
            -1 => Some(Self::Expense),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::str::FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "income" | "+1" | "1" | "in" => Ok(Self::Income),
            "expense" | "-1" | "out" => Ok(Self::Expense),
            _ => Err(format!("Unknown entry type: {}", s)),
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Where money physically sits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PaymentMethod {
    Cash,
    CreditCard,
    Bank,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cash => "cash",
            Self::CreditCard => "creditCard",
            Self::Bank => "bank",
        }
    }

    /// Numeric code used by the classifier: 0 cash, 1 credit card, 2 bank
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Cash),
            1 => Some(Self::CreditCard),
            2 => Some(Self::Bank),
            _ => None,
        }
    }

    pub fn code(&self) -> i64 {
        match self {
            Self::Cash => 0,
            Self::CreditCard => 1,
            Self::Bank => 2,
        }
    }

    /// Whether a sub-identifier (bank or card name) is meaningful for this method
    pub fn takes_sub_identifier(&self) -> bool {
        !matches!(self, Self::Cash)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace(['_', '-', ' '], "").as_str() {
            "cash" | "0" => Ok(Self::Cash),
            "creditcard" | "credit" | "card" | "1" => Ok(Self::CreditCard),
            "bank" | "banktransfer" | "2" => Ok(Self::Bank),
            _ => Err(format!("Unknown payment method: {}", s)),
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A payment method plus the named account it refers to, if any
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PaymentAccount {
    pub method: PaymentMethod,
    /// Bank name or card name; always `None` for cash
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_identifier: Option<String>,
}

impl PaymentAccount {
    /// Build an account, dropping blank names and names on cash
    pub fn new(method: PaymentMethod, sub_identifier: Option<&str>) -> Self {
        let sub_identifier = if method.takes_sub_identifier() {
            sub_identifier
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        } else {
            None
        };
        Self {
            method,
            sub_identifier,
        }
    }

    pub fn cash() -> Self {
        Self::new(PaymentMethod::Cash, None)
    }

    pub fn bank(name: &str) -> Self {
        Self::new(PaymentMethod::Bank, Some(name))
    }

    pub fn credit_card(name: &str) -> Self {
        Self::new(PaymentMethod::CreditCard, Some(name))
    }
}

impl Default for PaymentAccount {
    fn default() -> Self {
        Self::cash()
    }
}

impl std::fmt::Display for PaymentAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sub_identifier {
            Some(name) => write!(f, "{} ({})", self.method, name),
            None => write!(f, "{}", self.method),
        }
    }
}

/// An entry to be appended to a day record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry {
    pub kind: EntryKind,
    pub amount: f64,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub merchant: String,
    #[serde(default)]
    pub payment: PaymentAccount,
}

impl NewEntry {
    pub fn expense(amount: f64, category: &str, payment: PaymentAccount) -> Self {
        Self {
            kind: EntryKind::Expense,
            amount,
            category: category.to_string(),
            description: String::new(),
            merchant: String::new(),
            payment,
        }
    }

    pub fn income(amount: f64, category: &str, payment: PaymentAccount) -> Self {
        Self {
            kind: EntryKind::Income,
            ..Self::expense(amount, category, payment)
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_merchant(mut self, merchant: &str) -> Self {
        self.merchant = merchant.to_string();
        self
    }
}

/// A single income or expense line inside a day record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: i64,
    pub date: NaiveDate,
    pub kind: EntryKind,
    pub amount: f64,
    pub category: String,
    pub description: String,
    pub merchant: String,
    pub payment: PaymentAccount,
    /// Set only on entries generated by a transfer expansion
    pub transfer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    /// The only quantity ever summed for balances
    pub fn signed_amount(&self) -> f64 {
        self.amount * self.kind.sign() as f64
    }

    pub fn is_transfer(&self) -> bool {
        self.category == TRANSFER_CATEGORY
    }
}

/// Per-user, per-day ledger partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayRecord {
    pub user_id: String,
    pub date: NaiveDate,
    pub incomes: Vec<Entry>,
    pub expenses: Vec<Entry>,
    /// Cached; always equals the sum of `incomes`
    pub total_income: f64,
    /// Cached; always equals the sum of `expenses`
    pub total_expense: f64,
    pub updated_at: DateTime<Utc>,
}

/// Cached totals of one day record
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DayTotals {
    pub total_income: f64,
    pub total_expense: f64,
}

/// One side of a transfer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferLeg {
    pub amount: f64,
    #[serde(flatten)]
    pub payment: PaymentAccount,
}

impl TransferLeg {
    pub fn new(amount: f64, payment: PaymentAccount) -> Self {
        Self { amount, payment }
    }
}

/// Transfer request: money moving from N source legs to M destination legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTransfer {
    pub from: Vec<TransferLeg>,
    pub to: Vec<TransferLeg>,
    #[serde(default)]
    pub description: String,
}

/// A persisted transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transfer {
    pub id: i64,
    pub date: NaiveDate,
    pub description: String,
    pub from: Vec<TransferLeg>,
    pub to: Vec<TransferLeg>,
    /// Sum of the source legs
    pub total_amount: f64,
    pub created_at: DateTime<Utc>,
}

/// Result of saving a transfer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedTransfer {
    pub transfer_id: i64,
    pub entry_ids: Vec<i64>,
}

/// Monthly spending ceiling for one category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Budget {
    pub id: i64,
    pub category: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A budget joined with this month's spend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub category: String,
    pub budget: f64,
    pub spent: f64,
    pub remaining: f64,
    pub percentage: f64,
    pub is_over_budget: bool,
}

/// Severity band of a projected budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    /// Below 80% of the budget
    Silent,
    /// At or above 80%, up to 100%
    Warning,
    /// Above 100%
    OverBudget,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Warning => "warning",
            Self::OverBudget => "over_budget",
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Advisory result of projecting an incoming expense against a budget
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAlert {
    pub should_alert: bool,
    pub level: AlertLevel,
    pub category: String,
    pub budget: f64,
    pub spent: f64,
    pub projected: f64,
    pub percentage: f64,
    pub message: String,
}

/// Income/expense totals, transfers excluded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub total_income: f64,
    pub total_expense: f64,
    pub balance: f64,
    pub today_income: f64,
    pub today_expense: f64,
    pub today_balance: f64,
}

/// Net position of one (method, sub-identifier) bucket, transfers included
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentBalance {
    pub method: PaymentMethod,
    pub sub_identifier: Option<String>,
    pub total_income: f64,
    pub total_expense: f64,
    pub net_balance: f64,
}

/// Cash + bank + credit card, where credit card is negative when debt is owed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetWorth {
    pub cash: f64,
    pub bank: f64,
    pub credit_card: f64,
    pub net_worth: f64,
    pub accounts: Vec<PaymentBalance>,
}

/// Named accounts seen in the ledger
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownPaymentMethods {
    pub banks: Vec<String>,
    pub credit_cards: Vec<String>,
}

/// Categories seen in the ledger, transfers excluded
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnownCategories {
    pub income: Vec<String>,
    pub expense: Vec<String>,
}

/// Compact view of recent activity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecentContext {
    pub days: i64,
    pub lines: Vec<String>,
    pub total_income: f64,
    pub total_expense: f64,
}

/// Speaker of a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for ChatRole {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Self::User),
            "assistant" | "model" => Ok(Self::Assistant),
            _ => Err(format!("Unknown chat role: {}", s)),
        }
    }
}

impl std::fmt::Display for ChatRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}
