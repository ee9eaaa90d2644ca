//! Classifier intents
//!
//! The classifier replies with loosely-shaped JSON. `RawIntent` accepts that
//! shape as-is (snake_case or camelCase keys, numbers as strings, the legacy
//! `usetype`/`bankname`/`creditcardname` fields). `Intent` is the checked
//! form the dispatcher works with: one variant per action, every payload
//! complete.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::classifier::parsing::{extract_json_object, truncate};
use crate::error::{Error, Result};
use crate::export::{ExportFormat, ExportRequest};
use crate::models::{EntryKind, NewEntry, NewTransfer, PaymentAccount, PaymentMethod, TransferLeg};

/// What to change on the last entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field", content = "value", rename_all = "snake_case")]
pub enum EntryChange {
    Amount(f64),
    PaymentMethod(PaymentAccount),
}

/// How `analyze` results are grouped
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    #[default]
    None,
    Category,
    Date,
    Payment,
}

impl std::str::FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "none" => Ok(Self::None),
            "category" | "categories" => Ok(Self::Category),
            "date" | "day" => Ok(Self::Date),
            "payment" | "usetype" | "method" | "paymentmethod" => Ok(Self::Payment),
            _ => Err(format!("Unknown grouping: {}", s)),
        }
    }
}

/// Filter for `search`, `analyze` and `balance`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    /// `None` means both incomes and expenses
    pub kind: Option<EntryKind>,
    pub categories: Vec<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub days: Option<i64>,
    pub payment: Option<PaymentMethod>,
    pub sub_identifier: Option<String>,
    pub keyword: Option<String>,
    pub group_by: GroupBy,
    pub limit: Option<i64>,
}

/// A checked ledger action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Intent {
    New { entries: Vec<NewEntry> },
    Update { change: EntryChange },
    Transfer(NewTransfer),
    Balance { filter: Option<QueryFilter> },
    Search(QueryFilter),
    Analyze(QueryFilter),
    Budget { category: String, amount: f64 },
    Export(ExportRequest),
    Chat,
}

impl Intent {
    pub fn action(&self) -> &'static str {
        match self {
            Self::New { .. } => "new",
            Self::Update { .. } => "update",
            Self::Transfer(_) => "transfer",
            Self::Balance { .. } => "balance",
            Self::Search(_) => "search",
            Self::Analyze(_) => "analyze",
            Self::Budget { .. } => "budget",
            Self::Export(_) => "export",
            Self::Chat => "chat",
        }
    }
}

/// An intent plus the classifier's reply text for the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// Accept a number, a numeric string, or null
fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<f64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    })
}

fn lenient_opt_i64<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Option<i64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

fn non_empty(s: &Option<String>) -> Option<&str> {
    s.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Payment fields shared by entries, legs and filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawPayment {
    #[serde(alias = "paymentMethod", alias = "method")]
    pub payment_method: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub usetype: Option<i64>,
    #[serde(alias = "subIdentifier")]
    pub sub_identifier: Option<String>,
    #[serde(alias = "bankName")]
    pub bankname: Option<String>,
    #[serde(alias = "creditCardName")]
    pub creditcardname: Option<String>,
}

impl RawPayment {
    /// Explicit method, else numeric code; `None` when neither is usable
    fn method(&self) -> Option<PaymentMethod> {
        non_empty(&self.payment_method)
            .and_then(|m| m.parse().ok())
            .or_else(|| self.usetype.and_then(PaymentMethod::from_code))
    }

    /// Resolve to an account, inferring the method from a bare bank/card name
    pub fn resolve(&self) -> PaymentAccount {
        let method = self.method().unwrap_or_else(|| {
            if non_empty(&self.bankname).is_some() {
                PaymentMethod::Bank
            } else if non_empty(&self.creditcardname).is_some() {
                PaymentMethod::CreditCard
            } else {
                PaymentMethod::Cash
            }
        });
        let sub = non_empty(&self.sub_identifier).or(match method {
            PaymentMethod::Bank => non_empty(&self.bankname),
            PaymentMethod::CreditCard => non_empty(&self.creditcardname),
            PaymentMethod::Cash => None,
        });
        PaymentAccount::new(method, sub)
    }

    fn is_empty(&self) -> bool {
        self.method().is_none()
            && non_empty(&self.sub_identifier).is_none()
            && non_empty(&self.bankname).is_none()
            && non_empty(&self.creditcardname).is_none()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawEntry {
    #[serde(deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub sign: Option<i64>,
    pub category: String,
    pub description: String,
    pub merchant: String,
    #[serde(flatten)]
    pub payment: RawPayment,
}

impl RawEntry {
    fn into_new_entry(self) -> NewEntry {
        let kind = self
            .sign
            .and_then(EntryKind::from_sign)
            .or_else(|| non_empty(&self.kind).and_then(|k| k.parse().ok()))
            .unwrap_or(EntryKind::Expense);
        NewEntry {
            kind,
            amount: self.amount,
            category: self.category.trim().to_string(),
            description: self.description.trim().to_string(),
            merchant: self.merchant.trim().to_string(),
            payment: self.payment.resolve(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawLeg {
    #[serde(deserialize_with = "lenient_f64")]
    pub amount: f64,
    #[serde(flatten)]
    pub payment: RawPayment,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawTransfer {
    pub from: Vec<RawLeg>,
    pub to: Vec<RawLeg>,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawQuery {
    #[serde(rename = "type", alias = "kind")]
    pub kind: Option<String>,
    pub categories: Vec<String>,
    pub category: Option<String>,
    #[serde(alias = "dateFrom")]
    pub date_from: Option<String>,
    #[serde(alias = "dateTo")]
    pub date_to: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub days: Option<i64>,
    pub keyword: Option<String>,
    #[serde(alias = "groupBy")]
    pub group_by: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub limit: Option<i64>,
    #[serde(flatten)]
    pub payment: RawPayment,
}

impl RawQuery {
    fn into_filter(self) -> QueryFilter {
        let parse_date = |s: &Option<String>| {
            non_empty(s).and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
        };
        // usetype -1 means "all methods"
        let payment = if self.payment.is_empty() || self.payment.usetype == Some(-1) {
            None
        } else {
            Some(self.payment.resolve())
        };

        let mut categories: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        if let Some(category) = non_empty(&self.category) {
            categories.insert(0, category.to_string());
        }

        QueryFilter {
            kind: non_empty(&self.kind).and_then(|k| k.parse().ok()),
            categories,
            date_from: parse_date(&self.date_from),
            date_to: parse_date(&self.date_to),
            days: self.days.filter(|d| *d > 0),
            sub_identifier: payment.as_ref().and_then(|p| p.sub_identifier.clone()),
            payment: payment.map(|p| p.method),
            keyword: non_empty(&self.keyword).map(str::to_string),
            group_by: non_empty(&self.group_by)
                .and_then(|g| g.parse().ok())
                .unwrap_or_default(),
            limit: self.limit.filter(|l| *l > 0),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawBudget {
    pub category: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub amount: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawExport {
    pub format: Option<String>,
    #[serde(deserialize_with = "lenient_opt_i64")]
    pub days: Option<i64>,
}

/// Classifier output exactly as received
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawIntent {
    pub action: String,
    #[serde(alias = "transactions")]
    pub entries: Vec<RawEntry>,
    pub transfer: Option<RawTransfer>,
    #[serde(alias = "updateField")]
    pub update_field: Option<String>,
    #[serde(alias = "updateValue")]
    pub update_value: Option<Value>,
    pub query: Option<RawQuery>,
    /// Older replies carry the search keyword at top level
    #[serde(alias = "searchQuery")]
    pub search_query: Option<String>,
    pub budget: Option<RawBudget>,
    pub export: Option<RawExport>,
    pub message: String,
}

fn update_change(field: &str, value: Option<Value>) -> Result<EntryChange> {
    let value = value.unwrap_or(Value::Null);
    let text = |v: &Value| v.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    match field.trim().to_lowercase().as_str() {
        "amount" => {
            let amount = match &value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().replace(',', "").parse().ok(),
                _ => None,
            };
            amount
                .map(EntryChange::Amount)
                .ok_or_else(|| Error::InvalidIntent(format!("update amount is not a number: {}", value)))
        }
        "paymentmethod" | "payment_method" | "payment" | "usetype" => {
            let payment = match &value {
                Value::Number(n) => n
                    .as_i64()
                    .and_then(PaymentMethod::from_code)
                    .map(|m| PaymentAccount::new(m, None)),
                Value::String(s) => s.parse::<PaymentMethod>().ok().map(|m| PaymentAccount::new(m, None)),
                Value::Object(_) => serde_json::from_value::<RawPayment>(value.clone())
                    .ok()
                    .map(|p| p.resolve()),
                _ => None,
            };
            payment
                .map(EntryChange::PaymentMethod)
                .ok_or_else(|| Error::InvalidIntent(format!("update payment method not recognized: {}", value)))
        }
        "bankname" | "bank" => text(&value)
            .map(|name| EntryChange::PaymentMethod(PaymentAccount::bank(&name)))
            .ok_or_else(|| Error::InvalidIntent("update bank name is empty".into())),
        "creditcardname" | "creditcard" | "card" => text(&value)
            .map(|name| EntryChange::PaymentMethod(PaymentAccount::credit_card(&name)))
            .ok_or_else(|| Error::InvalidIntent("update card name is empty".into())),
        other => Err(Error::InvalidIntent(format!("unknown update field: {}", other))),
    }
}

impl TryFrom<RawIntent> for Classification {
    type Error = Error;

    fn try_from(raw: RawIntent) -> Result<Self> {
        let action = raw.action.trim().to_lowercase();
        let intent = match action.as_str() {
            "new" => Intent::New {
                entries: raw.entries.into_iter().map(RawEntry::into_new_entry).collect(),
            },
            "update" => {
                let field = raw
                    .update_field
                    .ok_or_else(|| Error::InvalidIntent("update without update_field".into()))?;
                Intent::Update {
                    change: update_change(&field, raw.update_value)?,
                }
            }
            "transfer" => {
                let transfer = raw
                    .transfer
                    .ok_or_else(|| Error::InvalidIntent("transfer without legs".into()))?;
                let legs = |legs: Vec<RawLeg>| {
                    legs.into_iter()
                        .map(|l| TransferLeg::new(l.amount, l.payment.resolve()))
                        .collect()
                };
                Intent::Transfer(NewTransfer {
                    from: legs(transfer.from),
                    to: legs(transfer.to),
                    description: transfer.description.trim().to_string(),
                })
            }
            "balance" => Intent::Balance {
                filter: raw.query.map(RawQuery::into_filter),
            },
            "search" | "analyze" => {
                let mut filter = raw.query.map(RawQuery::into_filter).unwrap_or_default();
                if filter.keyword.is_none() {
                    filter.keyword = non_empty(&raw.search_query).map(str::to_string);
                }
                if action == "search" {
                    Intent::Search(filter)
                } else {
                    Intent::Analyze(filter)
                }
            }
            "budget" => {
                let budget = raw
                    .budget
                    .ok_or_else(|| Error::InvalidIntent("budget without category".into()))?;
                Intent::Budget {
                    category: budget.category.trim().to_string(),
                    amount: budget.amount,
                }
            }
            "export" => {
                let export = raw.export.unwrap_or_default();
                Intent::Export(ExportRequest {
                    format: non_empty(&export.format)
                        .and_then(|f| f.parse::<ExportFormat>().ok())
                        .unwrap_or_default(),
                    days: export.days.filter(|d| *d > 0).unwrap_or(0),
                })
            }
            "chat" => Intent::Chat,
            "" => return Err(Error::InvalidIntent("missing action".into())),
            other => return Err(Error::InvalidIntent(format!("unknown action: {}", other))),
        };

        Ok(Classification {
            intent,
            message: raw.message.trim().to_string(),
        })
    }
}

/// Parse raw classifier text into a checked intent
pub fn parse_intent(text: &str) -> Result<Classification> {
    let json = extract_json_object(text)
        .ok_or_else(|| Error::InvalidIntent("reply contains no JSON object".into()))?;

    let raw: RawIntent = serde_json::from_str(&json).map_err(|e| {
        Error::InvalidIntent(format!("malformed intent JSON: {} - {}", e, truncate(&json, 200)))
    })?;

    let classification = Classification::try_from(raw)?;
    debug!(action = classification.intent.action(), "Parsed intent");
    Ok(classification)
}
