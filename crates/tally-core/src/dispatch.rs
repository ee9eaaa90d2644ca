//! Intent dispatch
//!
//! Routes a checked [`Intent`] to the ledger operations and reports what
//! happened. [`Dispatcher::handle_message`] runs the whole conversational
//! pipeline: history, context, classification, dispatch, reply.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::classifier::{ClassifierClient, ClassifierRequest, IntentClassifier, Prompt};
use crate::config::{LedgerConfig, TallyConfig};
use crate::context::ContextAssembler;
use crate::db::{days_back, Database};
use crate::error::{Error, Result};
use crate::export::{ExportReport, ExportRequest};
use crate::intent::{parse_intent, Classification, EntryChange, GroupBy, Intent, QueryFilter};
use crate::models::{
    BalanceSummary, Budget, BudgetAlert, BudgetStatus, ChatRole, Entry, EntryKind, NetWorth,
    spending_key, NewEntry, PaymentBalance, SavedTransfer,
};

const NOT_UNDERSTOOD: &str = "Sorry, I couldn't understand that. Could you say it another way?";

/// Totals for one `analyze` bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupTotal {
    pub key: String,
    pub income: f64,
    pub expense: f64,
    pub count: usize,
}

/// What a dispatched intent did
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Recorded {
        entry_ids: Vec<i64>,
        /// Entries skipped for a missing or non-positive amount
        dropped: usize,
        alerts: Vec<BudgetAlert>,
    },
    Updated {
        /// `None` when there was nothing to update today
        entry: Option<Entry>,
    },
    Transferred {
        transfer: SavedTransfer,
    },
    Balance {
        summary: BalanceSummary,
        accounts: Vec<PaymentBalance>,
        net_worth: NetWorth,
    },
    Entries {
        entries: Vec<Entry>,
        /// Matches before the result limit was applied
        total_matches: usize,
        total_income: f64,
        total_expense: f64,
        groups: Vec<GroupTotal>,
    },
    BudgetSet {
        budget: Budget,
        status: Option<BudgetStatus>,
    },
    Export {
        report: ExportReport,
    },
    Chat,
    NotUnderstood {
        /// The classifier's own text when it answered in prose
        reply: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub action: String,
    pub outcome: Outcome,
    /// Text for the user
    pub message: String,
}

impl DispatchResult {
    fn not_understood(raw_reply: &str) -> Self {
        let prose = raw_reply.trim();
        let reply = (!prose.is_empty() && !prose.contains('{')).then(|| prose.to_string());
        Self {
            action: "unknown".to_string(),
            message: reply.clone().unwrap_or_else(|| NOT_UNDERSTOOD.to_string()),
            outcome: Outcome::NotUnderstood { reply },
        }
    }
}

/// Matching entries and their totals
struct QueryResult {
    entries: Vec<Entry>,
    total_matches: usize,
    total_income: f64,
    total_expense: f64,
    groups: Vec<GroupTotal>,
}

pub struct Dispatcher {
    db: Database,
    classifier: Option<ClassifierClient>,
    /// `None` means the embedded prompt
    prompt: Option<Prompt>,
    settings: LedgerConfig,
}

impl Dispatcher {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            classifier: None,
            prompt: None,
            settings: LedgerConfig::default(),
        }
    }

    /// Dispatcher wired from configuration: classifier backend, prompt override, limits
    pub fn from_config(db: Database, config: &TallyConfig) -> Result<Self> {
        let classifier = ClassifierClient::from_config(&config.classifier);
        match &classifier {
            Some(c) => info!(backend = c.name(), host = c.host(), "Intent classifier configured"),
            None => warn!("No intent classifier configured; message handling disabled"),
        }
        let prompt = Prompt::load(config.classifier.prompts_dir().as_deref())?;
        Ok(Self {
            db: db.with_chat_history_limit(config.ledger.chat_history_limit),
            classifier,
            prompt: Some(prompt),
            settings: config.ledger.clone(),
        })
    }

    pub fn with_classifier(mut self, classifier: ClassifierClient) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn with_prompt(mut self, prompt: Prompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn with_settings(mut self, settings: LedgerConfig) -> Self {
        self.settings = settings;
        self
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn classifier(&self) -> Option<&ClassifierClient> {
        self.classifier.as_ref()
    }

    pub fn settings(&self) -> &LedgerConfig {
        &self.settings
    }

    /// Run a free-text message through the classifier and dispatch the result
    ///
    /// Classifier output that cannot be parsed yields `NotUnderstood` rather
    /// than an error; nothing is written to the ledger in that case.
    pub async fn handle_message(&self, user_id: &str, text: &str) -> Result<DispatchResult> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidIntent("empty message".into()));
        }
        let classifier = self
            .classifier
            .as_ref()
            .ok_or_else(|| Error::Config("no intent classifier configured".into()))?;

        let history = self
            .db
            .get_chat_history(user_id, self.settings.chat_history_limit)?;
        self.db.save_chat_turn(user_id, ChatRole::User, text)?;

        let context = ContextAssembler::new(&self.db)
            .with_recent_days(self.settings.recent_days)
            .for_message(user_id, history)?;
        let prompt = match &self.prompt {
            Some(prompt) => prompt.clone(),
            None => Prompt::embedded()?,
        };
        let request = ClassifierRequest::build(&prompt, &context, text);

        let reply = classifier.classify(&request).await?;
        debug!(user = %user_id, backend = classifier.name(), "Classified message");

        let result = match parse_intent(&reply) {
            Ok(classification) => self.dispatch(user_id, classification)?,
            Err(e) if e.is_malformed_intent() => {
                warn!(user = %user_id, error = %e, "Classifier reply not understood");
                DispatchResult::not_understood(&reply)
            }
            Err(e) => return Err(e),
        };

        if !result.message.is_empty() {
            self.db
                .save_chat_turn(user_id, ChatRole::Assistant, &result.message)?;
        }
        Ok(result)
    }

    /// Parse raw intent JSON and dispatch it
    pub fn dispatch_json(&self, user_id: &str, raw: &str) -> Result<DispatchResult> {
        self.dispatch(user_id, parse_intent(raw)?)
    }

    /// Execute one checked intent
    pub fn dispatch(&self, user_id: &str, classification: Classification) -> Result<DispatchResult> {
        let Classification { intent, message } = classification;
        let action = intent.action().to_string();

        let outcome = match intent {
            Intent::New { entries } => self.record_entries(user_id, entries)?,
            Intent::Update { change } => self.update_last_entry(user_id, change)?,
            Intent::Transfer(transfer) => Outcome::Transferred {
                transfer: self.db.save_transfer(user_id, &transfer)?,
            },
            Intent::Balance { filter } => self.balance(user_id, filter.as_ref())?,
            Intent::Search(filter) => self.query(user_id, &filter, false)?.into(),
            Intent::Analyze(filter) => self.query(user_id, &filter, true)?.into(),
            Intent::Budget { category, amount } => {
                let budget = self.db.set_budget(user_id, &category, amount)?;
                let status = self
                    .db
                    .get_budget_status(user_id)?
                    .into_iter()
                    .find(|s| s.category == budget.category);
                Outcome::BudgetSet { budget, status }
            }
            Intent::Export(request) => {
                let days = if request.days > 0 {
                    request.days
                } else {
                    self.settings.export_days
                };
                Outcome::Export {
                    report: self.db.export_report(user_id, ExportRequest { days, ..request })?,
                }
            }
            Intent::Chat => Outcome::Chat,
        };

        let message = if message.is_empty() {
            describe(&outcome)
        } else {
            message
        };
        Ok(DispatchResult {
            action,
            outcome,
            message,
        })
    }

    fn record_entries(&self, user_id: &str, entries: Vec<NewEntry>) -> Result<Outcome> {
        let mut kept = Vec::with_capacity(entries.len());
        let mut alerts = Vec::new();
        let mut pending: HashMap<String, f64> = HashMap::new();
        let mut dropped = 0;

        for entry in entries {
            if !entry.amount.is_finite() || entry.amount <= 0.0 {
                warn!(user = %user_id, amount = entry.amount, category = %entry.category, "Dropping entry without a positive amount");
                dropped += 1;
                continue;
            }

            // Advisory: computed before the save, never blocks it. Earlier
            // expenses in the same batch count toward the projection.
            if entry.kind == EntryKind::Expense && !entry.category.trim().is_empty() {
                let earlier = pending.entry(spending_key(&entry.category)).or_insert(0.0);
                match self
                    .db
                    .check_budget_alert(user_id, &entry.category, *earlier + entry.amount)
                {
                    Ok(alert) if alert.should_alert => alerts.push(alert),
                    Ok(_) => {}
                    Err(e) => warn!(user = %user_id, category = %entry.category, error = %e, "Budget check failed"),
                }
                *earlier += entry.amount;
            }

            kept.push(entry);
        }

        let entry_ids = if kept.is_empty() {
            Vec::new()
        } else {
            self.db.save_entries(user_id, self.db.today(), &kept)?
        };

        Ok(Outcome::Recorded {
            entry_ids,
            dropped,
            alerts,
        })
    }

    fn update_last_entry(&self, user_id: &str, change: EntryChange) -> Result<Outcome> {
        let Some(last) = self.db.last_entry(user_id)? else {
            debug!(user = %user_id, "No entry today to update");
            return Ok(Outcome::Updated { entry: None });
        };

        let updated = match &change {
            EntryChange::Amount(amount) => self.db.update_entry_amount(user_id, last.id, *amount)?,
            EntryChange::PaymentMethod(payment) => {
                self.db.update_entry_payment_method(user_id, last.id, payment)?
            }
        };
        let entry = if updated {
            self.db.get_entry(user_id, last.id)?
        } else {
            None
        };
        Ok(Outcome::Updated { entry })
    }

    fn balance(&self, user_id: &str, filter: Option<&QueryFilter>) -> Result<Outcome> {
        let summary = self.db.get_balance_summary(user_id)?;
        let net_worth = self.db.get_net_worth(user_id)?;
        let mut accounts = net_worth.accounts.clone();

        if let Some(method) = filter.and_then(|f| f.payment) {
            accounts.retain(|a| a.method == method);
        }
        if let Some(name) = filter.and_then(|f| f.sub_identifier.as_deref()) {
            accounts.retain(|a| {
                a.sub_identifier
                    .as_deref()
                    .is_some_and(|s| s.eq_ignore_ascii_case(name))
            });
        }

        Ok(Outcome::Balance {
            summary,
            accounts,
            net_worth,
        })
    }

    /// Resolve a filter to entries
    ///
    /// The source of candidates is, in order: the keyword; the first
    /// category used as a keyword; an explicit date range; the last `days`.
    /// Kind, payment method and any date window then narrow the candidates,
    /// totals are taken over every match and the limit caps the list.
    fn query(&self, user_id: &str, filter: &QueryFilter, analyze: bool) -> Result<QueryResult> {
        let today = self.db.today();
        let explicit_range = filter.date_from.is_some() || filter.date_to.is_some();
        let range = if explicit_range {
            let from = filter
                .date_from
                .unwrap_or_else(|| NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or(NaiveDate::MIN));
            Some((from, filter.date_to.unwrap_or(today)))
        } else {
            filter.days.map(|days| (days_back(today, days), today))
        };

        let keyword = filter
            .keyword
            .as_deref()
            .or_else(|| filter.categories.first().map(String::as_str));

        let mut candidates = match (keyword, range) {
            (Some(keyword), _) => self.db.search_all_by_keyword(user_id, keyword)?,
            (None, Some((from, to))) => self.db.search_all_by_date_range(user_id, from, to)?,
            (None, None) => {
                let from = days_back(today, self.settings.query_days);
                self.db.search_all_by_date_range(user_id, from, today)?
            }
        };

        candidates.retain(|e| {
            let (from, to) = match range {
                Some((a, b)) if a <= b => (a, b),
                Some((a, b)) => (b, a),
                None => (NaiveDate::MIN, NaiveDate::MAX),
            };
            filter.kind.map_or(true, |k| e.kind == k)
                && filter.payment.map_or(true, |m| e.payment.method == m)
                && filter.sub_identifier.as_deref().map_or(true, |name| {
                    e.payment
                        .sub_identifier
                        .as_deref()
                        .is_some_and(|s| s.eq_ignore_ascii_case(name))
                })
                && e.date >= from
                && e.date <= to
        });

        let group_by = match filter.group_by {
            GroupBy::None if analyze => GroupBy::Category,
            other => other,
        };

        let mut total_income = 0.0;
        let mut total_expense = 0.0;
        let mut groups: BTreeMap<String, GroupTotal> = BTreeMap::new();
        for entry in candidates.iter().filter(|e| !e.is_transfer()) {
            match entry.kind {
                EntryKind::Income => total_income += entry.amount,
                EntryKind::Expense => total_expense += entry.amount,
            }
            let key = match group_by {
                GroupBy::None => continue,
                GroupBy::Category => entry.category.clone(),
                GroupBy::Date => entry.date.to_string(),
                GroupBy::Payment => entry.payment.to_string(),
            };
            let group = groups.entry(key.clone()).or_insert(GroupTotal {
                key,
                income: 0.0,
                expense: 0.0,
                count: 0,
            });
            match entry.kind {
                EntryKind::Income => group.income += entry.amount,
                EntryKind::Expense => group.expense += entry.amount,
            }
            group.count += 1;
        }

        let total_matches = candidates.len();
        let limit = filter.limit.unwrap_or(self.settings.search_limit).max(1) as usize;
        candidates.truncate(limit);

        let mut groups: Vec<GroupTotal> = groups.into_values().collect();
        if group_by != GroupBy::Date {
            groups.sort_by(|a, b| b.expense.total_cmp(&a.expense));
        }

        Ok(QueryResult {
            entries: candidates,
            total_matches,
            total_income,
            total_expense,
            groups,
        })
    }
}

impl From<QueryResult> for Outcome {
    fn from(result: QueryResult) -> Self {
        Outcome::Entries {
            entries: result.entries,
            total_matches: result.total_matches,
            total_income: result.total_income,
            total_expense: result.total_expense,
            groups: result.groups,
        }
    }
}

/// Plain confirmation for an outcome when the classifier wrote none
fn describe(outcome: &Outcome) -> String {
    match outcome {
        Outcome::Recorded {
            entry_ids, dropped, ..
        } => match (entry_ids.len(), dropped) {
            (0, _) => "Nothing to record: no amounts were given.".to_string(),
            (1, 0) => "Recorded 1 entry.".to_string(),
            (n, 0) => format!("Recorded {} entries.", n),
            (n, d) => format!("Recorded {} entries, skipped {} without an amount.", n, d),
        },
        Outcome::Updated { entry: Some(entry) } => format!(
            "Updated {} {:.2} ({}).",
            entry.category, entry.amount, entry.payment
        ),
        Outcome::Updated { entry: None } => "There is nothing from today to update.".to_string(),
        Outcome::Transferred { .. } => "Transfer recorded.".to_string(),
        Outcome::Balance { summary, .. } => format!("Balance: {:.2}", summary.balance),
        Outcome::Entries { total_matches, .. } => match total_matches {
            0 => "No matching entries.".to_string(),
            1 => "Found 1 entry.".to_string(),
            n => format!("Found {} entries.", n),
        },
        Outcome::BudgetSet { budget, .. } => {
            format!("Budget for {} set to {:.2} a month.", budget.category, budget.amount)
        }
        Outcome::Export { report } => format!(
            "Prepared {} rows for a {} export of the last {} days.",
            report.rows.len(),
            report.request.format,
            report.request.days
        ),
        Outcome::Chat => String::new(),
        Outcome::NotUnderstood { .. } => NOT_UNDERSTOOD.to_string(),
    }
}
