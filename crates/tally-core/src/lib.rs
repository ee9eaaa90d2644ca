//! Tally Core Library
//!
//! Shared functionality for the Tally conversational ledger:
//! - Encrypted SQLite storage for day records, transfers, budgets and chat history
//! - Balance, net worth, search and budget queries
//! - Intent parsing from classifier JSON
//! - Pluggable intent classifier backends (HTTP, OpenAI-compatible, mock)
//! - Prompt and context assembly for the classifier
//! - Dispatch of intents to ledger operations
//! - Export rows, totals and CSV

pub mod classifier;
pub mod config;
pub mod context;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod export;
pub mod intent;
pub mod models;

pub use classifier::{
    ClassifierClient, ClassifierRequest, HttpClassifier, IntentClassifier, MockClassifier,
    OpenAICompatibleClassifier, Prompt,
};
pub use config::{ClassifierBackend, ClassifierConfig, LedgerConfig, ServerSettings, TallyConfig};
pub use context::{ClassifierContext, ContextAssembler};
pub use db::{Clock, Database};
pub use dispatch::{DispatchResult, Dispatcher, GroupTotal, Outcome};
pub use error::{Error, Result};
pub use export::{ExportFormat, ExportReport, ExportRequest, ExportRow};
pub use intent::{parse_intent, Classification, EntryChange, GroupBy, Intent, QueryFilter};
pub use models::*;
