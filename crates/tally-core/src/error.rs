//! Error types for Tally

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    /// Classifier backend answered with an error or not at all
    #[error("Classifier unavailable: {0}")]
    Classifier(String),

    /// Classifier output that could not be turned into an intent
    #[error("Could not understand request: {0}")]
    InvalidIntent(String),

    /// Business-rule violation detected before anything was persisted
    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl Error {
    /// Storage or transport failure; the whole user action is safe to retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Pool(_) | Error::Http(_) | Error::Io(_) | Error::Classifier(_) => true,
            Error::Database(e) => matches!(
                e.sqlite_error_code(),
                Some(rusqlite::ErrorCode::DatabaseBusy)
                    | Some(rusqlite::ErrorCode::DatabaseLocked)
                    | Some(rusqlite::ErrorCode::CannotOpen)
                    | Some(rusqlite::ErrorCode::SystemIoFailure)
            ),
            _ => false,
        }
    }

    /// Invariant violation; the caller should re-prompt instead of retrying.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Error::Rejected(_))
    }

    /// Malformed or unrecognized classifier output.
    pub fn is_malformed_intent(&self) -> bool {
        matches!(self, Error::InvalidIntent(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
