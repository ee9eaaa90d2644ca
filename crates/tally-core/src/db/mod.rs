//! Database access layer with connection pooling and migrations
//!
//! This module is organized by domain:
//! - `entries` - Day records and entry mutations
//! - `balances` - Balance summaries and per-payment-method views
//! - `transfers` - Multi-leg transfer expansion and reversal
//! - `budgets` - Monthly category budgets and alerts
//! - `search` - Keyword/date-range search and known accounts/categories
//! - `chat` - Bounded chat history per user

use chrono::{DateTime, Local, NaiveDate, Utc};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use tracing::info;

use crate::error::{Error, Result};

mod balances;
mod budgets;
mod chat;
mod entries;
mod search;
mod transfers;

pub use budgets::{alert_level, month_bounds, WARNING_PERCENT};
pub use search::{days_back, DEFAULT_RANGE_LIMIT, DEFAULT_SEARCH_LIMIT, MAX_CONTEXT_LINES};
pub use transfers::{validate_transfer, TRANSFER_TOLERANCE};

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConn = PooledConnection<SqliteConnectionManager>;

/// Environment variable for database encryption key
pub const DB_KEY_ENV: &str = "TALLY_DB_KEY";

/// Chat turns kept per user unless configured otherwise
pub const DEFAULT_CHAT_HISTORY_LIMIT: usize = 20;

/// Derive an encryption key from a passphrase using Argon2
///
/// Uses a fixed application salt so the same passphrase always produces the same key,
/// regardless of database path. This allows moving/renaming/restoring the database freely.
fn derive_key(passphrase: &str) -> Result<String> {
    use argon2::{password_hash::SaltString, Argon2, PasswordHasher};

    // Changing this invalidates every existing encrypted database
    const APP_SALT: &[u8; 16] = b"tally-salt-v1-fx";

    let salt = SaltString::encode_b64(APP_SALT)
        .map_err(|e| Error::Encryption(format!("Failed to create salt: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(passphrase.as_bytes(), &salt)
        .map_err(|e| Error::Encryption(format!("Failed to derive key: {}", e)))?;

    let hash_str = hash
        .hash
        .ok_or_else(|| Error::Encryption("No hash output".to_string()))?;
    Ok(hex::encode(hash_str.as_bytes()))
}

/// Parse a SQLite datetime string into a DateTime<Utc>
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    // SQLite stores as "YYYY-MM-DD HH:MM:SS" format
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored `YYYY-MM-DD` date
pub(crate) fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap_or_default()
}

/// Per-connection settings; PRAGMAs like foreign_keys do not persist in the file
fn init_connection(conn: &mut rusqlite::Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(std::time::Duration::from_secs(5))
}

/// Source of "today" for day-scoped operations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Clock {
    /// Local calendar date of the host
    #[default]
    System,
    /// Pinned date, for tests and replays
    Fixed(NaiveDate),
}

impl Clock {
    pub fn today(&self) -> NaiveDate {
        match self {
            Self::System => Local::now().date_naive(),
            Self::Fixed(date) => *date,
        }
    }
}

/// Database wrapper with connection pooling
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
    /// Path to the database file
    db_path: String,
    clock: Clock,
    chat_history_limit: usize,
}

impl Database {
    /// Create a new database connection pool with encryption
    ///
    /// Requires `TALLY_DB_KEY` environment variable to be set.
    /// Returns an error if it is not set. Use `new_unencrypted()`
    /// for development/testing without encryption.
    pub fn new(path: &str) -> Result<Self> {
        match std::env::var(DB_KEY_ENV).ok() {
            Some(key) => Self::new_with_key(path, Some(&key)),
            None => Err(Error::Encryption(format!(
                "Database encryption required. Set {} environment variable with your passphrase, \
                or use --no-encrypt for unencrypted databases.",
                DB_KEY_ENV
            ))),
        }
    }

    /// Create a new unencrypted database connection pool
    pub fn new_unencrypted(path: &str) -> Result<Self> {
        Self::new_with_key(path, None)
    }

    /// Create a new database with an explicit encryption key
    pub fn new_with_key(path: &str, passphrase: Option<&str>) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path);

        let pool = if let Some(pass) = passphrase {
            let key = derive_key(pass)?;
            let key_pragma = format!("PRAGMA key = 'x\"{}\"';", key);

            // Every pooled connection needs the key before first use
            let manager = manager.with_init(move |conn| {
                conn.execute_batch(&key_pragma)?;
                init_connection(conn)
            });

            Pool::builder().max_size(10).build(manager)?
        } else {
            let manager = manager.with_init(|conn| init_connection(conn));
            Pool::builder().max_size(10).build(manager)?
        };

        let db = Self {
            pool,
            db_path: path.to_string(),
            clock: Clock::System,
            chat_history_limit: DEFAULT_CHAT_HISTORY_LIMIT,
        };
        db.run_migrations()?;

        Ok(db)
    }

    /// Create an in-memory database (for testing)
    ///
    /// Note: Uses a temporary file rather than `:memory:` because every pooled
    /// connection must see the same data.
    pub fn in_memory() -> Result<Self> {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        let id = COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = std::env::temp_dir()
            .join(format!("tally_test_{}_{}.db", std::process::id(), id))
            .to_string_lossy()
            .to_string();

        let _ = std::fs::remove_file(&path);

        Self::new_unencrypted(&path)
    }

    /// Use a different source of "today"
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Keep at most `limit` chat turns per user
    pub fn with_chat_history_limit(mut self, limit: usize) -> Self {
        self.chat_history_limit = limit.max(1);
        self
    }

    /// Get the path to the database file
    pub fn path(&self) -> &str {
        &self.db_path
    }

    /// Current calendar date according to the configured clock
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Check if the database is encrypted
    pub fn is_encrypted(&self) -> Result<bool> {
        let conn = self.conn()?;
        // SQLCipher sets cipher_version if encryption is active
        let result: rusqlite::Result<String> =
            conn.query_row("PRAGMA cipher_version;", [], |row| row.get(0));
        Ok(result.is_ok() && std::env::var(DB_KEY_ENV).is_ok())
    }

    /// Get a connection from the pool
    pub fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside a write transaction
    ///
    /// `BEGIN IMMEDIATE` takes the write lock up front, so concurrent writers
    /// queue on `busy_timeout` instead of interleaving a read-modify-write.
    pub(crate) fn write_tx<T>(&self, f: impl FnOnce(&DbConn) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        conn.execute("BEGIN IMMEDIATE TRANSACTION", [])?;

        match f(&conn) {
            Ok(value) => {
                if let Err(e) = conn.execute("COMMIT", []) {
                    let _ = conn.execute("ROLLBACK", []);
                    return Err(e.into());
                }
                Ok(value)
            }
            Err(e) => {
                let _ = conn.execute("ROLLBACK", []);
                Err(e)
            }
        }
    }

    /// Run database migrations
    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            r#"
            -- Performance and safety settings
            PRAGMA foreign_keys = ON;
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;

            -- One ledger partition per user per calendar day
            CREATE TABLE IF NOT EXISTS day_records (
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                total_income REAL NOT NULL DEFAULT 0,
                total_expense REAL NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                PRIMARY KEY (user_id, date)
            );

            -- Income/expense lines; list order is id order
            CREATE TABLE IF NOT EXISTS entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                sign INTEGER NOT NULL CHECK (sign IN (1, -1)),
                amount REAL NOT NULL CHECK (amount >= 0),
                category TEXT NOT NULL DEFAULT '',
                description TEXT NOT NULL DEFAULT '',
                merchant TEXT NOT NULL DEFAULT '',
                method TEXT NOT NULL DEFAULT 'cash',
                sub_identifier TEXT,
                transfer_id INTEGER,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id, date) REFERENCES day_records(user_id, date) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_entries_user_date ON entries(user_id, date);
            CREATE INDEX IF NOT EXISTS idx_entries_transfer ON entries(user_id, transfer_id);

            -- Transfers reference their entries by id; they do not own them
            CREATE TABLE IF NOT EXISTS transfers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                date TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                total_amount REAL NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_transfers_user ON transfers(user_id, id);

            CREATE TABLE IF NOT EXISTS transfer_legs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                transfer_id INTEGER NOT NULL REFERENCES transfers(id) ON DELETE CASCADE,
                side TEXT NOT NULL CHECK (side IN ('from', 'to')),
                position INTEGER NOT NULL,
                amount REAL NOT NULL,
                method TEXT NOT NULL,
                sub_identifier TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_transfer_legs_transfer ON transfer_legs(transfer_id);

            CREATE TABLE IF NOT EXISTS budgets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                category TEXT NOT NULL COLLATE NOCASE,
                amount REAL NOT NULL CHECK (amount > 0),
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                UNIQUE (user_id, category)
            );

            CREATE TABLE IF NOT EXISTS chat_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            );

            CREATE INDEX IF NOT EXISTS idx_chat_history_user ON chat_history(user_id, id);
            "#,
        )?;

        info!("Database schema initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests;
