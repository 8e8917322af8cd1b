//! SQLite persistence for orders, the action audit log, and policy.
//!
//! One database file, three tables:
//!
//! ```text
//! orders          # the contended rows; status + assignment live here
//! order_actions   # append-only audit log, indexed for cooldown lookups
//! group_settings  # per-group admission policy, read-mostly
//! ```
//!
//! Every operation opens its own connection (WAL journal mode,
//! `busy_timeout` = the configured lock wait), so a [`Storage`] can be
//! shared freely across request threads. The accept path runs inside an
//! immediate transaction: the write lock is taken up front and held to
//! commit, which is what serializes concurrent claims. A claim that
//! cannot get the lock within the wait fails [`StorageError::Busy`] —
//! "could not acquire" — which callers must keep distinct from losing
//! the race after acquiring.

pub(crate) mod action;
pub(crate) mod order;
pub(crate) mod policy;

use std::path::PathBuf;
use std::time::Duration;
use std::{fs, io};

use jiff::Timestamp;
use rusqlite::{Connection, Transaction, TransactionBehavior};

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The database write lock was not acquired within the lock wait.
    /// Retryable: the attempt never reached the order row.
    #[error("storage is busy; try again")]
    Busy,

    /// A persisted row no longer maps onto the model.
    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),
}

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        // SQLITE_BUSY / SQLITE_LOCKED mean the busy timeout elapsed
        // without the lock; everything else is a real fault.
        match e.sqlite_error_code() {
            Some(rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked) => {
                Self::Busy
            }
            _ => Self::Sqlite(e),
        }
    }
}

pub type Result<T> = core::result::Result<T, StorageError>;

/// How long a writer waits for the database lock before giving up.
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS orders (
    order_id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    message_id                  INTEGER NOT NULL,
    customer_name               TEXT,
    delivery_location           TEXT,
    note                        TEXT,
    cost                        INTEGER,
    status                      TEXT NOT NULL DEFAULT 'open',
    assigned_driver_id          INTEGER,
    completed_cost              INTEGER,
    completed_delivery_location TEXT,
    driver_note                 TEXT,
    created_at                  INTEGER NOT NULL,
    updated_at                  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS order_actions (
    action_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    order_id   INTEGER NOT NULL,
    driver_id  INTEGER NOT NULL,
    action     TEXT NOT NULL,
    action_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS group_settings (
    group_id              INTEGER PRIMARY KEY,
    enable_cooldown       INTEGER NOT NULL,
    cooldown_minutes      INTEGER NOT NULL,
    max_orders_per_driver INTEGER NOT NULL
);

-- Cooldown lookup: a driver's most recent action across all orders.
CREATE INDEX IF NOT EXISTS idx_actions_driver_at
    ON order_actions (driver_id, action_at DESC);

-- Capacity count: a driver's orders in active statuses.
CREATE INDEX IF NOT EXISTS idx_orders_driver_status
    ON orders (assigned_driver_id, status);
";

/// Handle to the courier database.
///
/// Cheap to clone and share; every call opens its own connection.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
    lock_wait: Duration,
}

impl Storage {
    /// Opens the database at `path`, creating the file and schema if
    /// needed, with the default lock wait.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_lock_wait(path, DEFAULT_LOCK_WAIT)
    }

    /// Opens the database with an explicit lock wait bound.
    pub fn open_with_lock_wait(path: impl Into<PathBuf>, lock_wait: Duration) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let storage = Self { path, lock_wait };
        let conn = storage.connect()?;
        conn.execute_batch(SCHEMA)?;
        Ok(storage)
    }

    /// Returns the default database path: `~/.courier/courier.sqlite`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".courier").join("courier.sqlite"))
    }

    pub(crate) fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(self.lock_wait)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Ok(conn)
    }
}

/// Begins the claim unit of work: an immediate transaction, so the
/// write lock is held from the first read through commit.
pub(crate) fn claim_transaction(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

// ── Timestamp columns ──

// Timestamps are stored as integer milliseconds so range filters and
// ORDER BY work in SQL.

pub(crate) fn ts_to_ms(t: Timestamp) -> i64 {
    t.as_millisecond()
}

pub(crate) fn ms_to_ts(ms: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(ms)
        .map_err(|e| StorageError::Corrupt(format!("invalid timestamp {ms}: {e}")))
}
