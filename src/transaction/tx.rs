//! The unit-of-work handle.
//!
//! A [`Tx`] wraps the open SQLite transaction for the duration of one
//! catalog operation. Storage helpers take it explicitly, and post-commit
//! hooks receive it so their own reads and writes land in the same atomic
//! unit as the commit they observe.

use std::fmt;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior};
use ulid::Ulid;

/// How a transaction takes locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TxMode {
    /// Deferred transaction. Every statement sees one consistent snapshot
    /// and no write lock is taken.
    #[default]
    Read,

    /// Immediate transaction. The write lock is taken at `BEGIN`, so two
    /// writers never interleave and a writer never fails midway on upgrade.
    Write,
}

impl TxMode {
    pub(crate) fn behavior(&self) -> TransactionBehavior {
        match self {
            TxMode::Read => TransactionBehavior::Deferred,
            TxMode::Write => TransactionBehavior::Immediate,
        }
    }
}

impl fmt::Display for TxMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxMode::Read => write!(f, "read"),
            TxMode::Write => write!(f, "write"),
        }
    }
}

/// An open transaction against the catalog database.
pub struct Tx<'t> {
    conn: &'t Connection,
    id: String,
    mode: TxMode,
    started_at: DateTime<Utc>,
}

impl<'t> Tx<'t> {
    pub(crate) fn new(conn: &'t Connection, mode: TxMode) -> Self {
        Self {
            conn,
            id: Ulid::new().to_string().to_lowercase(),
            mode,
            started_at: Utc::now(),
        }
    }

    /// unique id of this transaction, for log correlation
    pub fn id(&self) -> &str {
        &self.id
    }

    /// the lock mode this transaction was opened with
    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// when the transaction began. commits are stamped with this time.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// the live SQL connection, inside the open transaction.
    ///
    /// Statements run here commit or roll back together with the operation.
    pub fn sql(&self) -> &'t Connection {
        self.conn
    }
}

impl fmt::Debug for Tx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tx")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .field("started_at", &self.started_at)
            .finish()
    }
}
