//! Core database wrapper.
//!
//! This is the central component of the storage layer. It owns the SQLite
//! connection and runs every catalog operation as exactly one transaction,
//! wiring the caller's [`Context`] into SQLite's progress handler so a
//! cancelled operation stops between VM steps and rolls back.
//!
//! All other storage modules receive a [`Tx`] from here and never open
//! transactions themselves.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags};

use crate::config::CatalogerConfig;
use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::schema;
use crate::transaction::{Context, Tx, TxMode};

/// Errors that a store operation can surface.
///
/// Implemented by every error type that wraps [`StorageError`], so closures
/// run inside a transaction can return their own domain errors.
pub trait OperationError: From<StorageError> {
    /// attribute untagged backend failures to `operation`
    fn in_operation(self, operation: &'static str) -> Self;
}

impl OperationError for StorageError {
    fn in_operation(self, operation: &'static str) -> Self {
        StorageError::in_operation(self, operation)
    }
}

/// Handle to the catalog database.
///
/// Clone this to share across threads - it uses Arc internally. All access
/// is serialized through a single connection, which is what gives commits
/// their total order.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
    progress_ops: i32,
}

impl Store {
    /// Open the database described by `config`, creating the schema if needed.
    pub fn open(config: &CatalogerConfig) -> StorageResult<Self> {
        let conn = match &config.path {
            Some(path) => Self::open_file(path, config.create_if_missing)?,
            None => Connection::open_in_memory()?,
        };

        conn.busy_timeout(config.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", true)?;
        schema::migrate(&conn)?;

        Ok(Self {
            inner: Arc::new(StoreInner {
                conn: Mutex::new(conn),
                path: config.path.clone(),
                progress_ops: config.progress_ops,
            }),
        })
    }

    fn open_file(path: &Path, create_if_missing: bool) -> StorageResult<Connection> {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create_if_missing {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }

        let conn = Connection::open_with_flags(path, flags)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::debug!(path = %path.display(), journal_mode = %mode, "opened catalog database");
        Ok(conn)
    }

    /// Path of the database file, `None` when in memory.
    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    /// Run `f` inside a deferred (read) transaction.
    pub fn read<T, E, F>(&self, ctx: &Context, operation: &'static str, f: F) -> Result<T, E>
    where
        E: OperationError,
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
    {
        self.run(ctx, TxMode::Read, operation, f)
    }

    /// Run `f` inside an immediate (write) transaction.
    ///
    /// The transaction commits only if `f` succeeds and the context is still
    /// live afterwards. Otherwise it rolls back.
    pub fn write<T, E, F>(&self, ctx: &Context, operation: &'static str, f: F) -> Result<T, E>
    where
        E: OperationError,
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
    {
        self.run(ctx, TxMode::Write, operation, f)
    }

    fn run<T, E, F>(&self, ctx: &Context, mode: TxMode, operation: &'static str, f: F) -> Result<T, E>
    where
        E: OperationError,
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
    {
        ctx.check().map_err(|i| E::from(StorageError::from(i)))?;

        let mut conn = self.inner.conn.lock();
        conn.progress_handler(self.inner.progress_ops, Some(ctx.probe()));
        let result = Self::run_locked(&mut conn, ctx, mode, f);
        conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|err| match ctx.interrupt() {
            // whatever failed, it failed because the caller gave up
            Some(reason) => E::from(StorageError::from(reason)),
            None => err.in_operation(operation),
        })
    }

    fn run_locked<T, E, F>(conn: &mut Connection, ctx: &Context, mode: TxMode, f: F) -> Result<T, E>
    where
        E: OperationError,
        F: FnOnce(&Tx<'_>) -> Result<T, E>,
    {
        let sql_tx = conn
            .transaction_with_behavior(mode.behavior())
            .map_err(|e| E::from(StorageError::from(e)))?;

        let value = {
            let tx = Tx::new(&sql_tx, mode);
            f(&tx)?
        };

        ctx.check().map_err(|i| E::from(StorageError::from(i)))?;
        sql_tx.commit().map_err(|e| E::from(StorageError::from(e)))?;
        Ok(value)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("path", &self.inner.path).finish()
    }
}
