//! SQLite connection handle and scoped units of work

use super::error::{StorageError, StorageResult};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// How long a statement waits for another writer before failing with `SQLITE_BUSY`.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite-backed database shared by capture and reduction.
///
/// Thread-safe via internal mutex on the connection. Opening a database
/// never creates tables: the schema is provisioned out-of-band through
/// [`crate::storage::schema::provision`].
///
/// All writes go through [`Database::with_transaction`], which begins an
/// `IMMEDIATE` transaction. The write lock is taken up front, so two units of
/// work touching the same checkpoint row or unique key (even from separate
/// processes sharing the file) are serialized by SQLite rather than racing.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open a database file, creating the parent directory if needed.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::configure(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open a private in-memory database (useful for testing).
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn configure(conn: &Connection) -> StorageResult<()> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Readers keep working while a unit of work holds the write lock
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    /// A panic inside an earlier unit of work poisons the mutex, but its
    /// transaction was rolled back when it unwound, so the connection is
    /// still consistent and the guard is taken back.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` as one atomic unit of work.
    ///
    /// Commits when `f` returns `Ok`. On `Err`, or if `f` unwinds, the
    /// transaction is dropped and SQLite rolls every statement back. The
    /// connection is held only for the duration of the call.
    pub fn with_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T, E>,
        E: From<StorageError>,
    {
        let mut conn = self.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(StorageError::from)?;

        let value = f(&tx)?;
        tx.commit().map_err(StorageError::from)?;
        Ok(value)
    }

    /// Run `f` against the bare connection, outside any explicit transaction.
    ///
    /// Used for provisioning and read-only inspection.
    pub fn with_connection<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&Connection) -> Result<T, E>,
        E: From<StorageError>,
    {
        let conn = self.lock();
        f(&conn)
    }
}
