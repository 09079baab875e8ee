//! Shared access to the database and the per-account locks.

use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::Connection;

use crate::{
    Error,
    account_lock::AccountLocks,
    ledger::LedgerEntry,
    movement::{Movement, apply_movement},
};

/// The database connection and account locks shared by handlers and
/// scheduled tasks.
///
/// Lock order: the connection is always locked before an account lock.
#[derive(Debug, Clone)]
pub struct Bank {
    db_connection: Arc<Mutex<Connection>>,
    account_locks: AccountLocks,
}

impl Bank {
    /// Wrap an initialised database connection.
    pub fn new(connection: Connection) -> Self {
        Self {
            db_connection: Arc::new(Mutex::new(connection)),
            account_locks: AccountLocks::new(),
        }
    }

    /// Lock the database connection.
    ///
    /// # Errors
    ///
    /// Returns [Error::DatabaseLockError] if the lock is poisoned.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        self.db_connection
            .lock()
            .map_err(|_| Error::DatabaseLockError)
    }

    /// The per-account exclusive-access scopes.
    pub fn account_locks(&self) -> &AccountLocks {
        &self.account_locks
    }

    /// Lock the connection and apply `movement` through the balance mutator.
    pub fn apply_movement(&self, movement: Movement) -> Result<LedgerEntry, Error> {
        let connection = self.connection()?;

        apply_movement(movement, &self.account_locks, &connection)
    }
}
