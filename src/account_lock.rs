//! Per-account exclusive-access scopes.
//!
//! Two movements on the same account must not interleave their
//! read-modify-write of a balance. Movements on different accounts never
//! wait for each other.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::{Error, account::AccountId};

/// A registry of one lock per account, created on first use.
#[derive(Debug, Clone, Default)]
pub struct AccountLocks {
    locks: Arc<Mutex<HashMap<AccountId, Arc<Mutex<()>>>>>,
}

impl AccountLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, account_id: AccountId) -> Result<Arc<Mutex<()>>, Error> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| Error::AccountLockError(account_id))?;

        Ok(locks.entry(account_id).or_default().clone())
    }

    /// Run `f` while holding the exclusive-access lock of `account_id`.
    ///
    /// Callers that also need the database connection must lock the
    /// connection first so that every caller takes the locks in the same order.
    ///
    /// # Errors
    ///
    /// Returns [Error::AccountLockError] if the lock is poisoned, otherwise
    /// whatever `f` returns.
    pub fn with_account<T>(
        &self,
        account_id: AccountId,
        f: impl FnOnce() -> Result<T, Error>,
    ) -> Result<T, Error> {
        let lock = self.lock_for(account_id)?;
        let _guard = lock
            .lock()
            .map_err(|_| Error::AccountLockError(account_id))?;

        f()
    }
}
