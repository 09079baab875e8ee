//! The balance mutator: the only code path that changes a balance.
//!
//! Every movement rounds its amount to the unit's scale, checks it, updates
//! the account's balances and appends the matching ledger entry in one
//! database transaction, inside the account's exclusive-access scope.

use rusqlite::Connection;
use rust_decimal::Decimal;

use crate::{
    Error,
    account::{AccountId, get_account_by_id, update_balances},
    account_lock::AccountLocks,
    ledger::{Direction, LedgerEntry, NewEntry, append_entry},
    unit::Unit,
};

/// A single credit or debit of one balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Movement {
    /// The account whose balance changes.
    pub account_id: AccountId,
    /// Whether the balance goes up or down.
    pub direction: Direction,
    /// The size of the change. Rounded to the unit's scale before use.
    pub amount: Decimal,
    /// The balance that changes.
    pub unit: Unit,
    /// What the movement is for, recorded in the ledger.
    pub description: String,
}

impl Movement {
    /// A movement that adds `amount` of `unit` to the account.
    pub fn credit(account_id: AccountId, amount: Decimal, unit: Unit, description: &str) -> Self {
        Self {
            account_id,
            direction: Direction::Credit,
            amount,
            unit,
            description: description.to_owned(),
        }
    }

    /// A movement that takes `amount` of `unit` from the account.
    pub fn debit(account_id: AccountId, amount: Decimal, unit: Unit, description: &str) -> Self {
        Self {
            account_id,
            direction: Direction::Debit,
            amount,
            unit,
            description: description.to_owned(),
        }
    }
}

/// Apply `movement` and return its ledger entry.
///
/// # Errors
///
/// Nothing is written if an error is returned:
/// - [Error::InvalidAmount] if the amount is not positive after rounding.
/// - [Error::NotFound] if the account does not exist.
/// - [Error::InsufficientFunds] if a debit is larger than the balance.
/// - [Error::SqlError] or [Error::AccountLockError] for unexpected failures.
pub fn apply_movement(
    movement: Movement,
    locks: &AccountLocks,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    locks.with_account(movement.account_id, || {
        let transaction = connection.unchecked_transaction()?;
        let entry = apply_movement_in_transaction(&movement, &transaction)?;
        transaction.commit()?;

        Ok(entry)
    })
}

/// Apply `movement` using `connection` as is.
///
/// The caller must already hold the account's exclusive-access scope and an
/// open transaction on `connection`, and must roll back if this returns an
/// error. Composite operations use this to group several movements into one
/// atomic step.
pub(crate) fn apply_movement_in_transaction(
    movement: &Movement,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    let amount = movement.unit.round(movement.amount);

    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount);
    }

    let account = get_account_by_id(movement.account_id, connection)?;
    let balances = account
        .balances
        .apply(movement.direction, movement.unit, amount)?;

    update_balances(account.id, &balances, connection)?;

    let entry = append_entry(
        NewEntry {
            account_id: account.id,
            direction: movement.direction,
            amount,
            unit: movement.unit,
            description: &movement.description,
        },
        connection,
    )?;

    tracing::debug!(
        "Applied {:?} of {} {} to account {}",
        entry.direction,
        entry.amount,
        entry.unit,
        entry.account_id
    );

    Ok(entry)
}
