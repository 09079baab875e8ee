//! The daily credit: a fixed USD bonus granted at most once per account per
//! calendar day.
//!
//! The date of the last grant is kept in the settings store. The check, the
//! grant and the marker update happen in one transaction inside the account's
//! exclusive-access scope, so a failed grant leaves the marker untouched and
//! the next check retries.

use std::time::Duration;

use rusqlite::Connection;
use rust_decimal::Decimal;
use time::Date;
use tokio::time::Instant;

use crate::{
    Error,
    account::AccountId,
    account_lock::AccountLocks,
    bank::Bank,
    ledger::LedgerEntry,
    movement::{Movement, apply_movement_in_transaction},
    scheduled_task::ScheduledTask,
    settings::{get_setting, set_setting},
    timezone::local_today,
    unit::Unit,
};

/// The ledger description of a daily credit.
pub const DAILY_CREDIT_DESCRIPTION: &str = "Daily credit bonus";

/// What a daily credit check did.
#[derive(Debug, Clone, PartialEq)]
pub enum DailyCreditOutcome {
    /// The credit was granted and recorded in the ledger.
    Granted(LedgerEntry),
    /// The credit had already been granted today.
    AlreadyGranted,
}

fn marker_key(account_id: AccountId) -> String {
    format!("daily_credit.last_granted.{account_id}")
}

/// Grant `amount` USD to `account_id` unless it has already been granted on `today`.
///
/// # Errors
///
/// Returns any error from the balance mutator, in which case the marker is
/// not written.
pub fn check_daily_credit(
    account_id: AccountId,
    today: Date,
    amount: Decimal,
    locks: &AccountLocks,
    connection: &Connection,
) -> Result<DailyCreditOutcome, Error> {
    locks.with_account(account_id, || {
        let transaction = connection.unchecked_transaction()?;
        let key = marker_key(account_id);
        let today = today.to_string();

        if get_setting(&key, &transaction)?.as_deref() == Some(today.as_str()) {
            return Ok(DailyCreditOutcome::AlreadyGranted);
        }

        let entry = apply_movement_in_transaction(
            &Movement::credit(account_id, amount, Unit::Usd, DAILY_CREDIT_DESCRIPTION),
            &transaction,
        )?;
        set_setting(&key, &today, &transaction)?;
        transaction.commit()?;

        tracing::info!("Granted daily credit of {amount} USD to account {account_id} for {today}");

        Ok(DailyCreditOutcome::Granted(entry))
    })
}

/// Spawn a task that checks the daily credit of `account_id` now and then
/// every `period`, using today's date in `local_timezone`.
pub fn spawn_daily_credit_task(
    bank: Bank,
    account_id: AccountId,
    amount: Decimal,
    local_timezone: String,
    period: Duration,
) -> ScheduledTask {
    ScheduledTask::spawn("daily credit", Instant::now(), period, move || {
        let Some(today) = local_today(&local_timezone) else {
            tracing::error!("Could not get today's date for timezone \"{local_timezone}\"");
            return;
        };

        let result = bank.connection().and_then(|connection| {
            check_daily_credit(account_id, today, amount, bank.account_locks(), &connection)
        });

        match result {
            Ok(DailyCreditOutcome::Granted(_)) => {}
            Ok(DailyCreditOutcome::AlreadyGranted) => {
                tracing::debug!("Daily credit for account {account_id} already granted today");
            }
            Err(error) => {
                tracing::error!("Could not grant daily credit to account {account_id}: {error}");
            }
        }
    })
}
