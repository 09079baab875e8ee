//! Bank-wide statistics for the administrator.

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    AppState, Error, account::list_accounts, auth::Session, bank::Bank, ledger::count_entries,
};

/// Totals across every account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statistics {
    /// The number of registered accounts.
    pub total_accounts: usize,
    /// The sum of every USD balance.
    pub total_usd: Decimal,
    /// The sum of every aggregate token balance.
    pub total_crypto: Decimal,
    /// The number of ledger entries.
    pub total_entries: usize,
}

fn checked_sum(mut amounts: impl Iterator<Item = Decimal>) -> Result<Decimal, Error> {
    amounts
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .ok_or(Error::TotalOverflow)
}

/// Compute the bank-wide totals.
///
/// # Errors
///
/// Returns [Error::TotalOverflow] if a total is too large to represent, or
/// [Error::SqlError] if the database could not be queried.
pub fn get_statistics(connection: &Connection) -> Result<Statistics, Error> {
    let accounts = list_accounts(connection)?;

    Ok(Statistics {
        total_accounts: accounts.len(),
        total_usd: checked_sum(accounts.iter().map(|account| account.balances.usd))?,
        total_crypto: checked_sum(accounts.iter().map(|account| account.balances.crypto))?,
        total_entries: count_entries(connection)?,
    })
}

/// The state needed for the admin pages.
#[derive(Debug, Clone)]
pub struct AdminState {
    /// Database access.
    pub bank: Bank,
}

impl FromRef<AppState> for AdminState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            bank: state.bank.clone(),
        }
    }
}

/// Route handler that returns the bank-wide totals to an admin session.
pub async fn get_admin_statistics(
    State(state): State<AdminState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Statistics>, Error> {
    session.require_admin()?;
    let connection = state.bank.connection()?;

    get_statistics(&connection).map(Json)
}

#[cfg(test)]
mod statistics_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{
        Error,
        account::create_account,
        account_lock::AccountLocks,
        movement::{Movement, apply_movement},
        test_utils::{get_test_connection, new_test_account},
        unit::Unit,
    };

    use super::{Statistics, get_statistics};

    #[test]
    fn empty_bank_has_zero_totals() {
        let connection = get_test_connection();

        assert_eq!(
            get_statistics(&connection),
            Ok(Statistics {
                total_accounts: 0,
                total_usd: dec!(0),
                total_crypto: dec!(0),
                total_entries: 0,
            })
        );
    }

    #[test]
    fn totals_sum_every_account() {
        let connection = get_test_connection();
        let locks = AccountLocks::new();
        let alice = create_account(new_test_account("alice@example.com"), &connection).unwrap();
        let bob = create_account(new_test_account("bob@example.com"), &connection).unwrap();
        for movement in [
            Movement::credit(alice.id, dec!(10.50), Unit::Usd, "a"),
            Movement::credit(bob.id, dec!(4.50), Unit::Usd, "b"),
            Movement::credit(bob.id, dec!(0.25), Unit::Btc, "c"),
            Movement::credit(alice.id, dec!(1), Unit::Usdt, "d"),
        ] {
            apply_movement(movement, &locks, &connection).unwrap();
        }

        let got = get_statistics(&connection).unwrap();

        assert_eq!(got.total_accounts, 2);
        assert_eq!(got.total_usd, dec!(15.00));
        assert_eq!(got.total_crypto, dec!(1.25));
        assert_eq!(got.total_entries, 4);
    }

    #[test]
    fn total_too_large_is_an_error() {
        let connection = get_test_connection();
        let locks = AccountLocks::new();
        for email in ["alice@example.com", "bob@example.com"] {
            let account = create_account(new_test_account(email), &connection).unwrap();
            apply_movement(
                Movement::credit(account.id, Decimal::MAX, Unit::Usd, "a"),
                &locks,
                &connection,
            )
            .unwrap();
        }

        assert_eq!(get_statistics(&connection), Err(Error::TotalOverflow));
    }
}
