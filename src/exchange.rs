//! Currency exchange at fixed rates.
//!
//! The rate table lists one rate per pair of units. The reverse direction of a
//! pair uses the exact reciprocal, so every listed pair works both ways.

use axum::{
    Extension, Form, Json,
    extract::{Query, State},
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::{AccountId, AccountState},
    account_lock::AccountLocks,
    auth::Session,
    ledger::LedgerEntry,
    movement::{Movement, apply_movement_in_transaction},
    unit::Unit,
};

/// How many units of `to` one unit of `from` buys, for the listed direction
/// of each pair.
fn listed_rate(from: Unit, to: Unit) -> Option<Decimal> {
    match (from, to) {
        (Unit::Btc, Unit::Usd) => Some(dec!(66666.67)),
        (Unit::Eth, Unit::Usd) => Some(dec!(3125.00)),
        (Unit::Usdt, Unit::Usd) => Some(dec!(1.00)),
        (Unit::Btc, Unit::Eth) => Some(dec!(21.33)),
        _ => None,
    }
}

/// How many units of `to` one unit of `from` buys.
///
/// # Errors
///
/// Returns [Error::UnitNotFound] if the pair is not in the rate table,
/// including exchanging a unit for itself.
pub fn rate(from: Unit, to: Unit) -> Result<Decimal, Error> {
    listed_rate(from, to)
        .or_else(|| listed_rate(to, from).map(|rate| Decimal::ONE / rate))
        .ok_or_else(|| Error::UnitNotFound(format!("{from}/{to}")))
}

/// Convert `amount` of `from` into `to`, rounded to the scale of `to`.
///
/// # Errors
///
/// Returns [Error::UnitNotFound] for an unknown pair, or
/// [Error::InvalidAmount] if the conversion overflows.
pub fn quote(from: Unit, to: Unit, amount: Decimal) -> Result<Decimal, Error> {
    let rate = rate(from, to)?;
    let converted = amount.checked_mul(rate).ok_or(Error::InvalidAmount)?;

    Ok(to.round(converted))
}

/// The two ledger entries of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Exchange {
    /// The debit of the source unit.
    pub debit: LedgerEntry,
    /// The credit of the destination unit.
    pub credit: LedgerEntry,
}

/// Exchange `amount` of `from` for `to` at the fixed rate.
///
/// Both movements are applied in one transaction inside the account's
/// exclusive-access scope, so either both entries are recorded or neither is.
///
/// # Errors
///
/// - [Error::UnitNotFound] if the pair is not in the rate table.
/// - [Error::InvalidAmount] if the amount, or the converted amount, rounds to zero or less.
/// - [Error::InsufficientFunds] if the account holds less than `amount` of `from`.
pub fn exchange(
    account_id: AccountId,
    from: Unit,
    to: Unit,
    amount: Decimal,
    locks: &AccountLocks,
    connection: &Connection,
) -> Result<Exchange, Error> {
    rate(from, to)?;

    let amount = from.round(amount);
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount);
    }

    let converted = quote(from, to, amount)?;
    if converted <= Decimal::ZERO {
        return Err(Error::InvalidAmount);
    }

    locks.with_account(account_id, || {
        let transaction = connection.unchecked_transaction()?;

        let debit = apply_movement_in_transaction(
            &Movement::debit(account_id, amount, from, &format!("Exchange {from} to {to}")),
            &transaction,
        )?;
        let credit = apply_movement_in_transaction(
            &Movement::credit(account_id, converted, to, &format!("Exchange from {from}")),
            &transaction,
        )?;

        transaction.commit()?;

        tracing::info!("Account {account_id} exchanged {amount} {from} for {converted} {to}");

        Ok(Exchange { debit, credit })
    })
}

/// The query string of a quote request.
#[derive(Debug, Clone, Deserialize)]
pub struct QuoteQuery {
    /// The unit code to convert from.
    pub from: String,
    /// The unit code to convert to.
    pub to: String,
    /// The amount of `from` to convert.
    pub amount: Decimal,
}

/// A quote for an exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    /// The unit converted from.
    pub from: Unit,
    /// The unit converted to.
    pub to: Unit,
    /// The amount of `from`.
    pub amount: Decimal,
    /// How many units of `to` one unit of `from` buys.
    pub rate: Decimal,
    /// The amount of `to` the exchange would credit.
    pub converted: Decimal,
}

/// Route handler for quoting an exchange without moving any money.
pub async fn get_exchange_quote(Query(query): Query<QuoteQuery>) -> Result<Json<Quote>, Error> {
    let from: Unit = query.from.parse()?;
    let to: Unit = query.to.parse()?;
    let amount = from.round(query.amount);

    Ok(Json(Quote {
        from,
        to,
        amount,
        rate: rate(from, to)?,
        converted: quote(from, to, amount)?,
    }))
}

/// The form data of an exchange request.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeForm {
    /// The unit code to sell.
    pub from: String,
    /// The unit code to buy.
    pub to: String,
    /// The amount of `from` to sell.
    pub amount: Decimal,
}

/// Route handler for exchanging between two of the customer's balances.
pub async fn post_exchange(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
    Form(form): Form<ExchangeForm>,
) -> Result<Json<Exchange>, Error> {
    let account_id = session.account_id()?;
    let from: Unit = form.from.parse()?;
    let to: Unit = form.to.parse()?;
    let connection = state.bank.connection()?;

    exchange(
        account_id,
        from,
        to,
        form.amount,
        state.bank.account_locks(),
        &connection,
    )
    .map(Json)
}

#[cfg(test)]
mod rate_tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::{Error, unit::Unit};

    use super::{quote, rate};

    #[test]
    fn listed_pairs_use_the_table() {
        assert_eq!(rate(Unit::Btc, Unit::Usd), Ok(dec!(66666.67)));
        assert_eq!(rate(Unit::Eth, Unit::Usd), Ok(dec!(3125.00)));
        assert_eq!(rate(Unit::Usdt, Unit::Usd), Ok(dec!(1.00)));
        assert_eq!(rate(Unit::Btc, Unit::Eth), Ok(dec!(21.33)));
    }

    #[test]
    fn reverse_pairs_use_the_reciprocal() {
        assert_eq!(rate(Unit::Usd, Unit::Eth), Ok(Decimal::ONE / dec!(3125.00)));
        assert_eq!(rate(Unit::Eth, Unit::Btc), Ok(Decimal::ONE / dec!(21.33)));
    }

    #[test]
    fn unlisted_pairs_are_unit_not_found() {
        assert_eq!(
            rate(Unit::Eth, Unit::Usdt),
            Err(Error::UnitNotFound("ETH/USDT".to_owned()))
        );
        assert_eq!(
            rate(Unit::Usd, Unit::Usd),
            Err(Error::UnitNotFound("USD/USD".to_owned()))
        );
    }

    #[test]
    fn quote_rounds_to_destination_scale() {
        assert_eq!(quote(Unit::Btc, Unit::Usd, dec!(0.5)), Ok(dec!(33333.34)));
        assert_eq!(quote(Unit::Usd, Unit::Eth, dec!(100)), Ok(dec!(0.032)));
        assert_eq!(quote(Unit::Usd, Unit::Btc, dec!(100)), Ok(dec!(0.0015)));
    }

    #[test]
    fn usd_round_trip_stays_within_a_cent() {
        let start = dec!(100.00);

        let btc = quote(Unit::Usd, Unit::Btc, start).unwrap();
        let back = quote(Unit::Btc, Unit::Usd, btc).unwrap();

        assert!((back - start).abs() <= dec!(0.01), "got {back}");
    }

    #[test]
    fn token_round_trip_stays_within_one_unit_of_scale() {
        let start = dec!(1.23456789);

        let eth = quote(Unit::Btc, Unit::Eth, start).unwrap();
        let back = quote(Unit::Eth, Unit::Btc, eth).unwrap();

        assert!((back - start).abs() <= dec!(0.00000001), "got {back}");
    }

    #[test]
    fn every_listed_pair_round_trips_within_tolerance() {
        let pairs = [
            (Unit::Usd, Unit::Btc, dec!(250.00)),
            (Unit::Usd, Unit::Eth, dec!(250.00)),
            (Unit::Usd, Unit::Usdt, dec!(250.00)),
            (Unit::Btc, Unit::Eth, dec!(0.75)),
            (Unit::Eth, Unit::Btc, dec!(3.5)),
            (Unit::Usdt, Unit::Usd, dec!(42.42)),
        ];

        for (from, to, amount) in pairs {
            let there = quote(from, to, amount).unwrap();
            let back = quote(to, from, there).unwrap();

            // Each conversion rounds once, so the drift is bounded by half a
            // unit of scale on each side, carried through the rate.
            let half_from = dec!(0.5) * Decimal::new(1, from.scale());
            let half_to = dec!(0.5) * Decimal::new(1, to.scale());
            let tolerance = half_from + half_to * rate(to, from).unwrap();

            assert!(
                (back - amount).abs() <= tolerance,
                "{from}->{to}->{from}: started with {amount}, got {back}"
            );
        }
    }
}
