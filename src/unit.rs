//! The units an account can hold balances in and how amounts in each unit are rounded.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A currency or token that an account holds a balance in.
///
/// `Usd` is the primary currency. The other units are tokens and together
/// make up an account's aggregate token balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Unit {
    /// US dollars, the primary currency.
    Usd,
    /// Bitcoin.
    Btc,
    /// Ether.
    Eth,
    /// Tether.
    Usdt,
}

impl Unit {
    /// The three token units, in the order they are displayed.
    pub const TOKENS: [Unit; 3] = [Unit::Btc, Unit::Eth, Unit::Usdt];

    /// The unit's code, e.g. "USD".
    pub fn code(self) -> &'static str {
        match self {
            Unit::Usd => "USD",
            Unit::Btc => "BTC",
            Unit::Eth => "ETH",
            Unit::Usdt => "USDT",
        }
    }

    /// Whether the unit counts towards the aggregate token balance.
    pub fn is_token(self) -> bool {
        !matches!(self, Unit::Usd)
    }

    /// The number of decimal places amounts in this unit are kept to.
    pub fn scale(self) -> u32 {
        if self.is_token() { 8 } else { 2 }
    }

    /// Round `amount` to the unit's scale, with midpoints rounded away from zero.
    pub fn round(self, amount: Decimal) -> Decimal {
        amount.round_dp_with_strategy(self.scale(), RoundingStrategy::MidpointAwayFromZero)
    }
}

impl Display for Unit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Unit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USD" => Ok(Unit::Usd),
            "BTC" => Ok(Unit::Btc),
            "ETH" => Ok(Unit::Eth),
            "USDT" => Ok(Unit::Usdt),
            other => Err(Error::UnitNotFound(other.to_owned())),
        }
    }
}

impl ToSql for Unit {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.code()))
    }
}

impl FromSql for Unit {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|_| FromSqlError::InvalidType)
    }
}

#[cfg(test)]
mod unit_tests {
    use rust_decimal_macros::dec;

    use crate::Error;

    use super::Unit;

    #[test]
    fn parses_codes_case_insensitively() {
        assert_eq!("usd".parse::<Unit>(), Ok(Unit::Usd));
        assert_eq!(" Btc ".parse::<Unit>(), Ok(Unit::Btc));
        assert_eq!("USDT".parse::<Unit>(), Ok(Unit::Usdt));
    }

    #[test]
    fn unknown_code_is_unit_not_found() {
        assert_eq!(
            "EUR".parse::<Unit>(),
            Err(Error::UnitNotFound("EUR".to_owned()))
        );
    }

    #[test]
    fn only_usd_is_not_a_token() {
        assert!(!Unit::Usd.is_token());
        assert!(Unit::TOKENS.iter().all(|unit| unit.is_token()));
    }

    #[test]
    fn primary_currency_rounds_to_cents_away_from_zero() {
        assert_eq!(Unit::Usd.round(dec!(10.005)), dec!(10.01));
        assert_eq!(Unit::Usd.round(dec!(-10.005)), dec!(-10.01));
        assert_eq!(Unit::Usd.round(dec!(10.004)), dec!(10.00));
    }

    #[test]
    fn tokens_round_to_eight_places() {
        assert_eq!(Unit::Btc.round(dec!(0.123456785)), dec!(0.12345679));
        assert_eq!(Unit::Eth.round(dec!(0.123456784)), dec!(0.12345678));
    }
}
