//! Operator-supplied settings: reward amounts, task cadences and the admin login.

use std::time::Duration;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::{
    Error,
    account::normalize_email,
    auth::{PasswordHash, ValidatedPassword},
};

/// Amounts and cadences for the bank's recurring credits.
#[derive(Debug, Clone, PartialEq)]
pub struct BankConfig {
    /// The USD amount granted once per calendar day.
    pub daily_credit_amount: Decimal,
    /// How often a logged in customer's daily credit is checked.
    pub daily_credit_check_interval: Duration,
    /// The BTC amount credited on every mining tick.
    pub mining_reward: Decimal,
    /// The time between mining ticks.
    pub mining_interval: Duration,
}

impl Default for BankConfig {
    fn default() -> Self {
        Self {
            daily_credit_amount: dec!(10.00),
            daily_credit_check_interval: Duration::from_secs(60 * 60),
            mining_reward: dec!(0.5),
            mining_interval: Duration::from_secs(5),
        }
    }
}

/// The single administrator identity.
///
/// The admin logs in with the configured email. There is no account row
/// for the admin, so the admin has no balances.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminCredentials {
    /// The admin's login email, normalised.
    pub email: String,
    /// The bcrypt hash of the admin password.
    pub password_hash: PasswordHash,
}

impl AdminCredentials {
    /// Hash `raw_password` for the admin with `email`.
    ///
    /// The strength check is skipped: the password comes from the operator's
    /// environment rather than a registration form.
    ///
    /// # Errors
    ///
    /// Returns [Error::HashingError] if bcrypt fails.
    pub fn new(email: &str, raw_password: &str, cost: u32) -> Result<Self, Error> {
        Ok(Self {
            email: normalize_email(email),
            password_hash: PasswordHash::new(ValidatedPassword::new_unchecked(raw_password), cost)?,
        })
    }
}
