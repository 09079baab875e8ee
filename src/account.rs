//! Customer accounts: identity, credentials and the balances the ledger moves.
//!
//! Balances are only written by the balance mutator in [crate::movement]; this
//! module stores and loads them.

use std::fmt::Display;

use axum::{
    Extension, Json,
    extract::{FromRef, State},
};
use rusqlite::{Connection, OptionalExtension, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    AppState, Error,
    auth::{PasswordHash, Session},
    bank::Bank,
    db::get_decimal,
    ledger::Direction,
    timezone::datetime_format,
    unit::Unit,
};

/// A newtype wrapper for integer account IDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(i64);

impl AccountId {
    /// Create a new account ID.
    pub fn new(id: i64) -> Self {
        Self(id)
    }

    /// Cast the account ID to a 64 bit integer.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The amounts an account holds in each unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Balances {
    /// The primary currency balance.
    pub usd: Decimal,
    /// Bitcoin balance.
    pub btc: Decimal,
    /// Ether balance.
    pub eth: Decimal,
    /// Tether balance.
    pub usdt: Decimal,
    /// The sum of the three token balances.
    pub crypto: Decimal,
}

impl Balances {
    /// All balances at zero, as for a newly registered account.
    pub fn zero() -> Self {
        Self {
            usd: Decimal::ZERO,
            btc: Decimal::ZERO,
            eth: Decimal::ZERO,
            usdt: Decimal::ZERO,
            crypto: Decimal::ZERO,
        }
    }

    /// The balance held in `unit`.
    pub fn get(&self, unit: Unit) -> Decimal {
        match unit {
            Unit::Usd => self.usd,
            Unit::Btc => self.btc,
            Unit::Eth => self.eth,
            Unit::Usdt => self.usdt,
        }
    }

    fn get_mut(&mut self, unit: Unit) -> &mut Decimal {
        match unit {
            Unit::Usd => &mut self.usd,
            Unit::Btc => &mut self.btc,
            Unit::Eth => &mut self.eth,
            Unit::Usdt => &mut self.usdt,
        }
    }

    /// The balances after moving `amount` of `unit` in `direction`.
    ///
    /// Token movements also move the aggregate token balance by the same
    /// signed amount. `amount` is expected to be positive and already rounded
    /// to the unit's scale.
    ///
    /// # Errors
    ///
    /// - [Error::InsufficientFunds] if a debit is larger than the balance.
    /// - [Error::InvalidAmount] if a credit would overflow the balance.
    pub(crate) fn apply(
        &self,
        direction: Direction,
        unit: Unit,
        amount: Decimal,
    ) -> Result<Balances, Error> {
        let signed_amount = match direction {
            Direction::Credit => amount,
            Direction::Debit if amount > self.get(unit) => {
                return Err(Error::InsufficientFunds(unit));
            }
            Direction::Debit => -amount,
        };

        let mut next = self.clone();
        let balance = next.get_mut(unit);
        *balance = balance
            .checked_add(signed_amount)
            .ok_or(Error::InvalidAmount)?;

        if unit.is_token() {
            next.crypto = next
                .crypto
                .checked_add(signed_amount)
                .ok_or(Error::InvalidAmount)?;
        }

        Ok(next)
    }
}

/// A customer's bank account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    /// The account's ID in the application database.
    pub id: AccountId,
    /// The name shown to the customer.
    pub name: String,
    /// The login email, stored trimmed and in lower case.
    pub email: String,
    /// The bcrypt hash of the customer's password.
    #[serde(skip)]
    pub password_hash: PasswordHash,
    /// Contact phone number.
    pub phone: String,
    /// Country code given at registration.
    pub country: String,
    /// The customer facing account number, e.g. "MP1000000001".
    pub account_number: String,
    /// The SWIFT-style routing code of the branch holding the account.
    pub routing_code: String,
    /// Current balances.
    pub balances: Balances,
    /// Whether the customer has submitted their KYC details.
    pub is_verified: bool,
    /// When the account was registered.
    #[serde(with = "datetime_format")]
    pub created_at: OffsetDateTime,
}

/// The details needed to register a new account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// The name shown to the customer.
    pub name: String,
    /// The login email.
    pub email: String,
    /// Contact phone number.
    pub phone: String,
    /// Country code, used to pick the routing code.
    pub country: String,
    /// The hashed password.
    pub password_hash: PasswordHash,
}

/// Normalise an email address for storage and comparison.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// The account number shown to customers for the account with `id`.
pub fn account_number(id: AccountId) -> String {
    format!("MP{}", 1_000_000_000 + id.as_i64())
}

/// The routing code for accounts opened in `country`.
///
/// Countries without a branch use the US code.
pub fn routing_code_for(country: &str) -> &'static str {
    match country.trim().to_ascii_uppercase().as_str() {
        "UK" | "GB" => "GBIBUKLD",
        "CH" => "GBIBCHZH",
        "SG" => "GBIBSGSG",
        "NG" => "GBIBNGLA",
        _ => "GBIBUSNY",
    }
}

/// Create the account table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL,
            phone TEXT NOT NULL,
            country TEXT NOT NULL,
            routing_code TEXT NOT NULL,
            usd_balance TEXT NOT NULL,
            btc_balance TEXT NOT NULL,
            eth_balance TEXT NOT NULL,
            usdt_balance TEXT NOT NULL,
            crypto_balance TEXT NOT NULL,
            is_verified INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

const SELECT_ACCOUNT: &str = "SELECT id, name, email, password, phone, country, routing_code, \
     usd_balance, btc_balance, eth_balance, usdt_balance, crypto_balance, is_verified, created_at \
     FROM account";

fn map_account_row(row: &Row) -> Result<Account, rusqlite::Error> {
    let id = AccountId::new(row.get(0)?);
    let raw_password_hash: String = row.get(3)?;

    Ok(Account {
        id,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: PasswordHash::new_unchecked(&raw_password_hash),
        phone: row.get(4)?,
        country: row.get(5)?,
        account_number: account_number(id),
        routing_code: row.get(6)?,
        balances: Balances {
            usd: get_decimal(row, 7)?,
            btc: get_decimal(row, 8)?,
            eth: get_decimal(row, 9)?,
            usdt: get_decimal(row, 10)?,
            crypto: get_decimal(row, 11)?,
        },
        is_verified: row.get(12)?,
        created_at: row.get(13)?,
    })
}

/// Create and insert a new account with all balances at zero.
///
/// # Errors
///
/// Returns [Error::DuplicateAccount] if the email is already registered, or
/// [Error::SqlError] for other SQL errors.
pub fn create_account(new_account: NewAccount, connection: &Connection) -> Result<Account, Error> {
    let balances = Balances::zero();
    let created_at = OffsetDateTime::now_utc();

    connection
        .prepare(
            "INSERT INTO account (name, email, password, phone, country, routing_code,
                usd_balance, btc_balance, eth_balance, usdt_balance, crypto_balance,
                is_verified, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0, ?12)
             RETURNING id, name, email, password, phone, country, routing_code,
                usd_balance, btc_balance, eth_balance, usdt_balance, crypto_balance,
                is_verified, created_at",
        )?
        .query_row(
            (
                new_account.name.trim(),
                normalize_email(&new_account.email),
                new_account.password_hash.as_ref(),
                new_account.phone.trim(),
                new_account.country.trim().to_ascii_uppercase(),
                routing_code_for(&new_account.country),
                balances.usd.to_string(),
                balances.btc.to_string(),
                balances.eth.to_string(),
                balances.usdt.to_string(),
                balances.crypto.to_string(),
                created_at,
            ),
            map_account_row,
        )
        .map_err(|error| error.into())
}

/// Get the account with the ID `account_id`.
///
/// # Errors
///
/// Returns [Error::NotFound] if there is no such account, or
/// [Error::SqlError] for other SQL errors.
pub fn get_account_by_id(account_id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT} WHERE id = :id"))?
        .query_row(&[(":id", &account_id.as_i64())], map_account_row)
        .map_err(|error| error.into())
}

/// Get the account registered with `email`, if there is one.
///
/// The email is normalised before the lookup.
pub fn get_account_by_email(email: &str, connection: &Connection) -> Result<Option<Account>, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT} WHERE email = :email"))?
        .query_row(&[(":email", &normalize_email(email))], map_account_row)
        .optional()
        .map_err(|error| error.into())
}

/// Get every account, ordered by ID.
pub fn list_accounts(connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!("{SELECT_ACCOUNT} ORDER BY id ASC"))?
        .query_map([], map_account_row)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Overwrite the stored balances of `account_id`.
///
/// Only the balance mutator calls this, inside the transaction that also
/// appends the matching ledger entry.
pub(crate) fn update_balances(
    account_id: AccountId,
    balances: &Balances,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account
         SET usd_balance = ?1, btc_balance = ?2, eth_balance = ?3, usdt_balance = ?4,
             crypto_balance = ?5
         WHERE id = ?6",
        (
            balances.usd.to_string(),
            balances.btc.to_string(),
            balances.eth.to_string(),
            balances.usdt.to_string(),
            balances.crypto.to_string(),
            account_id.as_i64(),
        ),
    )?;

    match rows_affected {
        1 => Ok(()),
        _ => Err(Error::NotFound),
    }
}

/// Mark `account_id` as verified.
pub(crate) fn set_verified(account_id: AccountId, connection: &Connection) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET is_verified = 1 WHERE id = ?1",
        (account_id.as_i64(),),
    )?;

    match rows_affected {
        1 => Ok(()),
        _ => Err(Error::NotFound),
    }
}

/// Replace the password hash of `account_id`.
pub fn update_password(
    account_id: AccountId,
    password_hash: &PasswordHash,
    connection: &Connection,
) -> Result<(), Error> {
    let rows_affected = connection.execute(
        "UPDATE account SET password = ?1 WHERE id = ?2",
        (password_hash.as_ref(), account_id.as_i64()),
    )?;

    match rows_affected {
        1 => Ok(()),
        _ => Err(Error::NotFound),
    }
}

/// The state needed to show an account.
#[derive(Debug, Clone)]
pub struct AccountState {
    /// Database access.
    pub bank: Bank,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            bank: state.bank.clone(),
        }
    }
}

/// Route handler that returns the logged in customer's account.
pub async fn get_account(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Account>, Error> {
    let account_id = session.account_id()?;
    let connection = state.bank.connection()?;

    get_account_by_id(account_id, &connection).map(Json)
}
