//! The append-only ledger: one entry for every balance change.

use axum::{
    Extension, Json,
    extract::State,
};
use rusqlite::{
    Connection, Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    account::{AccountId, AccountState},
    auth::Session,
    db::get_decimal,
    timezone::datetime_format,
    unit::Unit,
};

/// Alias for the integer type used for ledger entry IDs.
pub type EntryId = i64;

/// Whether a movement adds to or takes from a balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Money in.
    Credit,
    /// Money out.
    Debit,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Direction::Credit => "credit",
            Direction::Debit => "debit",
        }
    }
}

impl ToSql for Direction {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Direction {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "credit" => Ok(Direction::Credit),
            "debit" => Ok(Direction::Debit),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// The state of a ledger entry.
///
/// Movements are rejected before anything is written, so every recorded
/// entry is complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    /// The balance change has been applied.
    Completed,
}

impl FromSql for EntryStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "completed" => Ok(EntryStatus::Completed),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

/// An immutable record of one credit or debit to one balance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
    /// The entry's ID. IDs increase in creation order.
    pub id: EntryId,
    /// The account whose balance changed.
    pub account_id: AccountId,
    /// Whether the balance went up or down.
    pub direction: Direction,
    /// The size of the change, always positive.
    pub amount: Decimal,
    /// The balance that changed.
    pub unit: Unit,
    /// What the movement was for.
    pub description: String,
    /// Always [EntryStatus::Completed].
    pub status: EntryStatus,
    /// When the movement happened.
    #[serde(with = "datetime_format")]
    pub created_at: OffsetDateTime,
}

/// The fields of a ledger entry that the caller chooses.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewEntry<'a> {
    pub account_id: AccountId,
    pub direction: Direction,
    pub amount: Decimal,
    pub unit: Unit,
    pub description: &'a str,
}

/// Create the ledger entry table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_ledger_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS ledger_entry (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            direction TEXT NOT NULL CHECK (direction IN ('credit', 'debit')),
            amount TEXT NOT NULL,
            unit TEXT NOT NULL,
            description TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'completed',
            created_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE RESTRICT
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_ledger_entry_account ON ledger_entry(account_id, id)",
        (),
    )?;

    Ok(())
}

fn map_entry_row(row: &Row) -> Result<LedgerEntry, rusqlite::Error> {
    Ok(LedgerEntry {
        id: row.get(0)?,
        account_id: AccountId::new(row.get(1)?),
        direction: row.get(2)?,
        amount: get_decimal(row, 3)?,
        unit: row.get(4)?,
        description: row.get(5)?,
        status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

/// Append a completed entry to the ledger.
///
/// Only the balance mutator calls this, in the same transaction as the
/// balance update.
pub(crate) fn append_entry(entry: NewEntry, connection: &Connection) -> Result<LedgerEntry, Error> {
    connection
        .prepare(
            "INSERT INTO ledger_entry (account_id, direction, amount, unit, description, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, 'completed', ?6)
             RETURNING id, account_id, direction, amount, unit, description, status, created_at",
        )?
        .query_row(
            (
                entry.account_id.as_i64(),
                entry.direction,
                entry.amount.to_string(),
                entry.unit,
                entry.description,
                OffsetDateTime::now_utc(),
            ),
            map_entry_row,
        )
        .map_err(|error| error.into())
}

/// Get the entries for `account_id` in the order they were created.
pub fn list_entries_for_account(
    account_id: AccountId,
    connection: &Connection,
) -> Result<Vec<LedgerEntry>, Error> {
    connection
        .prepare(
            "SELECT id, account_id, direction, amount, unit, description, status, created_at
             FROM ledger_entry
             WHERE account_id = :account_id
             ORDER BY id ASC",
        )?
        .query_map(&[(":account_id", &account_id.as_i64())], map_entry_row)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// Get the number of entries across all accounts.
pub fn count_entries(connection: &Connection) -> Result<usize, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM ledger_entry", [], |row| row.get(0))
        .map_err(|error| error.into())
}

/// Route handler that returns the logged in customer's ledger, oldest first.
pub async fn get_ledger(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
) -> Result<Json<Vec<LedgerEntry>>, Error> {
    let account_id = session.account_id()?;
    let connection = state.bank.connection()?;

    list_entries_for_account(account_id, &connection).map(Json)
}
