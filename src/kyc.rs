//! Know-your-customer submissions.
//!
//! Every submission is approved as soon as it is stored and the account is
//! marked as verified. No review step exists.

use axum::{Extension, Form, Json, extract::State, http::StatusCode};
use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime, format_description::BorrowedFormatItem, macros::format_description};

use crate::{
    Error,
    account::{AccountId, AccountState, set_verified},
    auth::Session,
    timezone::datetime_format,
};

const DATE_FORMAT: &[BorrowedFormatItem] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(date_format, Date, "[year]-[month]-[day]");

/// The identity details a customer submits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct KycForm {
    /// Legal name.
    pub full_name: String,
    /// Date of birth as YYYY-MM-DD.
    pub date_of_birth: String,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// Country.
    pub country: String,
    /// Phone number.
    pub phone: String,
}

/// A stored KYC submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KycSubmission {
    /// The submission's ID.
    pub id: i64,
    /// The account the submission is for.
    pub account_id: AccountId,
    /// Legal name.
    pub full_name: String,
    /// Date of birth.
    #[serde(with = "date_format")]
    pub date_of_birth: Date,
    /// Street address.
    pub address: String,
    /// City.
    pub city: String,
    /// Country.
    pub country: String,
    /// Phone number.
    pub phone: String,
    /// Always "approved".
    pub status: String,
    /// When the details were submitted.
    #[serde(with = "datetime_format")]
    pub submitted_at: OffsetDateTime,
}

/// Create the KYC submission table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_kyc_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS kyc_submission (
            id INTEGER PRIMARY KEY,
            account_id INTEGER NOT NULL,
            full_name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            country TEXT NOT NULL,
            phone TEXT NOT NULL,
            status TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE
        )",
        (),
    )?;

    Ok(())
}

fn map_submission_row(row: &Row) -> Result<KycSubmission, rusqlite::Error> {
    Ok(KycSubmission {
        id: row.get(0)?,
        account_id: AccountId::new(row.get(1)?),
        full_name: row.get(2)?,
        date_of_birth: row.get(3)?,
        address: row.get(4)?,
        city: row.get(5)?,
        country: row.get(6)?,
        phone: row.get(7)?,
        status: row.get(8)?,
        submitted_at: row.get(9)?,
    })
}

/// Store the KYC details of `account_id` and mark the account as verified.
///
/// # Errors
///
/// - [Error::InvalidDate] if the date of birth is not a YYYY-MM-DD date.
/// - [Error::NotFound] if the account does not exist.
pub fn submit_kyc(
    account_id: AccountId,
    form: KycForm,
    connection: &Connection,
) -> Result<KycSubmission, Error> {
    let date_of_birth = Date::parse(form.date_of_birth.trim(), DATE_FORMAT)
        .map_err(|_| Error::InvalidDate(form.date_of_birth.clone()))?;

    let transaction = connection.unchecked_transaction()?;

    let submission = transaction
        .prepare(
            "INSERT INTO kyc_submission
                (account_id, full_name, date_of_birth, address, city, country, phone, status,
                 submitted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'approved', ?8)
             RETURNING id, account_id, full_name, date_of_birth, address, city, country, phone,
                status, submitted_at",
        )?
        .query_row(
            (
                account_id.as_i64(),
                form.full_name.trim(),
                date_of_birth,
                form.address.trim(),
                form.city.trim(),
                form.country.trim(),
                form.phone.trim(),
                OffsetDateTime::now_utc(),
            ),
            map_submission_row,
        )
        .map_err(|error| match error {
            // The foreign key check fails when the account does not exist.
            rusqlite::Error::SqliteFailure(sql_error, _)
                if sql_error.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::NotFound
            }
            error => error.into(),
        })?;

    set_verified(account_id, &transaction)?;
    transaction.commit()?;

    tracing::info!("Approved KYC submission {} for account {account_id}", submission.id);

    Ok(submission)
}

/// Route handler for submitting the customer's KYC details.
pub async fn post_kyc(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
    Form(form): Form<KycForm>,
) -> Result<(StatusCode, Json<KycSubmission>), Error> {
    let account_id = session.account_id()?;
    let connection = state.bank.connection()?;

    submit_kyc(account_id, form, &connection)
        .map(|submission| (StatusCode::CREATED, Json(submission)))
}
