//! Global Bank is a simulated retail bank.
//!
//! Each account holds a balance in the primary currency (USD), balances in
//! three tokens (BTC, ETH and USDT) and an aggregate token balance. Every
//! balance change goes through a single balance mutator that records an
//! append-only ledger entry in the same transaction.
//!
//! This library provides a JSON API for the bank's front end.

#![warn(missing_docs)]

use std::{net::SocketAddr, time::Duration};

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use axum_server::Handle;
use serde_json::json;
use tokio::signal;

mod account;
mod account_lock;
mod admin;
mod app_state;
mod auth;
mod bank;
mod banking;
mod config;
mod daily_credit;
mod db;
mod endpoints;
mod exchange;
mod kyc;
mod ledger;
mod logging;
mod mining;
mod movement;
mod routing;
mod scheduled_task;
mod session_tasks;
mod settings;
mod timezone;
mod unit;

#[cfg(test)]
mod test_utils;

pub use account::{Account, AccountId, Balances, NewAccount, create_account, get_account_by_email};
pub use account_lock::AccountLocks;
pub use app_state::AppState;
pub use auth::{PasswordHash, Session, ValidatedPassword};
pub use bank::Bank;
pub use banking::{add_funds, send_crypto, send_money};
pub use config::{AdminCredentials, BankConfig};
pub use db::initialize as initialize_db;
pub use exchange::{Exchange, exchange, quote};
pub use ledger::{Direction, LedgerEntry, list_entries_for_account};
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use movement::{Movement, apply_movement};
pub use routing::build_router;
pub use unit::Unit;

/// Update the password hash of an existing account.
pub use account::update_password;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        if let Err(error) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(error) => {
                tracing::error!("Failed to install terminate signal handler: {error}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// A movement amount was zero or negative after rounding to the unit's
    /// scale, or the resulting balance would be too large to represent.
    #[error("amount must be greater than zero and within the supported range")]
    InvalidAmount,

    /// A debit was larger than the balance held in the unit.
    #[error("insufficient {0} balance")]
    InsufficientFunds(unit::Unit),

    /// The email and password did not match a registered account or the admin.
    #[error("invalid email or password")]
    InvalidCredentials,

    /// The email used to register is already in use.
    #[error("an account with this email already exists")]
    DuplicateAccount,

    /// The unit, or the exchange pair, is not supported.
    #[error("unsupported unit or exchange pair: {0}")]
    UnitNotFound(String),

    /// The password and its confirmation were different.
    #[error("passwords do not match")]
    PasswordMismatch,

    /// The user provided a password that is too easy to guess.
    #[error("password is too weak: {0}")]
    TooWeak(String),

    /// An unexpected error occurred with the underlying hashing library.
    ///
    /// The error string should only be logged for debugging on the server.
    /// When communicating with the application client this error should be
    /// replaced with a general error type indicating an internal server error.
    #[error("hashing failed: {0}")]
    HashingError(String),

    /// A date in a form could not be parsed.
    #[error("invalid date \"{0}\", expected YYYY-MM-DD")]
    InvalidDate(String),

    /// The requested resource was not found.
    ///
    /// Internally, this error may occur when a query returns no rows.
    #[error("the requested resource could not be found")]
    NotFound,

    /// The session does not have the role the operation needs.
    #[error("you do not have permission to do that")]
    Forbidden,

    /// The request has no valid auth cookie.
    #[error("you need to log in first")]
    NotLoggedIn,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// Could not acquire the exclusive-access lock of an account.
    #[error("could not acquire the lock for account {0}")]
    AccountLockError(account::AccountId),

    /// A bank-wide total was too large to represent.
    #[error("a total is too large to represent")]
    TotalOverflow,

    /// Could not acquire the lock on the registry of scheduled tasks.
    #[error("could not acquire the scheduled task lock")]
    TaskLockError,

    /// A task cadence in the bank configuration was zero.
    #[error("{0} must be longer than zero")]
    ZeroInterval(&'static str),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// An error occurred while serializing a struct as JSON
    #[error("could not serialize as JSON: {0}")]
    JSONSerializationError(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            // Code 2067 occurs when a UNIQUE constraint failed.
            rusqlite::Error::SqliteFailure(sql_error, Some(ref desc))
                if sql_error.extended_code == 2067 && desc.ends_with("account.email") =>
            {
                Error::DuplicateAccount
            }
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound,
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = match self {
            Error::InvalidAmount
            | Error::InsufficientFunds(_)
            | Error::UnitNotFound(_)
            | Error::PasswordMismatch
            | Error::TooWeak(_)
            | Error::InvalidDate(_) => StatusCode::BAD_REQUEST,
            Error::DuplicateAccount => StatusCode::CONFLICT,
            Error::InvalidCredentials | Error::NotLoggedIn => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            // Any errors that are not handled above are not intended to be shown to the client.
            error => {
                tracing::error!("An unexpected error occurred: {}", error);

                return (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({
                        "error": "an internal error occurred, check the server logs for details"
                    })),
                )
                    .into_response();
            }
        };

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
