//! Implements a struct that holds the state of the REST server.

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use rusqlite::Connection;
use sha2::{Digest, Sha512};
use time::Duration;

use crate::{
    Error,
    auth::DEFAULT_COOKIE_DURATION,
    bank::Bank,
    config::{AdminCredentials, BankConfig},
    db::initialize,
    session_tasks::SessionTasks,
    timezone::get_local_offset,
};

/// The state of the REST server.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,

    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,

    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,

    /// The database connection and the per-account locks.
    pub bank: Bank,

    /// The daily credit and mining tasks of logged in customers.
    pub session_tasks: SessionTasks,

    /// Reward amounts and task cadences.
    pub bank_config: BankConfig,

    /// The administrator identity.
    pub admin: AdminCredentials,
}

impl AppState {
    /// Create a new [AppState] with a SQLite database connection.
    ///
    /// This function will initialize the database by adding the tables for the domain models.
    /// `local_timezone` should be a valid, canonical timezone name, e.g. "Pacific/Auckland".
    ///
    /// # Errors
    /// Returns an error if the database cannot be initialized, the timezone is
    /// not known or a task cadence in `bank_config` is zero.
    pub fn new(
        db_connection: Connection,
        cookie_secret: &str,
        local_timezone: &str,
        bank_config: BankConfig,
        admin: AdminCredentials,
    ) -> Result<Self, Error> {
        if get_local_offset(local_timezone).is_none() {
            return Err(Error::InvalidTimezoneError(local_timezone.to_owned()));
        }

        if bank_config.mining_interval.is_zero() {
            return Err(Error::ZeroInterval("mining interval"));
        }

        if bank_config.daily_credit_check_interval.is_zero() {
            return Err(Error::ZeroInterval("daily credit check interval"));
        }

        initialize(&db_connection)?;

        Ok(Self {
            cookie_key: create_cookie_key(cookie_secret),
            cookie_duration: DEFAULT_COOKIE_DURATION,
            local_timezone: local_timezone.to_owned(),
            bank: Bank::new(db_connection),
            session_tasks: SessionTasks::new(),
            bank_config,
            admin,
        })
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Create a signing key for cookies from a `secret`s string.
pub fn create_cookie_key(secret: &str) -> Key {
    let hash = Sha512::digest(secret);

    Key::from(&hash)
}

#[cfg(test)]
mod app_state_tests {
    use std::time::Duration;

    use rusqlite::Connection;

    use crate::{
        Error,
        config::{AdminCredentials, BankConfig},
    };

    use super::AppState;

    fn admin() -> AdminCredentials {
        AdminCredentials::new("owner@globalbank.test", "admin123", 4).unwrap()
    }

    #[test]
    fn new_initializes_database() {
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "foobar",
            "Pacific/Auckland",
            BankConfig::default(),
            admin(),
        )
        .unwrap();

        let connection = state.bank.connection().unwrap();
        let count: i64 = connection
            .query_row("SELECT COUNT(*) FROM account", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn unknown_timezone_is_rejected() {
        let result = AppState::new(
            Connection::open_in_memory().unwrap(),
            "foobar",
            "Mars/Olympus_Mons",
            BankConfig::default(),
            admin(),
        );

        assert_eq!(
            result.err(),
            Some(Error::InvalidTimezoneError("Mars/Olympus_Mons".to_owned()))
        );
    }

    #[test]
    fn zero_mining_interval_is_rejected() {
        let result = AppState::new(
            Connection::open_in_memory().unwrap(),
            "foobar",
            "Etc/UTC",
            BankConfig {
                mining_interval: Duration::ZERO,
                ..BankConfig::default()
            },
            admin(),
        );

        assert_eq!(result.err(), Some(Error::ZeroInterval("mining interval")));
    }
}
