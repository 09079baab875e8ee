#![allow(missing_docs)]

use rusqlite::Connection;

use crate::{
    AppState,
    account::NewAccount,
    auth::PasswordHash,
    config::{AdminCredentials, BankConfig},
    db::initialize,
};

/// The password of every account made by [new_test_account].
pub(crate) const TEST_PASSWORD: &str = "averysafeandsecurepassword";

/// The admin login of [get_test_app_state].
pub(crate) const TEST_ADMIN_EMAIL: &str = "owner@globalbank.test";
pub(crate) const TEST_ADMIN_PASSWORD: &str = "admin123";

/// The lowest cost bcrypt accepts, to keep tests fast.
const TEST_HASH_COST: u32 = 4;

pub(crate) fn get_test_connection() -> Connection {
    let connection = Connection::open_in_memory().expect("Could not open database in memory.");
    initialize(&connection).expect("Could not initialize database.");

    connection
}

pub(crate) fn new_test_account(email: &str) -> NewAccount {
    NewAccount {
        name: "Alice".to_owned(),
        email: email.to_owned(),
        phone: "+1 555 0100".to_owned(),
        country: "US".to_owned(),
        password_hash: PasswordHash::from_raw_password(TEST_PASSWORD, &[], TEST_HASH_COST)
            .expect("Could not hash test password."),
    }
}

pub(crate) fn get_test_app_state() -> AppState {
    AppState::new(
        Connection::open_in_memory().expect("Could not open database in memory."),
        "foobar",
        "Etc/UTC",
        BankConfig::default(),
        AdminCredentials::new(TEST_ADMIN_EMAIL, TEST_ADMIN_PASSWORD, TEST_HASH_COST)
            .expect("Could not hash admin password."),
    )
    .expect("Could not create app state.")
}
