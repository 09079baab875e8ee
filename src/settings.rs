//! A small key-value store for application settings and markers.

use rusqlite::{Connection, OptionalExtension};

use crate::Error;

/// Create the setting table.
///
/// # Errors
///
/// This function will return an error if the SQL query failed.
pub fn create_setting_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS setting (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

/// Get the value stored under `key`, or `None` if it has never been set.
pub fn get_setting(key: &str, connection: &Connection) -> Result<Option<String>, Error> {
    connection
        .query_row(
            "SELECT value FROM setting WHERE key = :key",
            &[(":key", key)],
            |row| row.get(0),
        )
        .optional()
        .map_err(|error| error.into())
}

/// Store `value` under `key`, replacing any previous value.
pub fn set_setting(key: &str, value: &str, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO setting (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        (key, value),
    )?;

    Ok(())
}
