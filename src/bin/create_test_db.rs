use std::error::Error;
use std::path::Path;
use std::process::exit;

use clap::Parser;
use rusqlite::Connection;
use rust_decimal_macros::dec;

use global_bank::{
    AccountLocks, Movement, NewAccount, PasswordHash, Unit, ValidatedPassword, add_funds,
    apply_movement, create_account, exchange, initialize_db, send_money,
};

/// A utility for creating a test database for the REST API server of global_bank.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to save the SQLite database to.
    #[arg(long, short)]
    output_path: String,
}

/// Create and populate a database for manual testing.
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let output_path = Path::new(&args.output_path);

    match output_path.extension() {
        None => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        Some(extension) if extension.is_empty() => {
            eprintln!("Output path must include a file extension (e.g., 'my_database.db').");
            exit(1);
        }
        _ => {}
    }

    if output_path.is_file() {
        eprintln!("File already exists at {output_path:#?}!");
        exit(1);
    }

    println!("Creating database at {output_path:#?}");
    let conn = Connection::open(output_path)?;

    initialize_db(&conn)?;

    println!("Creating test account demo@globalbank.test with the password \"test\"...");

    let password_hash = PasswordHash::new(
        ValidatedPassword::new_unchecked("test"),
        PasswordHash::DEFAULT_COST,
    )?;

    let account = create_account(
        NewAccount {
            name: "Demo Customer".to_owned(),
            email: "demo@globalbank.test".to_owned(),
            phone: "+1 555 0100".to_owned(),
            country: "US".to_owned(),
            password_hash,
        },
        &conn,
    )?;

    println!("Adding ledger entries...");

    let locks = AccountLocks::new();
    add_funds(account.id, "Card", dec!(25000), &locks, &conn)?;
    send_money(
        account.id,
        "Jane Doe",
        "SWIFT",
        dec!(1250.50),
        "Rent",
        &locks,
        &conn,
    )?;
    exchange(account.id, Unit::Usd, Unit::Btc, dec!(6666.67), &locks, &conn)?;
    exchange(account.id, Unit::Usd, Unit::Eth, dec!(3125), &locks, &conn)?;
    apply_movement(
        Movement::credit(account.id, dec!(500), Unit::Usdt, "Opening USDT balance"),
        &locks,
        &conn,
    )?;

    println!("Success!");

    Ok(())
}
