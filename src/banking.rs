//! Adding funds and sending money or tokens out of an account.
//!
//! These are thin wrappers that describe the movement and hand it to the
//! balance mutator.

use axum::{Extension, Form, Json, extract::State};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{
    Error,
    account::{AccountId, AccountState},
    account_lock::AccountLocks,
    auth::Session,
    ledger::LedgerEntry,
    movement::{Movement, apply_movement},
    unit::Unit,
};

/// Credit `amount` USD to `account_id` from an outside `source`, e.g. "Card".
pub fn add_funds(
    account_id: AccountId,
    source: &str,
    amount: Decimal,
    locks: &AccountLocks,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    apply_movement(
        Movement::credit(
            account_id,
            amount,
            Unit::Usd,
            &format!("Funds added via {}", source.trim()),
        ),
        locks,
        connection,
    )
}

/// Debit `amount` USD from `account_id` for a transfer to `recipient`.
///
/// `method` is the transfer rail shown to the customer, e.g. "SWIFT".
pub fn send_money(
    account_id: AccountId,
    recipient: &str,
    method: &str,
    amount: Decimal,
    description: &str,
    locks: &AccountLocks,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    apply_movement(
        Movement::debit(
            account_id,
            amount,
            Unit::Usd,
            &format!(
                "Transfer to {} via {} - {}",
                recipient.trim(),
                method.trim(),
                description.trim()
            ),
        ),
        locks,
        connection,
    )
}

/// Debit `amount` of the token `unit` from `account_id` for a transfer to `wallet`.
///
/// # Errors
///
/// Returns [Error::UnitNotFound] if `unit` is not a token.
pub fn send_crypto(
    account_id: AccountId,
    unit: Unit,
    wallet: &str,
    amount: Decimal,
    locks: &AccountLocks,
    connection: &Connection,
) -> Result<LedgerEntry, Error> {
    if !unit.is_token() {
        return Err(Error::UnitNotFound(unit.code().to_owned()));
    }

    apply_movement(
        Movement::debit(
            account_id,
            amount,
            unit,
            &format!("Send {unit} to {}", wallet.trim()),
        ),
        locks,
        connection,
    )
}

/// The form data for adding funds.
#[derive(Debug, Clone, Deserialize)]
pub struct AddFundsForm {
    /// Where the money comes from, e.g. "Card" or "Bank Transfer".
    pub source: String,
    /// The USD amount.
    pub amount: Decimal,
}

/// Route handler for adding funds to the customer's account.
pub async fn post_add_funds(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
    Form(form): Form<AddFundsForm>,
) -> Result<Json<LedgerEntry>, Error> {
    let account_id = session.account_id()?;
    let connection = state.bank.connection()?;

    add_funds(
        account_id,
        &form.source,
        form.amount,
        state.bank.account_locks(),
        &connection,
    )
    .map(Json)
}

/// The form data for a bank transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct BankTransferForm {
    /// Who receives the money.
    pub recipient: String,
    /// The transfer rail, e.g. "SWIFT".
    pub method: String,
    /// The USD amount.
    pub amount: Decimal,
    /// A note from the customer.
    #[serde(default)]
    pub description: String,
}

/// Route handler for sending money out of the customer's account.
pub async fn post_bank_transfer(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
    Form(form): Form<BankTransferForm>,
) -> Result<Json<LedgerEntry>, Error> {
    let account_id = session.account_id()?;
    let connection = state.bank.connection()?;

    send_money(
        account_id,
        &form.recipient,
        &form.method,
        form.amount,
        &form.description,
        state.bank.account_locks(),
        &connection,
    )
    .map(Json)
}

/// The form data for a token transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct CryptoTransferForm {
    /// The token code, e.g. "BTC".
    pub unit: String,
    /// The receiving wallet address.
    pub wallet: String,
    /// The token amount.
    pub amount: Decimal,
}

/// Route handler for sending tokens out of the customer's account.
pub async fn post_crypto_transfer(
    State(state): State<AccountState>,
    Extension(session): Extension<Session>,
    Form(form): Form<CryptoTransferForm>,
) -> Result<Json<LedgerEntry>, Error> {
    let account_id = session.account_id()?;
    let unit: Unit = form.unit.parse()?;
    let connection = state.bank.connection()?;

    send_crypto(
        account_id,
        unit,
        &form.wallet,
        form.amount,
        state.bank.account_locks(),
        &connection,
    )
    .map(Json)
}
