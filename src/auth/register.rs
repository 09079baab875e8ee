//! Registration of new customer accounts.

use axum::{
    Form, Json,
    extract::{FromRef, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    account::{Account, NewAccount, create_account, normalize_email},
    auth::PasswordHash,
    bank::Bank,
};

/// The raw data entered by the user in the registration form.
#[derive(Clone, Deserialize)]
pub struct RegisterForm {
    /// The name shown to the customer.
    pub name: String,
    /// The login email.
    pub email: String,
    /// Contact phone number.
    pub phone: String,
    /// Country code, e.g. "US".
    pub country: String,
    /// The new password.
    pub password: String,
    /// The password typed a second time.
    pub confirm_password: String,
}

/// Create a customer account from `form`.
///
/// # Errors
///
/// - [Error::PasswordMismatch] if the password and its confirmation differ.
/// - [Error::DuplicateAccount] if the email is taken, including by the admin.
/// - [Error::TooWeak] if the password is easy to guess.
pub fn register(
    form: RegisterForm,
    admin_email: &str,
    connection: &Connection,
) -> Result<Account, Error> {
    if form.password != form.confirm_password {
        return Err(Error::PasswordMismatch);
    }

    let email = normalize_email(&form.email);
    if email == admin_email {
        return Err(Error::DuplicateAccount);
    }

    let name = form.name.trim();
    let password_hash = PasswordHash::from_raw_password(
        &form.password,
        &[&email, name],
        PasswordHash::DEFAULT_COST,
    )?;

    let account = create_account(
        NewAccount {
            name: name.to_owned(),
            email,
            phone: form.phone.trim().to_owned(),
            country: form.country.trim().to_owned(),
            password_hash,
        },
        connection,
    )?;

    tracing::info!("Registered account {}", account.id);

    Ok(account)
}

/// The state needed for creating a new account.
#[derive(Debug, Clone)]
pub struct RegistrationState {
    /// Database access.
    pub bank: Bank,
    /// The admin's email, which customers may not register with.
    pub admin_email: String,
}

impl FromRef<AppState> for RegistrationState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            bank: state.bank.clone(),
            admin_email: state.admin.email.clone(),
        }
    }
}

/// Route handler for registering a new customer account.
pub async fn post_register(
    State(state): State<RegistrationState>,
    Form(form): Form<RegisterForm>,
) -> Result<(StatusCode, Json<Account>), Error> {
    let connection = state.bank.connection()?;

    register(form, &state.admin_email, &connection).map(|account| (StatusCode::CREATED, Json(account)))
}
