//! The log-in endpoint: checks credentials, sets the auth cookie and starts
//! the customer's daily credit.

use axum::{
    Form, Json,
    extract::{FromRef, State},
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};
use serde::Deserialize;
use time::Duration;

use crate::{
    AppState, Error,
    auth::{Session, cookie::get_token_from_cookies, log_in, set_auth_cookie},
    bank::Bank,
    config::{AdminCredentials, BankConfig},
    session_tasks::SessionTasks,
};

/// How long the auth cookie should last if the user selects "remember me" at log-in.
const REMEMBER_ME_COOKIE_DURATION: Duration = Duration::days(7);

/// The state needed to perform a login.
#[derive(Debug, Clone)]
pub struct LogInState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The duration for which cookies used for authentication are valid.
    pub cookie_duration: Duration,
    /// The local timezone as a canonical timezone name, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// Database access.
    pub bank: Bank,
    /// The running tasks of logged in customers.
    pub session_tasks: SessionTasks,
    /// The daily credit amount and cadence.
    pub bank_config: BankConfig,
    /// The admin identity.
    pub admin: AdminCredentials,
}

impl FromRef<AppState> for LogInState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            cookie_duration: state.cookie_duration,
            local_timezone: state.local_timezone.clone(),
            bank: state.bank.clone(),
            session_tasks: state.session_tasks.clone(),
            bank_config: state.bank_config.clone(),
            admin: state.admin.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogInState> for Key {
    fn from_ref(state: &LogInState) -> Self {
        state.cookie_key.clone()
    }
}

/// The raw data entered by the user in the log-in form.
#[derive(Clone, Deserialize)]
pub struct LogInForm {
    /// Email entered during log-in.
    pub email: String,

    /// Password entered during log-in.
    pub password: String,

    /// Whether to extend the initial auth cookie duration.
    ///
    /// This value comes from a checkbox, so it either has a string value or is not set.
    /// The `Some` variant should be interpreted as `true` irregardless of the
    /// string value, and the `None` variant should be interpreted as `false`.
    pub remember_me: Option<String>,
}

/// Handler for log-in requests via the POST method.
///
/// On success the auth cookie is set and the session is returned. Customers
/// also get their session registered and their daily credit task started,
/// which grants the credit for today straight away if it has not been
/// granted yet.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if the email or password is wrong.
pub async fn post_log_in(
    State(state): State<LogInState>,
    jar: PrivateCookieJar,
    Form(form): Form<LogInForm>,
) -> Result<(PrivateCookieJar, Json<Session>), Error> {
    let session = {
        let connection = state.bank.connection()?;
        log_in(&form.email, &form.password, &state.admin, &connection)
    }
    .inspect_err(|error| {
        if *error == Error::InvalidCredentials {
            tracing::warn!("Failed log-in attempt for \"{}\"", form.email.trim());
        }
    })?;

    let cookie_duration = if form.remember_me.is_some() {
        REMEMBER_ME_COOKIE_DURATION
    } else {
        state.cookie_duration
    };

    let jar = set_auth_cookie(jar, session.clone(), cookie_duration)?;

    if let Session::Customer { account_id } = session {
        let token = get_token_from_cookies(&jar)?;
        state
            .session_tasks
            .keep_alive(account_id, token.session_id, token.expires_at)?;
        state.session_tasks.start_daily_credit(
            &state.bank,
            account_id,
            &state.bank_config,
            &state.local_timezone,
        )?;
    }

    Ok((jar, Json(session)))
}
