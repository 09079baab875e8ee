//! Log-out route handler that stops the customer's tasks and invalidates the auth cookie.

use axum::{
    extract::{FromRef, State},
    http::StatusCode,
};
use axum_extra::extract::{PrivateCookieJar, cookie::Key};

use crate::{
    AppState,
    auth::{Session, cookie::get_token_from_cookies, invalidate_auth_cookie},
    session_tasks::SessionTasks,
};

/// The state needed to log out.
#[derive(Debug, Clone)]
pub struct LogOutState {
    /// The key to be used for signing and encrypting private cookies.
    pub cookie_key: Key,
    /// The running tasks of logged in customers.
    pub session_tasks: SessionTasks,
}

impl FromRef<AppState> for LogOutState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            cookie_key: state.cookie_key.clone(),
            session_tasks: state.session_tasks.clone(),
        }
    }
}

// this impl tells `PrivateCookieJar` how to access the key from our state
impl FromRef<LogOutState> for Key {
    fn from_ref(state: &LogOutState) -> Self {
        state.cookie_key.clone()
    }
}

/// End the session of the logged in customer, if any, and invalidate the auth cookie.
///
/// The customer's tasks are stopped unless the account is still logged in
/// elsewhere. Succeeds even without a valid cookie so that clients can always
/// clear their session.
pub async fn get_log_out(
    State(state): State<LogOutState>,
    jar: PrivateCookieJar,
) -> (StatusCode, PrivateCookieJar) {
    if let Ok(token) = get_token_from_cookies(&jar) {
        if let Session::Customer { account_id } = token.session {
            let ended = state
                .session_tasks
                .end_session(account_id, token.session_id)
                .await;

            if let Err(error) = ended {
                tracing::error!("Could not stop the tasks of account {account_id}: {error}");
            }
        }
    }

    (StatusCode::NO_CONTENT, invalidate_auth_cookie(jar))
}
