//! Who a request is acting for, and how a login becomes a session.

use axum::{Extension, Json};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    account::{AccountId, get_account_by_email, normalize_email},
    config::AdminCredentials,
};

/// The identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Session {
    /// A customer acting on their own account.
    Customer {
        /// The customer's account.
        account_id: AccountId,
    },
    /// The bank's administrator.
    Admin {
        /// The email the admin logged in with.
        email: String,
    },
}

impl Session {
    /// The account the session acts on.
    ///
    /// # Errors
    ///
    /// Returns [Error::Forbidden] for the admin, who has no account.
    pub fn account_id(&self) -> Result<AccountId, Error> {
        match self {
            Session::Customer { account_id } => Ok(*account_id),
            Session::Admin { .. } => Err(Error::Forbidden),
        }
    }

    /// Whether the session belongs to the administrator.
    pub fn is_admin(&self) -> bool {
        matches!(self, Session::Admin { .. })
    }

    /// # Errors
    ///
    /// Returns [Error::Forbidden] unless the session belongs to the administrator.
    pub fn require_admin(&self) -> Result<(), Error> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(Error::Forbidden)
        }
    }
}

/// Check `email` and `password` against the admin identity and the stored accounts.
///
/// # Errors
///
/// Returns [Error::InvalidCredentials] if the email is unknown or the password
/// is wrong. The two cases are not distinguished.
pub fn log_in(
    email: &str,
    password: &str,
    admin: &AdminCredentials,
    connection: &Connection,
) -> Result<Session, Error> {
    let email = normalize_email(email);

    if email == admin.email {
        return match admin.password_hash.verify(password)? {
            true => Ok(Session::Admin { email }),
            false => Err(Error::InvalidCredentials),
        };
    }

    let account = get_account_by_email(&email, connection)?.ok_or(Error::InvalidCredentials)?;

    match account.password_hash.verify(password)? {
        true => Ok(Session::Customer {
            account_id: account.id,
        }),
        false => Err(Error::InvalidCredentials),
    }
}

/// Route handler that returns the caller's session.
pub async fn get_session(Extension(session): Extension<Session>) -> Json<Session> {
    Json(session)
}

#[cfg(test)]
mod session_tests {
    use crate::{
        Error,
        account::{AccountId, create_account},
        config::AdminCredentials,
        test_utils::{TEST_PASSWORD, get_test_connection, new_test_account},
    };

    use super::{Session, log_in};

    fn admin() -> AdminCredentials {
        AdminCredentials::new("owner@globalbank.test", "admin123", 4).unwrap()
    }

    #[test]
    fn customer_logs_in_with_any_email_case() {
        let connection = get_test_connection();
        let account = create_account(new_test_account("alice@example.com"), &connection).unwrap();

        let session = log_in(" Alice@Example.COM ", TEST_PASSWORD, &admin(), &connection);

        assert_eq!(
            session,
            Ok(Session::Customer {
                account_id: account.id
            })
        );
    }

    #[test]
    fn wrong_password_is_invalid_credentials() {
        let connection = get_test_connection();
        create_account(new_test_account("alice@example.com"), &connection).unwrap();

        let session = log_in("alice@example.com", "wrong", &admin(), &connection);

        assert_eq!(session, Err(Error::InvalidCredentials));
    }

    #[test]
    fn unknown_email_is_invalid_credentials() {
        let connection = get_test_connection();

        let session = log_in("nobody@example.com", TEST_PASSWORD, &admin(), &connection);

        assert_eq!(session, Err(Error::InvalidCredentials));
    }

    #[test]
    fn admin_logs_in_with_configured_password() {
        let connection = get_test_connection();

        let session = log_in("owner@globalbank.test", "admin123", &admin(), &connection);

        assert_eq!(
            session,
            Ok(Session::Admin {
                email: "owner@globalbank.test".to_owned()
            })
        );
        assert!(session.unwrap().is_admin());
    }

    #[test]
    fn admin_with_wrong_password_is_rejected() {
        let connection = get_test_connection();

        let session = log_in("owner@globalbank.test", TEST_PASSWORD, &admin(), &connection);

        assert_eq!(session, Err(Error::InvalidCredentials));
    }

    #[test]
    fn admin_has_no_account() {
        let session = Session::Admin {
            email: "owner@globalbank.test".to_owned(),
        };

        assert_eq!(session.account_id(), Err(Error::Forbidden));
        assert_eq!(session.require_admin(), Ok(()));
    }

    #[test]
    fn customer_is_not_admin() {
        let session = Session::Customer {
            account_id: AccountId::new(3),
        };

        assert_eq!(session.account_id(), Ok(AccountId::new(3)));
        assert_eq!(session.require_admin(), Err(Error::Forbidden));
    }
}
