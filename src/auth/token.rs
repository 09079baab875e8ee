//! Defines the token struct stored in the auth cookie and how to serialize/deserialize it.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{auth::Session, timezone::datetime_format};

/// A token for authorization and authentication.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Token {
    pub session: Session,

    /// Identifies one log-in, so that clients sharing an account are told apart.
    pub session_id: Uuid,

    #[serde(with = "datetime_format")]
    pub expires_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use time::{UtcOffset, macros::datetime};
    use uuid::{Uuid, uuid};

    use crate::{
        account::AccountId,
        auth::{Session, token::Token},
    };

    const SESSION_ID: Uuid = uuid!("67e55044-10b1-426f-9247-bb680e5fe0c8");

    #[test]
    fn serialise_customer_token() {
        let expires_at = datetime!(2025-12-21 03:54:00).assume_offset(UtcOffset::UTC);
        let token = Token {
            session: Session::Customer {
                account_id: AccountId::new(1),
            },
            session_id: SESSION_ID,
            expires_at,
        };
        let expected = r#"{"session":{"role":"customer","account_id":1},"session_id":"67e55044-10b1-426f-9247-bb680e5fe0c8","expires_at":"2025-12-21 03:54:00.0 +00:00:00"}"#;

        let actual = serde_json::to_string(&token).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn deserialise_admin_token() {
        let expires_at = datetime!(2025-12-21 03:54:00).assume_offset(UtcOffset::UTC);
        let expected = Token {
            session: Session::Admin {
                email: "owner@globalbank.test".to_owned(),
            },
            session_id: SESSION_ID,
            expires_at,
        };
        let token_string = r#"{"session":{"role":"admin","email":"owner@globalbank.test"},"session_id":"67e55044-10b1-426f-9247-bb680e5fe0c8","expires_at":"2025-12-21 03:54:00.0 +00:00:00"}"#;

        let actual: Token = serde_json::from_str(token_string).unwrap();

        assert_eq!(expected, actual);
    }

    #[test]
    fn deserialise_token_with_midnight_expiry() {
        let expires_at = datetime!(2025-12-21 00:00:00).assume_offset(UtcOffset::UTC);
        let expected = Token {
            session: Session::Customer {
                account_id: AccountId::new(1),
            },
            session_id: SESSION_ID,
            expires_at,
        };
        let token_string = r#"{"session":{"role":"customer","account_id":1},"session_id":"67e55044-10b1-426f-9247-bb680e5fe0c8","expires_at":"2025-12-21 00:00:00.0 +00:00:00"}"#;

        let actual: Token = serde_json::from_str(token_string).unwrap();

        assert_eq!(expected, actual);
    }
}
