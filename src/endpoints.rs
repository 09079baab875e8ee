//! The API endpoints URIs.

/// The route for logging in a customer or the admin.
pub const LOG_IN_API: &str = "/api/log_in";
/// The route for the client to log out the current session.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register customer accounts.
pub const USERS: &str = "/api/users";
/// The route to get the current session.
pub const SESSION: &str = "/api/session";
/// The route to get the customer's account and balances.
pub const ACCOUNT: &str = "/api/account";
/// The route to get the customer's ledger entries.
pub const LEDGER: &str = "/api/ledger";
/// The route to add USD to the customer's account.
pub const FUNDS: &str = "/api/funds";
/// The route to send USD out of the customer's account.
pub const BANK_TRANSFER: &str = "/api/transfers/bank";
/// The route to send tokens out of the customer's account.
pub const CRYPTO_TRANSFER: &str = "/api/transfers/crypto";
/// The route to quote a conversion without moving money.
pub const EXCHANGE_QUOTE: &str = "/api/exchange/quote";
/// The route to convert between two units.
pub const EXCHANGE: &str = "/api/exchange";
/// The route to start or stop mining.
pub const MINING: &str = "/api/mining";
/// The route to submit KYC details.
pub const KYC: &str = "/api/kyc";
/// The route for the admin's bank-wide totals.
pub const ADMIN_STATISTICS: &str = "/api/admin/statistics";

// These tests are here so that we know when we call `Uri::from_shared` it will not panic.
#[cfg(test)]
mod endpoints_tests {
    use axum::http::Uri;

    use crate::endpoints;

    fn assert_endpoint_is_valid_uri(uri: &str) {
        assert!(uri.parse::<Uri>().is_ok());
    }

    #[test]
    fn endpoints_are_valid_uris() {
        assert_endpoint_is_valid_uri(endpoints::LOG_IN_API);
        assert_endpoint_is_valid_uri(endpoints::LOG_OUT);
        assert_endpoint_is_valid_uri(endpoints::USERS);
        assert_endpoint_is_valid_uri(endpoints::SESSION);
        assert_endpoint_is_valid_uri(endpoints::ACCOUNT);
        assert_endpoint_is_valid_uri(endpoints::LEDGER);
        assert_endpoint_is_valid_uri(endpoints::FUNDS);
        assert_endpoint_is_valid_uri(endpoints::BANK_TRANSFER);
        assert_endpoint_is_valid_uri(endpoints::CRYPTO_TRANSFER);
        assert_endpoint_is_valid_uri(endpoints::EXCHANGE_QUOTE);
        assert_endpoint_is_valid_uri(endpoints::EXCHANGE);
        assert_endpoint_is_valid_uri(endpoints::MINING);
        assert_endpoint_is_valid_uri(endpoints::KYC);
        assert_endpoint_is_valid_uri(endpoints::ADMIN_STATISTICS);
    }
}
