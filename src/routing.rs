//! Application router configuration with protected and unprotected route definitions.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    AppState, Error,
    account::get_account,
    admin::get_admin_statistics,
    auth::{auth_guard, get_log_out, get_session, post_log_in, post_register},
    banking::{post_add_funds, post_bank_transfer, post_crypto_transfer},
    endpoints,
    exchange::{get_exchange_quote, post_exchange},
    kyc::post_kyc,
    ledger::get_ledger,
    mining::post_toggle_mining,
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    let unprotected_routes = Router::new()
        .route(endpoints::LOG_IN_API, post(post_log_in))
        .route(endpoints::LOG_OUT, get(get_log_out))
        .route(endpoints::USERS, post(post_register));

    let protected_routes = Router::new()
        .route(endpoints::SESSION, get(get_session))
        .route(endpoints::ACCOUNT, get(get_account))
        .route(endpoints::LEDGER, get(get_ledger))
        .route(endpoints::FUNDS, post(post_add_funds))
        .route(endpoints::BANK_TRANSFER, post(post_bank_transfer))
        .route(endpoints::CRYPTO_TRANSFER, post(post_crypto_transfer))
        .route(endpoints::EXCHANGE_QUOTE, get(get_exchange_quote))
        .route(endpoints::EXCHANGE, post(post_exchange))
        .route(endpoints::MINING, post(post_toggle_mining))
        .route(endpoints::KYC, post(post_kyc))
        .route(endpoints::ADMIN_STATISTICS, get(get_admin_statistics))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    protected_routes
        .merge(unprotected_routes)
        .fallback(get_404_not_found)
        .with_state(state)
}

async fn get_404_not_found() -> Error {
    Error::NotFound
}
