//! Sessions, credentials and the auth cookie.

mod cookie;
mod log_in;
mod log_out;
mod middleware;
mod password;
mod register;
mod session;
mod token;

pub use cookie::{DEFAULT_COOKIE_DURATION, invalidate_auth_cookie, set_auth_cookie};
pub use log_in::post_log_in;
pub use log_out::get_log_out;
pub use middleware::auth_guard;
pub use password::{PasswordHash, ValidatedPassword};
pub use register::post_register;
pub use session::{Session, get_session, log_in};
pub(crate) use token::Token;

#[cfg(test)]
pub(crate) use cookie::COOKIE_TOKEN;
