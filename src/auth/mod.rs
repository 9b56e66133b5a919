//! Authentication and session cookie hand-off.
//!
//! The authenticator drives the login form through the browser; the cookies
//! it returns are copied into a `reqwest` jar so downloads never need the
//! browser.

mod cookies;
mod login;

pub use cookies::load_session_cookies_into_jar;
pub use login::{AuthError, Credentials, authenticate};
