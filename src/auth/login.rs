//! Login sequence driven through the browser session.

use std::fmt;

use thiserror::Error;
use tracing::{info, instrument};

use crate::browser::{BrowserError, BrowserSession, SessionCookie, WaitCondition};
use crate::layout::{SiteLayout, WaitSettings};

/// Username/password pair for the LMS login form.
///
/// The password is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Password (sensitive, never log).
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    fn is_complete(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Errors that abort a run before any course is touched.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Username or password was not supplied.
    #[error("username and password are required")]
    MissingCredentials,

    /// The login form never rendered.
    #[error("login form did not load from {url}: {source}")]
    LoginForm {
        url: String,
        #[source]
        source: BrowserError,
    },

    /// Filling or submitting the form failed.
    #[error("could not submit login form: {0}")]
    Submit(#[source] BrowserError),

    /// The post-login landmark never appeared (bad credentials or layout change).
    #[error("login was not confirmed: {0}")]
    NotConfirmed(#[source] BrowserError),

    /// Session cookies could not be read back from the browser.
    #[error("could not read session cookies: {0}")]
    Cookies(#[source] BrowserError),
}

/// Drives the login form and returns the session cookies.
///
/// On success the browser is left on the post-login portal page.
///
/// # Errors
///
/// Returns [`AuthError`] when credentials are missing, the form never
/// renders, or the post-login landmark does not appear in time.
#[instrument(skip(browser, credentials, layout, waits), fields(username = %credentials.username))]
pub async fn authenticate(
    browser: &mut dyn BrowserSession,
    credentials: &Credentials,
    layout: &SiteLayout,
    waits: &WaitSettings,
) -> Result<Vec<SessionCookie>, AuthError> {
    if !credentials.is_complete() {
        return Err(AuthError::MissingCredentials);
    }

    let form_error = |source| AuthError::LoginForm {
        url: layout.base_url.clone(),
        source,
    };
    browser.navigate(&layout.base_url).await.map_err(form_error)?;
    browser
        .wait_for(
            &WaitCondition::present(layout.login_user_selector.as_str()),
            waits.login,
        )
        .await
        .map_err(form_error)?;

    browser
        .fill(&layout.login_user_selector, &credentials.username)
        .await
        .map_err(AuthError::Submit)?;
    browser
        .fill(&layout.login_password_selector, credentials.password())
        .await
        .map_err(AuthError::Submit)?;
    browser
        .click(&layout.login_submit_selector)
        .await
        .map_err(AuthError::Submit)?;

    browser
        .wait_for(
            &WaitCondition::present(layout.login_landmark_selector.as_str()),
            waits.login,
        )
        .await
        .map_err(AuthError::NotConfirmed)?;

    let cookies = browser.cookies().await.map_err(AuthError::Cookies)?;
    info!(cookies = cookies.len(), "Login confirmed");
    Ok(cookies)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_debug_redacts_password() {
        let creds = Credentials::new("s202012345", "hunter2");
        let rendered = format!("{creds:?}");
        assert!(rendered.contains("s202012345"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn test_credentials_completeness() {
        assert!(Credentials::new("user", "pw").is_complete());
        assert!(!Credentials::new("  ", "pw").is_complete());
        assert!(!Credentials::new("user", "").is_complete());
    }
}
