//! Browser session capability.
//!
//! The crawler only ever sees [`BrowserSession`]: a single stateful cursor
//! over one current page that can navigate, go back, wait for a DOM
//! condition and hand out a snapshot of the loaded document. The Chromium
//! implementation lives in [`chromium`]; tests drive the same trait with
//! canned pages.

mod chromium;
mod error;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

pub use chromium::{BrowserChoice, ChromiumSession, LaunchOptions};
pub use error::{BrowserError, BrowserResult};

/// DOM condition a session can block on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitCondition {
    /// At least one element matches the selector.
    Present(String),
    /// A matching element exists and is rendered.
    Visible(String),
}

impl WaitCondition {
    /// Presence of `selector`.
    pub fn present(selector: impl Into<String>) -> Self {
        Self::Present(selector.into())
    }

    /// Visibility of `selector`.
    pub fn visible(selector: impl Into<String>) -> Self {
        Self::Visible(selector.into())
    }

    /// The CSS selector the condition is about.
    #[must_use]
    pub fn selector(&self) -> &str {
        match self {
            Self::Present(selector) | Self::Visible(selector) => selector,
        }
    }
}

impl fmt::Display for WaitCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(selector) => write!(f, "presence of `{selector}`"),
            Self::Visible(selector) => write!(f, "visibility of `{selector}`"),
        }
    }
}

/// A cookie held by the browser after login.
///
/// The value is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    value: String,
    pub domain: String,
    pub path: String,
    pub secure: bool,
}

impl SessionCookie {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        value: impl Into<String>,
        domain: impl Into<String>,
        path: impl Into<String>,
        secure: bool,
    ) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: path.into(),
            secure,
        }
    }

    /// Cookie value (sensitive, never log).
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for SessionCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCookie")
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .field("domain", &self.domain)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .finish()
    }
}

/// Single exclusively-owned page cursor.
///
/// Every method takes `&mut self`: only one navigation may be in flight and
/// nothing else may move the cursor while the crawler's back-navigation
/// protocol is running.
#[async_trait]
pub trait BrowserSession: Send {
    /// Loads `url` and waits for the navigation to commit.
    async fn navigate(&mut self, url: &str) -> BrowserResult<()>;

    /// Returns to the previous history entry.
    async fn back(&mut self) -> BrowserResult<()>;

    /// Blocks until `condition` holds or `timeout` elapses
    /// ([`BrowserError::Timeout`]).
    async fn wait_for(&mut self, condition: &WaitCondition, timeout: Duration)
    -> BrowserResult<()>;

    /// URL of the currently loaded page.
    async fn current_url(&mut self) -> BrowserResult<String>;

    /// Serialized DOM of the currently loaded page.
    async fn page_source(&mut self) -> BrowserResult<String>;

    /// Types `text` into the first element matching `selector`.
    async fn fill(&mut self, selector: &str, text: &str) -> BrowserResult<()>;

    /// Clicks the first element matching `selector`.
    async fn click(&mut self, selector: &str) -> BrowserResult<()>;

    /// Cookies currently held for the loaded page.
    async fn cookies(&mut self) -> BrowserResult<Vec<SessionCookie>>;
}
