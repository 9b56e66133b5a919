//! Constants for the download module (timeouts, shortcut format).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (3 minutes between body chunks; lecture videos are large).
pub const READ_TIMEOUT_SECS: u64 = 180;

/// First line of a synthesized link shortcut.
pub const SHORTCUT_HEADER: &str = "[InternetShortcut]";

/// User-Agent sent with every download request.
#[must_use]
pub fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("course-mirror/{version}")
}
