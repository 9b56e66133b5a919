//! Seeds a `reqwest::cookie::Jar` from the browser's post-login cookies.
//!
//! The materializer's HTTP client never talks to the browser; it is handed a
//! copy of every session cookie before the first request is issued.

use std::sync::Arc;

use reqwest::cookie::Jar;
use tracing::{debug, instrument, warn};

use crate::browser::SessionCookie;

/// Loads session cookies into a `reqwest::cookie::Jar`.
///
/// Each cookie is converted to a `Set-Cookie` header string and added to the
/// jar with an origin URL built from its domain and path.
///
/// # Returns
///
/// An `Arc<Jar>` suitable for passing to `reqwest::ClientBuilder::cookie_provider()`.
#[instrument(level = "debug", skip(cookies), fields(count = cookies.len()))]
pub fn load_session_cookies_into_jar(cookies: &[SessionCookie]) -> Arc<Jar> {
    let jar = Arc::new(Jar::default());

    for cookie in cookies {
        let set_cookie = build_set_cookie_string(cookie);
        let origin_url = build_origin_url(cookie);

        if let Ok(url) = origin_url.parse::<url::Url>() {
            jar.add_cookie_str(&set_cookie, &url);
            debug!(
                domain = %cookie.domain,
                name = %cookie.name,
                "loaded cookie into jar"
            );
        } else {
            warn!(
                domain = %cookie.domain,
                name = %cookie.name,
                "skipping cookie with unparseable domain"
            );
        }
    }

    jar
}

/// Builds a `Set-Cookie` header string from a browser cookie.
///
/// Host-only cookies (no leading dot) get no `Domain` attribute so they stay
/// bound to the exact origin host.
fn build_set_cookie_string(cookie: &SessionCookie) -> String {
    let mut parts = vec![format!("{}={}", cookie.name, cookie.value())];

    if cookie.domain.starts_with('.') {
        parts.push(format!("Domain={}", cookie.domain));
    }

    let path = if cookie.path.is_empty() {
        "/"
    } else {
        &cookie.path
    };
    parts.push(format!("Path={path}"));

    if cookie.secure {
        parts.push("Secure".to_string());
    }

    parts.join("; ")
}

/// Builds the origin URL for `Jar::add_cookie_str`.
///
/// Uses `https://` for secure cookies and `http://` otherwise; the leading dot
/// of a domain cookie is stripped.
fn build_origin_url(cookie: &SessionCookie) -> String {
    let scheme = if cookie.secure { "https" } else { "http" };
    let domain = cookie.domain.strip_prefix('.').unwrap_or(&cookie.domain);
    let path = if cookie.path.starts_with('/') {
        cookie.path.as_str()
    } else {
        "/"
    };
    format!("{scheme}://{domain}{path}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use reqwest::cookie::CookieStore;

    fn cookie(domain: &str, path: &str, secure: bool) -> SessionCookie {
        SessionCookie::new("s_session_id", "abc123", domain, path, secure)
    }

    #[test]
    fn test_load_session_cookies_into_jar_host_only() {
        let jar = load_session_cookies_into_jar(&[cookie("lms.example.edu", "/", false)]);

        let url = "http://lms.example.edu/bbcswebdav/file.pdf"
            .parse::<url::Url>()
            .unwrap();
        let header = jar.cookies(&url).expect("cookie for exact host");
        assert!(header.to_str().unwrap().contains("s_session_id=abc123"));

        let sub = "http://cdn.lms.example.edu/".parse::<url::Url>().unwrap();
        assert!(
            jar.cookies(&sub).is_none(),
            "host-only cookie must not reach subdomains"
        );
    }

    #[test]
    fn test_load_session_cookies_into_jar_domain_cookie_matches_subdomain() {
        let jar = load_session_cookies_into_jar(&[cookie(".example.edu", "/", false)]);
        let url = "http://lms.example.edu/page".parse::<url::Url>().unwrap();
        assert!(jar.cookies(&url).is_some());
    }

    #[test]
    fn test_load_session_cookies_into_jar_does_not_leak_to_other_domains() {
        let jar = load_session_cookies_into_jar(&[cookie(".example.edu", "/", false)]);
        let url = "http://unrelated.org/".parse::<url::Url>().unwrap();
        assert!(jar.cookies(&url).is_none());
    }

    #[test]
    fn test_secure_cookie_only_sent_over_https() {
        let jar = load_session_cookies_into_jar(&[cookie("lms.example.edu", "/", true)]);
        let https = "https://lms.example.edu/".parse::<url::Url>().unwrap();
        let http = "http://lms.example.edu/".parse::<url::Url>().unwrap();
        assert!(jar.cookies(&https).is_some());
        assert!(jar.cookies(&http).is_none());
    }

    #[test]
    fn test_build_set_cookie_string_defaults_empty_path() {
        let rendered = build_set_cookie_string(&cookie(".example.edu", "", true));
        assert_eq!(
            rendered,
            "s_session_id=abc123; Domain=.example.edu; Path=/; Secure"
        );
    }
}
