//! Course Mirror Core Library
//!
//! Mirrors the content tree of an LMS course into a local directory:
//! files are downloaded, external links become `.url` shortcuts.
//!
//! # Architecture
//!
//! - [`browser`] - single-cursor browser session capability and its Chromium driver
//! - [`auth`] - login sequence and session cookie hand-off
//! - [`crawl`] - course/section discovery, page classification, recursive tree crawl, dedup
//! - [`download`] - name resolution, authenticated HTTP client, materializer
//! - [`harvest`] - run orchestration and failure scoping
//! - [`layout`] - selectors and waits describing the site
//! - [`model`] - value records shared by all of the above
//! - [`progress`] - status/progress sink

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod browser;
pub mod crawl;
pub mod download;
pub mod harvest;
pub mod layout;
pub mod model;
pub mod progress;
#[cfg(test)]
pub mod test_support;

// Re-export commonly used types
pub use auth::{AuthError, Credentials, authenticate, load_session_cookies_into_jar};
pub use browser::{
    BrowserChoice, BrowserError, BrowserSession, ChromiumSession, LaunchOptions, SessionCookie,
    WaitCondition,
};
pub use crawl::{TreeCrawler, dedupe, discover_sections, group_by_term, scan_courses};
pub use download::{DownloadError, HttpClient, MaterializeStats, Materializer, MimeTable};
pub use harvest::{
    CourseError, CourseSelection, HarvestContext, RunError, RunReport, RunRequest,
    harvest_course, run_download, run_scan,
};
pub use layout::{SiteLayout, WaitSettings};
pub use model::{ContentItem, Course, FolderRef, ItemKind, Section};
pub use progress::{RunObserver, TracingObserver};
