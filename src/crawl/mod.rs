//! Discovery: courses on the portal, sections in a course menu, and the
//! recursive content tree behind each section.
//!
//! All discovery runs on the single browser session, one step at a time.

mod classify;
mod crawler;
mod dedupe;
mod discovery;

use thiserror::Error;

use crate::browser::BrowserError;

pub use classify::{LinkTarget, PageEntry, classify_page, classify_url};
pub use crawler::{TreeCrawler, items_from_entries};
pub use dedupe::dedupe;
pub use discovery::{discover_sections, group_by_term, scan_courses};

/// Errors raised while reading a page during discovery.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The browser failed to navigate, wait or hand out the page.
    #[error(transparent)]
    Browser(#[from] BrowserError),

    /// A layout selector is not valid CSS.
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },

    /// A page's navigation landmark never appeared.
    #[error("landmark `{landmark}` did not appear on {url}: {source}")]
    Landmark {
        url: String,
        landmark: String,
        #[source]
        source: BrowserError,
    },
}
