//! Classification of content-page entries from an HTML snapshot.
//!
//! Parsing happens on an owned copy of the page source and returns owned
//! values only, so nothing from the parser lives across an `.await`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::CrawlError;
use crate::download::naming::sanitize_segment;
use crate::layout::SiteLayout;
use crate::model::{FolderRef, ItemKind};

/// Every element that can carry a downloadable or linkable target.
const TARGET_SELECTOR: &str = "a[href], img[src], video[src], audio[src], source[src]";

/// A link or media source found inside an entry, already classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTarget {
    pub kind: ItemKind,
    /// Absolute URL.
    pub url: String,
    /// Whitespace-normalized link text (empty for media).
    pub text: String,
}

/// One top-level entry of a content page.
///
/// Variants are mutually exclusive and decided in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEntry {
    /// Heading links to another content page.
    Folder(FolderRef),
    /// Explicit attachments list; items go in a subfolder named after the entry.
    AttachmentGroup { title: String, links: Vec<LinkTarget> },
    /// Anything else; items go directly in the current folder.
    GeneralContent { title: String, links: Vec<LinkTarget> },
}

struct Selectors {
    entry: Selector,
    title: Selector,
    folder_link: Selector,
    attachment_link: Selector,
    target: Selector,
}

impl Selectors {
    fn compile(layout: &SiteLayout) -> Result<Self, CrawlError> {
        Ok(Self {
            entry: parse_selector(&layout.entry_selector)?,
            title: parse_selector(&layout.entry_title_selector)?,
            folder_link: parse_selector(&layout.folder_link_selector)?,
            attachment_link: parse_selector(&layout.attachment_link_selector)?,
            target: parse_selector(TARGET_SELECTOR)?,
        })
    }
}

pub(crate) fn parse_selector(selector: &str) -> Result<Selector, CrawlError> {
    Selector::parse(selector).map_err(|err| CrawlError::Selector {
        selector: selector.to_string(),
        reason: err.to_string(),
    })
}

/// Classifies every top-level entry of the page in document order.
///
/// Relative URLs are resolved against `page_url`.
///
/// # Errors
///
/// Returns [`CrawlError::Selector`] if a layout selector does not parse.
pub fn classify_page(
    html: &str,
    page_url: &str,
    layout: &SiteLayout,
) -> Result<Vec<PageEntry>, CrawlError> {
    let selectors = Selectors::compile(layout)?;
    let base = Url::parse(page_url).ok();
    let site_host = layout.site_host();
    let document = Html::parse_document(html);

    let entries = document
        .select(&selectors.entry)
        .map(|entry| classify_entry(entry, &selectors, base.as_ref(), site_host.as_deref(), layout))
        .collect();
    Ok(entries)
}

fn classify_entry(
    entry: ElementRef<'_>,
    selectors: &Selectors,
    base: Option<&Url>,
    site_host: Option<&str>,
    layout: &SiteLayout,
) -> PageEntry {
    let title = entry
        .select(&selectors.title)
        .next()
        .map(element_text)
        .unwrap_or_default();

    if let Some(link) = entry.select(&selectors.folder_link).next()
        && let Some(target_url) = link
            .value()
            .attr("href")
            .and_then(|href| resolve_href(base, href))
    {
        let name = if title.is_empty() {
            element_text(link)
        } else {
            title
        };
        return PageEntry::Folder(FolderRef {
            name: sanitize_segment(&name),
            target_url,
        });
    }

    let attachments: Vec<ElementRef<'_>> = entry.select(&selectors.attachment_link).collect();
    if !attachments.is_empty() {
        let links = attachments
            .into_iter()
            .filter_map(|el| link_target(el, base, site_host, layout))
            .collect();
        return PageEntry::AttachmentGroup { title, links };
    }

    let links = entry
        .select(&selectors.target)
        .filter_map(|el| link_target(el, base, site_host, layout))
        .collect();
    PageEntry::GeneralContent { title, links }
}

fn link_target(
    element: ElementRef<'_>,
    base: Option<&Url>,
    site_host: Option<&str>,
    layout: &SiteLayout,
) -> Option<LinkTarget> {
    let tag = element.value().name();
    let is_media = matches!(tag, "video" | "audio" | "source");
    let raw = if tag == "a" {
        element.value().attr("href")
    } else {
        element.value().attr("src")
    }?;

    let url = resolve_href(base, raw)?;
    let kind = classify_url(&url, site_host, layout, is_media)?;
    Some(LinkTarget {
        kind,
        url,
        text: element_text(element),
    })
}

/// Decides whether an absolute URL is a file, a web link or neither.
///
/// - file-storage route or a media element's source: [`ItemKind::File`]
/// - other `http(s)` URL on a foreign host: [`ItemKind::WebLink`]
/// - anything else (internal navigation, `mailto:`, ...): `None`
#[must_use]
pub fn classify_url(
    url: &str,
    site_host: Option<&str>,
    layout: &SiteLayout,
    is_media: bool,
) -> Option<ItemKind> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    if parsed.path().contains(&layout.file_storage_marker) || is_media {
        return Some(ItemKind::File);
    }
    let host = parsed.host_str()?.to_ascii_lowercase();
    match site_host {
        Some(site) if host == site => None,
        _ => Some(ItemKind::WebLink),
    }
}

/// Resolves an `href`/`src` value, dropping script and fragment pseudo-links.
pub(crate) fn resolve_href(base: Option<&Url>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() || raw.starts_with('#') {
        return None;
    }
    if raw
        .get(..11)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("javascript:"))
    {
        return None;
    }
    let resolved = match base {
        Some(base) => base.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    Some(resolved.to_string())
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
