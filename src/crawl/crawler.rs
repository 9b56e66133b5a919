//! Recursive traversal of a content tree over a single-cursor browser.

use std::collections::HashSet;

use futures_util::future::BoxFuture;
use tracing::{debug, instrument, warn};
use url::Url;

use super::CrawlError;
use super::classify::{LinkTarget, PageEntry, classify_page};
use crate::browser::{BrowserError, BrowserSession, WaitCondition};
use crate::download::naming::{sanitize_segment, split_display_name, url_basename};
use crate::layout::{SiteLayout, WaitSettings};
use crate::model::{ContentItem, FolderRef};
use crate::progress::RunObserver;

/// Walks a section's content pages depth-first and returns its leaf items.
///
/// The browser must already be on the page being crawled. Every folder is
/// entered by navigation and left through history, after which the parent's
/// item list is waited for again before the next sibling.
pub struct TreeCrawler<'a> {
    layout: &'a SiteLayout,
    waits: WaitSettings,
    observer: &'a dyn RunObserver,
}

impl<'a> TreeCrawler<'a> {
    #[must_use]
    pub fn new(layout: &'a SiteLayout, waits: WaitSettings, observer: &'a dyn RunObserver) -> Self {
        Self {
            layout,
            waits,
            observer,
        }
    }

    /// Crawls the current page and everything below it.
    ///
    /// `start_path` is the relative path of the current page itself. Folder
    /// failures are absorbed; only items are returned.
    #[instrument(skip(self, browser), fields(path = %start_path.join("/")))]
    pub async fn crawl(
        &self,
        browser: &mut dyn BrowserSession,
        start_path: &[String],
    ) -> Vec<ContentItem> {
        match self.crawl_page(browser, start_path.to_vec()).await {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "page scan failed");
                self.observer.status(&format!(
                    "  ! Could not scan {}: {err}",
                    start_path.join("/")
                ));
                Vec::new()
            }
        }
    }

    fn crawl_page<'s>(
        &'s self,
        browser: &'s mut dyn BrowserSession,
        path: Vec<String>,
    ) -> BoxFuture<'s, Result<Vec<ContentItem>, CrawlError>> {
        Box::pin(async move {
            let container = WaitCondition::present(self.layout.item_list_selector.as_str());
            match browser.wait_for(&container, self.waits.page).await {
                Ok(()) => {}
                Err(err) if err.is_timeout() => {
                    debug!(path = %path.join("/"), "no item list; page treated as empty");
                    return Ok(Vec::new());
                }
                Err(err) => return Err(err.into()),
            }

            let page_url = browser.current_url().await?;
            let html = browser.page_source().await?;
            let entries = classify_page(&html, &page_url, self.layout)?;
            let (mut items, folders) = items_from_entries(entries, &path, self.layout);
            debug!(
                url = %page_url,
                items = items.len(),
                folders = folders.len(),
                "page classified"
            );

            for (index, folder) in folders.iter().enumerate() {
                let mut child_path = path.clone();
                child_path.push(folder.name.clone());
                self.observer
                    .status(&format!("  > Scanning Folder: {}", child_path.join("/")));

                let outcome = match browser.navigate(&folder.target_url).await {
                    Ok(()) => self.crawl_page(&mut *browser, child_path).await,
                    Err(err) => Err(err.into()),
                };

                let restored = match outcome {
                    Ok(child_items) => {
                        items.extend(child_items);
                        self.return_via_history(&mut *browser, &page_url, &container)
                            .await
                    }
                    Err(err) => {
                        warn!(folder = %folder.name, url = %folder.target_url, error = %err, "folder failed");
                        self.observer
                            .status(&format!("  ! Folder '{}' failed: {err}", folder.name));
                        self.reload(&mut *browser, &page_url, &container).await
                    }
                };

                if let Err(err) = restored {
                    let remaining = folders.len() - index - 1;
                    warn!(url = %page_url, error = %err, remaining, "could not return to parent page");
                    self.observer.status(&format!(
                        "  ! Could not return to {}: {err}; skipping {remaining} remaining folder(s)",
                        path.join("/")
                    ));
                    break;
                }
            }

            Ok(items)
        })
    }

    /// Goes back, settles and re-waits; falls back to a fresh load of the
    /// parent when history does not land on it.
    async fn return_via_history(
        &self,
        browser: &mut dyn BrowserSession,
        page_url: &str,
        container: &WaitCondition,
    ) -> Result<(), BrowserError> {
        let landed = async {
            browser.back().await?;
            if !self.waits.settle.is_zero() {
                tokio::time::sleep(self.waits.settle).await;
            }
            browser.wait_for(container, self.waits.page).await?;
            Ok::<bool, BrowserError>(browser.current_url().await? == page_url)
        }
        .await;

        match landed {
            Ok(true) => Ok(()),
            Ok(false) => {
                debug!(url = %page_url, "history did not land on parent; reloading");
                self.reload(browser, page_url, container).await
            }
            Err(err) => {
                debug!(url = %page_url, error = %err, "back-navigation failed; reloading");
                self.reload(browser, page_url, container).await
            }
        }
    }

    async fn reload(
        &self,
        browser: &mut dyn BrowserSession,
        page_url: &str,
        container: &WaitCondition,
    ) -> Result<(), BrowserError> {
        browser.navigate(page_url).await?;
        browser.wait_for(container, self.waits.page).await
    }
}

/// Turns one page's classified entries into leaf items and child folders.
///
/// Attachment groups nest under a folder named after the entry; general
/// content stays at `path`. Names within one entry never repeat.
#[must_use]
pub fn items_from_entries(
    entries: Vec<PageEntry>,
    path: &[String],
    layout: &SiteLayout,
) -> (Vec<ContentItem>, Vec<FolderRef>) {
    let mut items = Vec::new();
    let mut folders = Vec::new();

    for entry in entries {
        match entry {
            PageEntry::Folder(folder) => folders.push(folder),
            PageEntry::AttachmentGroup { title, links } => {
                let mut group_path = path.to_vec();
                group_path.push(sanitize_segment(&title));
                let mut names = EntryNames::default();
                for link in links {
                    let name = names.claim(&attachment_name(&link, &title, layout), &link.url);
                    items.push(ContentItem::new(link.kind, link.url, name, group_path.clone()));
                }
            }
            PageEntry::GeneralContent { title, links } => {
                let mut names = EntryNames::default();
                for link in links {
                    let name = names.claim(&general_name(&link, &title, layout), &link.url);
                    items.push(ContentItem::new(link.kind, link.url, name, path.to_vec()));
                }
            }
        }
    }

    (items, folders)
}

fn attachment_name(link: &LinkTarget, title: &str, layout: &SiteLayout) -> String {
    if !link.text.is_empty() && !layout.is_generic_label(&link.text) {
        return link.text.clone();
    }
    basename_of(&link.url).unwrap_or_else(|| title.to_string())
}

fn general_name(link: &LinkTarget, title: &str, layout: &SiteLayout) -> String {
    let specific = !link.text.is_empty()
        && !layout.is_generic_label(&link.text)
        && !link.text.eq_ignore_ascii_case(title);
    if specific {
        link.text.clone()
    } else if !title.is_empty() {
        title.to_string()
    } else {
        basename_of(&link.url).unwrap_or_default()
    }
}

fn basename_of(url: &str) -> Option<String> {
    Url::parse(url).ok().as_ref().and_then(url_basename)
}

/// Display names already handed out within one entry (case-insensitive).
#[derive(Default)]
struct EntryNames {
    used: HashSet<String>,
}

impl EntryNames {
    /// Returns `preferred` if free, else the URL basename, else a numbered
    /// variant of `preferred`.
    fn claim(&mut self, preferred: &str, url: &str) -> String {
        if !preferred.is_empty() && self.used.insert(preferred.to_lowercase()) {
            return preferred.to_string();
        }
        let basename = basename_of(url);
        if let Some(basename) = &basename
            && self.used.insert(basename.to_lowercase())
        {
            return basename.clone();
        }

        let seed = if preferred.is_empty() {
            basename.unwrap_or_else(|| "item".to_string())
        } else {
            preferred.to_string()
        };
        let (stem, ext) = split_display_name(&seed);
        let ext = ext.unwrap_or("");
        let mut counter = 2usize;
        loop {
            let candidate = format!("{stem}_{counter}{ext}");
            if self.used.insert(candidate.to_lowercase()) {
                return candidate;
            }
            counter += 1;
        }
    }
}
