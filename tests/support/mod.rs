//! Shared helpers for integration tests: an in-memory browser over canned
//! pages, a recording observer and HTML fixture builders.

#![allow(dead_code)]

#[path = "../../src/test_support/socket_guard.rs"]
pub mod socket_guard;

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use course_mirror_core::{BrowserError, BrowserSession, RunObserver, SessionCookie, WaitCondition};
use scraper::{ElementRef, Html, Selector};

pub const BASE_URL: &str = "https://lms.example.edu/";
pub const PORTAL_URL: &str = "https://lms.example.edu/webapps/portal/execute/tabs/tabAction";

const BLANK_PAGE: &str = "<html><body></body></html>";

/// What clicking a selector does.
#[derive(Debug, Clone)]
pub enum ClickAction {
    /// Load another page, as a form submit would.
    Navigate(String),
    /// Replace the current document in place, as a script toggle would.
    Replace(String),
}

/// `BrowserSession` over canned HTML keyed by URL.
///
/// Unknown URLs load a blank page. Waits never sleep: a condition that does
/// not hold right now times out immediately.
#[derive(Debug, Default)]
pub struct FakeBrowser {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    clicks: HashMap<String, ClickAction>,
    cookies: Vec<SessionCookie>,
    history: Vec<(String, String)>,
    current: Option<(String, String)>,
    /// Every successful `navigate` target, in order.
    pub visits: Vec<String>,
    /// `(selector, text)` pairs typed into the page.
    pub filled: Vec<(String, String)>,
    pub back_calls: usize,
}

impl FakeBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(url.to_string(), html.into());
        self
    }

    /// Navigation to `url` fails.
    pub fn with_failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    pub fn with_click(mut self, selector: &str, action: ClickAction) -> Self {
        self.clicks.insert(selector.to_string(), action);
        self
    }

    pub fn with_cookies(mut self, cookies: Vec<SessionCookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Starts the session on `url` without recording a visit.
    pub fn opened_at(mut self, url: &str) -> Self {
        let html = self.html_for(url);
        self.current = Some((url.to_string(), html));
        self
    }

    pub fn current_page_url(&self) -> Option<&str> {
        self.current.as_ref().map(|(url, _)| url.as_str())
    }

    fn html_for(&self, url: &str) -> String {
        self.pages
            .get(url)
            .cloned()
            .unwrap_or_else(|| BLANK_PAGE.to_string())
    }

    fn load(&mut self, url: &str) -> Result<(), BrowserError> {
        if self.failing.contains(url) {
            return Err(BrowserError::navigation(url, "net::ERR_CONNECTION_RESET"));
        }
        let html = self.html_for(url);
        if let Some(previous) = self.current.replace((url.to_string(), html)) {
            self.history.push(previous);
        }
        self.visits.push(url.to_string());
        Ok(())
    }

    fn document(&self) -> &str {
        self.current
            .as_ref()
            .map_or(BLANK_PAGE, |(_, html)| html.as_str())
    }
}

fn matches_condition(html: &str, condition: &WaitCondition) -> Result<bool, BrowserError> {
    let selector = Selector::parse(condition.selector())
        .map_err(|err| BrowserError::Unexpected(format!("bad selector: {err}")))?;
    let document = Html::parse_document(html);
    let mut found = document.select(&selector);
    Ok(match condition {
        WaitCondition::Present(_) => found.next().is_some(),
        WaitCondition::Visible(_) => found.any(is_rendered),
    })
}

fn is_rendered(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| {
            el.value().attr("style").is_none_or(|style| {
                !style
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .contains("display:none")
            })
        })
}

fn has_element(html: &str, selector: &str) -> Result<bool, BrowserError> {
    matches_condition(html, &WaitCondition::present(selector))
}

#[async_trait]
impl BrowserSession for FakeBrowser {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.load(url)
    }

    async fn back(&mut self) -> Result<(), BrowserError> {
        self.back_calls += 1;
        let previous = self
            .history
            .pop()
            .ok_or_else(|| BrowserError::navigation("history", "no previous page"))?;
        self.current = Some(previous);
        Ok(())
    }

    async fn wait_for(
        &mut self,
        condition: &WaitCondition,
        _timeout: Duration,
    ) -> Result<(), BrowserError> {
        if matches_condition(self.document(), condition)? {
            Ok(())
        } else {
            Err(BrowserError::Timeout(condition.to_string()))
        }
    }

    async fn current_url(&mut self) -> Result<String, BrowserError> {
        Ok(self
            .current_page_url()
            .unwrap_or("about:blank")
            .to_string())
    }

    async fn page_source(&mut self) -> Result<String, BrowserError> {
        Ok(self.document().to_string())
    }

    async fn fill(&mut self, selector: &str, text: &str) -> Result<(), BrowserError> {
        if !has_element(self.document(), selector)? {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        self.filled.push((selector.to_string(), text.to_string()));
        Ok(())
    }

    async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        if !has_element(self.document(), selector)? {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        match self.clicks.get(selector).cloned() {
            Some(ClickAction::Navigate(url)) => self.load(&url),
            Some(ClickAction::Replace(html)) => {
                if let Some((_, current)) = self.current.as_mut() {
                    *current = html;
                }
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn cookies(&mut self) -> Result<Vec<SessionCookie>, BrowserError> {
        Ok(self.cookies.clone())
    }
}

/// Captures everything the pipeline reports.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    statuses: Mutex<Vec<String>>,
    progress: Mutex<Vec<u8>>,
}

impl RecordingObserver {
    pub fn statuses(&self) -> Vec<String> {
        self.statuses.lock().unwrap().clone()
    }

    pub fn progress_values(&self) -> Vec<u8> {
        self.progress.lock().unwrap().clone()
    }

    pub fn saw(&self, fragment: &str) -> bool {
        self.statuses().iter().any(|line| line.contains(fragment))
    }
}

impl RunObserver for RecordingObserver {
    fn status(&self, message: &str) {
        self.statuses.lock().unwrap().push(message.to_string());
    }

    fn progress(&self, percent: u8) {
        self.progress.lock().unwrap().push(percent);
    }
}

// ---- HTML fixtures shaped like the LMS markup ----

pub fn content_url(id: &str) -> String {
    format!("{BASE_URL}webapps/blackboard/content/listContent.jsp?content_id={id}")
}

pub fn storage_url(path: &str) -> String {
    format!("{BASE_URL}bbcswebdav/pid-1-dt-content-rid-1_1/xid-1_1/{path}")
}

pub fn course_home_url(id: &str) -> String {
    format!("{BASE_URL}webapps/blackboard/execute/courseMain?course_id={id}")
}

pub fn content_page(entries: &[String]) -> String {
    format!(
        r#"<html><body><div id="content"><ul id="content_listContainer" class="contentList">{}</ul></div></body></html>"#,
        entries.concat()
    )
}

pub fn folder_entry(title: &str, target: &str) -> String {
    format!(
        r#"<li class="clearfix liItem read"><div class="item clearfix"><h3><a href="{target}"><span style="color:#000000;">{title}</span></a></h3></div></li>"#
    )
}

/// Entry whose body holds plain links; `links` are `(href, text)`.
pub fn general_entry(title: &str, links: &[(&str, &str)]) -> String {
    let body: String = links
        .iter()
        .map(|(href, text)| format!(r#"<p><a href="{href}">{text}</a></p>"#))
        .collect();
    format!(
        r#"<li class="clearfix liItem read"><div class="item clearfix"><h3><span>{title}</span></h3></div><div class="details"><div class="vtbegenerated">{body}</div></div></li>"#
    )
}

/// Entry with an explicit attachments list; `links` are `(href, text)`.
pub fn attachment_entry(title: &str, links: &[(&str, &str)]) -> String {
    let body: String = links
        .iter()
        .map(|(href, text)| format!(r#"<li><a href="{href}">{text}</a></li>"#))
        .collect();
    format!(
        r#"<li class="clearfix liItem read"><div class="item clearfix"><h3><span>{title}</span></h3></div><div class="details"><ul class="attachments clearfix">{body}</ul></div></li>"#
    )
}

pub fn login_page() -> String {
    r#"<html><body><form id="login-form"><input id="user_id" name="user_id"><input id="password" type="password"><input id="entry-login" type="submit" value="Login"></form></body></html>"#
        .to_string()
}

/// Portal with one term block per `(term, hidden, courses)`; courses are
/// `(label, home url)`.
pub fn portal_page(terms: &[(&str, bool, &[(&str, &str)])]) -> String {
    let blocks: String = terms
        .iter()
        .enumerate()
        .map(|(index, (term, hidden, courses))| {
            let items: String = courses
                .iter()
                .map(|(label, href)| format!(r#"<li><a href="{href}">{label}</a></li>"#))
                .collect();
            let style = if *hidden { r#" style="display: none""# } else { "" };
            format!(
                r##"<h3 class="termHeading-coursefakeclass" id="anonymous_element_{index}"><a id="afor_term_{index}" href="#">{term}</a></h3><div id="term_{index}_courses"{style}><ul class="portletList-img courseListing coursefakeclass">{items}</ul></div>"##
            )
        })
        .collect();
    format!(r#"<html><body><div id="module:_4_1">{blocks}</div></body></html>"#)
}

/// Course home with a menu of `(label, href)` links.
pub fn course_home(menu: &[(&str, &str)]) -> String {
    let items: String = menu
        .iter()
        .map(|(label, href)| format!(r#"<li><a href="{href}"><span title="{label}">{label}</span></a></li>"#))
        .collect();
    format!(
        r#"<html><body><ul id="courseMenuPalette_contents" class="courseMenu">{items}</ul></body></html>"#
    )
}
