//! Course listing on the portal and section lookup in a course menu.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use scraper::{ElementRef, Html};
use tracing::{debug, instrument};
use url::Url;

use super::CrawlError;
use super::classify::{element_text, parse_selector, resolve_href};
use crate::browser::{BrowserSession, WaitCondition};
use crate::download::naming::sanitize_segment;
use crate::layout::{SiteLayout, WaitSettings};
use crate::model::{Course, Section};
use crate::progress::RunObserver;

/// One term heading and the course container that follows it.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TermBlock {
    term: String,
    container_selector: Option<String>,
    toggle_selector: Option<String>,
    /// `(label, absolute url)` in page order.
    courses: Vec<(String, String)>,
}

/// Lists every course on the post-login portal, grouped under its term.
///
/// Collapsed term containers are expanded by clicking the heading. A
/// failure is reported through `observer` and whatever was collected so far
/// is returned.
#[instrument(skip_all)]
pub async fn scan_courses(
    browser: &mut dyn BrowserSession,
    layout: &SiteLayout,
    waits: &WaitSettings,
    observer: &dyn RunObserver,
) -> Vec<Course> {
    observer.status("Scanning for all available terms and courses...");
    let mut courses = Vec::new();
    if let Err(err) = scan_terms(browser, layout, waits, observer, &mut courses).await {
        observer.status(&format!("Error scanning courses: {err}"));
    }
    courses
}

async fn scan_terms(
    browser: &mut dyn BrowserSession,
    layout: &SiteLayout,
    waits: &WaitSettings,
    observer: &dyn RunObserver,
    courses: &mut Vec<Course>,
) -> Result<(), CrawlError> {
    browser
        .wait_for(
            &WaitCondition::present(layout.term_heading_selector.as_str()),
            waits.scan,
        )
        .await?;
    let page_url = browser.current_url().await?;
    let html = browser.page_source().await?;
    let blocks = parse_term_blocks(&html, &page_url, layout)?;

    for block in blocks {
        if block.term.is_empty() {
            continue;
        }
        observer.status(&format!("Found term: {}", block.term));

        let mut listed = block.courses;
        if let Some(container) = &block.container_selector {
            let visible = WaitCondition::visible(container.as_str());
            let shown = browser.wait_for(&visible, Duration::ZERO).await.is_ok();
            if !shown && let Some(toggle) = &block.toggle_selector {
                debug!(term = %block.term, "expanding collapsed term");
                browser.click(toggle).await?;
                browser.wait_for(&visible, waits.scan).await?;
                let html = browser.page_source().await?;
                listed = parse_term_blocks(&html, &page_url, layout)?
                    .into_iter()
                    .find(|b| b.container_selector.as_deref() == Some(container.as_str()))
                    .map(|b| b.courses)
                    .unwrap_or_default();
            }
        }

        let term = sanitize_segment(&block.term);
        let found: Vec<Course> = listed
            .into_iter()
            .filter(|(label, _)| !label.is_empty())
            .map(|(label, home_url)| Course {
                name: sanitize_segment(&label),
                term: term.clone(),
                home_url,
            })
            .collect();
        observer.status(&format!("  - Found {} courses.", found.len()));
        courses.extend(found);
    }
    Ok(())
}

fn parse_term_blocks(
    html: &str,
    page_url: &str,
    layout: &SiteLayout,
) -> Result<Vec<TermBlock>, CrawlError> {
    let heading_selector = parse_selector(&layout.term_heading_selector)?;
    let course_selector = parse_selector(&layout.course_link_selector)?;
    let anchor_selector = parse_selector("a")?;
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);

    let blocks = document
        .select(&heading_selector)
        .map(|heading| {
            let container = heading
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "div");

            let courses = container
                .map(|container| {
                    container
                        .select(&course_selector)
                        .filter_map(|link| {
                            let href = link.value().attr("href")?;
                            let url = resolve_href(base.as_ref(), href)?;
                            Some((element_text(link), url))
                        })
                        .collect()
                })
                .unwrap_or_default();

            let toggle_selector = heading
                .select(&anchor_selector)
                .next()
                .and_then(|anchor| anchor.value().id().and_then(id_selector))
                .or_else(|| {
                    heading
                        .value()
                        .id()
                        .and_then(id_selector)
                        .map(|sel| format!("{sel} a"))
                });

            TermBlock {
                term: element_text(heading),
                container_selector: container
                    .and_then(|c| c.value().id())
                    .and_then(id_selector),
                toggle_selector,
                courses,
            }
        })
        .collect();
    Ok(blocks)
}

fn id_selector(id: &str) -> Option<String> {
    (!id.is_empty() && !id.contains(['\'', '\\'])).then(|| format!("[id='{id}']"))
}

/// Finds the course's content sections in its navigation menu.
///
/// The browser is moved to the course home page. Menu links whose label
/// matches one of the layout's section names become sections, in menu
/// order; links that do not lead to a content page are skipped with a
/// status line, and repeated entry URLs are dropped.
///
/// # Errors
///
/// Returns [`CrawlError::Landmark`] if the course menu never appears, or
/// [`CrawlError::Browser`] if the home page cannot be loaded.
#[instrument(skip(browser, layout, waits, observer), fields(course = %course.name))]
pub async fn discover_sections(
    browser: &mut dyn BrowserSession,
    course: &Course,
    layout: &SiteLayout,
    waits: &WaitSettings,
    observer: &dyn RunObserver,
) -> Result<Vec<Section>, CrawlError> {
    browser.navigate(&course.home_url).await?;
    browser
        .wait_for(
            &WaitCondition::present(layout.course_menu_selector.as_str()),
            waits.course_home,
        )
        .await
        .map_err(|source| CrawlError::Landmark {
            url: course.home_url.clone(),
            landmark: layout.course_menu_selector.clone(),
            source,
        })?;

    let page_url = browser.current_url().await?;
    let html = browser.page_source().await?;
    let links = parse_menu_links(&html, &page_url, layout)?;

    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    for (label, url) in links {
        let Some(name) = layout
            .section_names
            .iter()
            .find(|name| name.eq_ignore_ascii_case(&label))
        else {
            continue;
        };
        if !url.contains(&layout.content_page_marker) {
            observer.status(&format!(
                "  - Section '{name}' is not a content page; skipped."
            ));
            continue;
        }
        if !seen.insert(url.clone()) {
            debug!(section = %label, "duplicate section url dropped");
            continue;
        }
        sections.push(Section {
            name: label,
            entry_url: url,
        });
    }

    for wanted in &layout.section_names {
        if !sections.iter().any(|s| s.name.eq_ignore_ascii_case(wanted)) {
            debug!(section = %wanted, "section not present in course menu");
        }
    }
    if sections.is_empty() {
        observer.status("  - No content sections found in the course menu.");
    }
    Ok(sections)
}

fn parse_menu_links(
    html: &str,
    page_url: &str,
    layout: &SiteLayout,
) -> Result<Vec<(String, String)>, CrawlError> {
    let link_selector = parse_selector(&layout.section_link_selector)?;
    let base = Url::parse(page_url).ok();
    let document = Html::parse_document(html);
    Ok(document
        .select(&link_selector)
        .filter_map(|link| {
            let url = resolve_href(base.as_ref(), link.value().attr("href")?)?;
            Some((element_text(link), url))
        })
        .collect())
}

/// Groups courses by term, terms in descending order, courses in
/// discovery order.
#[must_use]
pub fn group_by_term(courses: &[Course]) -> Vec<(String, Vec<Course>)> {
    let mut groups: BTreeMap<String, Vec<Course>> = BTreeMap::new();
    for course in courses {
        groups
            .entry(course.term.clone())
            .or_default()
            .push(course.clone());
    }
    groups.into_iter().rev().collect()
}
