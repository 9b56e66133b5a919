//! Run orchestration: authenticate, scan, then crawl and materialize the
//! selected courses one after another.
//!
//! Only launch and authentication failures end a run. A course whose home
//! page never shows its menu is skipped; everything narrower is absorbed by
//! the crawler and the materializer.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::auth::{AuthError, Credentials, authenticate, load_session_cookies_into_jar};
use crate::browser::{BrowserError, BrowserSession};
use crate::crawl::{CrawlError, TreeCrawler, dedupe, discover_sections, scan_courses};
use crate::download::naming::sanitize_segment;
use crate::download::{DownloadError, HttpClient, MaterializeStats, Materializer, MimeTable};
use crate::layout::{SiteLayout, WaitSettings};
use crate::model::{ContentItem, Course};
use crate::progress::RunObserver;

/// Errors that abort the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    /// The browser could not be started.
    #[error("browser could not be started: {0}")]
    Launch(#[source] BrowserError),

    /// Login failed or credentials were missing.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// The download client could not be built.
    #[error(transparent)]
    Client(#[from] DownloadError),
}

/// Errors that abandon one course.
#[derive(Debug, Error)]
pub enum CourseError {
    /// The course home page could not be loaded.
    #[error("could not open course {course}: {source}")]
    Navigation {
        course: String,
        #[source]
        source: CrawlError,
    },

    /// The course menu never appeared on the home page.
    #[error("course {course} did not finish loading: {source}")]
    Landmark {
        course: String,
        #[source]
        source: CrawlError,
    },
}

impl CourseError {
    fn from_discovery(course: &Course, err: CrawlError) -> Self {
        let course = course.name.clone();
        match err {
            CrawlError::Landmark { .. } => Self::Landmark {
                course,
                source: err,
            },
            other => Self::Navigation {
                course,
                source: other,
            },
        }
    }
}

/// Which scanned courses a download run processes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseSelection {
    All,
    /// Case-insensitive exact names, as shown on the portal or as sanitized
    /// for the download tree.
    Named(Vec<String>),
}

impl CourseSelection {
    /// Returns the selected courses in scan order plus requested names that
    /// matched nothing.
    #[must_use]
    pub fn select(&self, courses: &[Course]) -> (Vec<Course>, Vec<String>) {
        match self {
            Self::All => (courses.to_vec(), Vec::new()),
            Self::Named(names) => {
                let selected = courses
                    .iter()
                    .filter(|course| names.iter().any(|n| names_course(n, course)))
                    .cloned()
                    .collect();
                let unmatched = names
                    .iter()
                    .filter(|n| !courses.iter().any(|c| names_course(n, c)))
                    .cloned()
                    .collect();
                (selected, unmatched)
            }
        }
    }
}

/// Scanned course names are already sanitized, so the request is too.
fn names_course(requested: &str, course: &Course) -> bool {
    let requested = requested.trim();
    !requested.is_empty() && sanitize_segment(requested).eq_ignore_ascii_case(&course.name)
}

/// Everything a download run needs besides the browser and the observer.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub credentials: Credentials,
    pub selection: CourseSelection,
    pub download_root: PathBuf,
    pub layout: SiteLayout,
    pub waits: WaitSettings,
    pub mime: MimeTable,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// Outcome of a download run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Courses crawled and materialized.
    pub completed: Vec<String>,
    /// Courses abandoned, with the reason.
    pub failed: Vec<(String, String)>,
    /// Requested course names that matched no scanned course.
    pub unmatched: Vec<String>,
    /// Sum over all completed courses.
    pub stats: MaterializeStats,
}

/// Shared collaborators for processing one course.
pub struct HarvestContext<'a> {
    pub layout: &'a SiteLayout,
    pub waits: WaitSettings,
    pub client: &'a HttpClient,
    pub mime: &'a MimeTable,
    pub observer: &'a dyn RunObserver,
}

/// Crawls every section of `course` and materializes the result under
/// `{download_root}/{term}/{course}`.
///
/// # Errors
///
/// Returns [`CourseError`] when the course home page or its menu does not
/// load; section, folder and item failures are reported and skipped.
#[instrument(skip(browser, ctx), fields(course = %course.name, term = %course.term))]
pub async fn harvest_course(
    browser: &mut dyn BrowserSession,
    course: &Course,
    download_root: &Path,
    ctx: &HarvestContext<'_>,
) -> Result<MaterializeStats, CourseError> {
    ctx.observer
        .status(&format!("--- Processing course: {} ---", course.name));
    ctx.observer.progress(0);

    let sections = discover_sections(browser, course, ctx.layout, &ctx.waits, ctx.observer)
        .await
        .map_err(|err| CourseError::from_discovery(course, err))?;

    ctx.observer
        .status("  [Phase A: Scanning all folders for file links...]");
    let crawler = TreeCrawler::new(ctx.layout, ctx.waits, ctx.observer);
    let mut items: Vec<ContentItem> = Vec::new();
    for section in &sections {
        ctx.observer
            .status(&format!("  > Section: {}", section.name));
        if let Err(err) = browser.navigate(&section.entry_url).await {
            warn!(section = %section.name, error = %err, "section failed to load");
            ctx.observer.status(&format!(
                "  ! Section '{}' could not be opened: {err}",
                section.name
            ));
            continue;
        }
        let start_path = vec![sanitize_segment(&section.name)];
        items.extend(crawler.crawl(browser, &start_path).await);
    }

    let items = dedupe(items);
    let root = course.root_dir(download_root);
    let stats = Materializer::new(ctx.client, ctx.observer)
        .with_mime_table(ctx.mime.clone())
        .materialize(&root, &items)
        .await;
    info!(
        downloaded = stats.downloaded,
        skipped = stats.skipped,
        links = stats.links_written,
        failed = stats.failed,
        "course complete"
    );
    Ok(stats)
}

/// Logs in and returns the courses listed on the portal.
///
/// # Errors
///
/// Returns [`RunError::Auth`] if login fails.
pub async fn run_scan(
    browser: &mut dyn BrowserSession,
    credentials: &Credentials,
    layout: &SiteLayout,
    waits: &WaitSettings,
    observer: &dyn RunObserver,
) -> Result<Vec<Course>, RunError> {
    observer.status("Logging in...");
    authenticate(browser, credentials, layout, waits).await?;
    observer.status("Login successful.");
    Ok(scan_courses(browser, layout, waits, observer).await)
}

/// Full download run: login, scan, course selection, then crawl and
/// materialize each selected course in scan order.
///
/// # Errors
///
/// Returns [`RunError`] only for run-fatal failures (login, HTTP client).
#[instrument(skip_all, fields(root = %request.download_root.display()))]
pub async fn run_download(
    browser: &mut dyn BrowserSession,
    request: &RunRequest,
    observer: &dyn RunObserver,
) -> Result<RunReport, RunError> {
    observer.status("Logging in...");
    let cookies = authenticate(browser, &request.credentials, &request.layout, &request.waits).await?;
    observer.status("Login successful.");

    let jar = load_session_cookies_into_jar(&cookies);
    let client = HttpClient::with_cookie_jar_and_timeouts(
        jar,
        request.connect_timeout,
        request.read_timeout,
    )?;

    let courses = scan_courses(browser, &request.layout, &request.waits, observer).await;
    let (selected, unmatched) = request.selection.select(&courses);
    for name in &unmatched {
        observer.status(&format!("No scanned course matches '{name}'."));
    }

    let mut report = RunReport {
        unmatched,
        ..RunReport::default()
    };
    if selected.is_empty() {
        observer.status("No courses selected; nothing to download.");
        return Ok(report);
    }
    observer.status(&format!(
        "Starting download for {} selected course(s)...",
        selected.len()
    ));

    let ctx = HarvestContext {
        layout: &request.layout,
        waits: request.waits,
        client: &client,
        mime: &request.mime,
        observer,
    };
    for course in &selected {
        match harvest_course(browser, course, &request.download_root, &ctx).await {
            Ok(stats) => {
                report.stats.absorb(&stats);
                report.completed.push(course.name.clone());
            }
            Err(err) => {
                warn!(course = %course.name, error = %err, "course skipped");
                observer.status(&format!("  ! Skipping course: {err}"));
                report.failed.push((course.name.clone(), err.to_string()));
            }
        }
    }

    observer.progress(0);
    observer.status(&format!(
        "Finished: {} course(s) done, {} skipped; {} downloaded, {} up to date, {} links, {} failed items.",
        report.completed.len(),
        report.failed.len(),
        report.stats.downloaded,
        report.stats.skipped,
        report.stats.links_written,
        report.stats.failed
    ));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(name: &str) -> Course {
        Course {
            name: name.into(),
            term: "Term 251".into(),
            home_url: format!("https://lms.example.edu/{name}"),
        }
    }

    #[test]
    fn test_selection_all_keeps_scan_order() {
        let courses = vec![course("B"), course("A")];
        let (selected, unmatched) = CourseSelection::All.select(&courses);
        assert_eq!(selected, courses);
        assert!(unmatched.is_empty());
    }

    #[test]
    fn test_selection_named_is_case_insensitive_exact() {
        let courses = vec![course("MATH101 Calculus"), course("MATH102"), course("PHYS101")];
        let selection = CourseSelection::Named(vec!["math102".into(), " phys101 ".into(), "MATH".into()]);
        let (selected, unmatched) = selection.select(&courses);
        let names: Vec<&str> = selected.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["MATH102", "PHYS101"]);
        assert_eq!(unmatched, vec!["MATH".to_string()]);
    }

    #[test]
    fn test_selection_accepts_portal_label_of_sanitized_course() {
        let courses = vec![course("MATH101_ Calculus I"), course("ICS104_Lab")];
        let selection = CourseSelection::Named(vec![
            "MATH101: Calculus I".into(),
            "ics104/lab".into(),
            "   ".into(),
        ]);
        let (selected, unmatched) = selection.select(&courses);
        assert_eq!(selected, courses);
        assert_eq!(unmatched, vec!["   ".to_string()]);
    }

    #[test]
    fn test_course_error_from_discovery_maps_landmark() {
        let course = course("ICS104");
        let landmark = CrawlError::Landmark {
            url: course.home_url.clone(),
            landmark: "#courseMenuPalette_contents".into(),
            source: BrowserError::Timeout("presence".into()),
        };
        assert!(matches!(
            CourseError::from_discovery(&course, landmark),
            CourseError::Landmark { .. }
        ));
        let nav = CrawlError::Browser(BrowserError::navigation(&course.home_url, "net::ERR"));
        assert!(matches!(
            CourseError::from_discovery(&course, nav),
            CourseError::Navigation { .. }
        ));
    }
}
