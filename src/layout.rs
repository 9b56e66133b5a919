//! Selectors, markers and timeouts describing the LMS page structure.
//!
//! Every structural assumption the authenticator, course scanner and tree
//! crawler make about the site lives here so it can be substituted in tests
//! or pointed at a differently skinned deployment.

use std::time::Duration;

use url::Url;

/// Default LMS deployment.
pub const DEFAULT_BASE_URL: &str = "https://blackboard.kfupm.edu.sa/";

/// CSS selectors and URL markers for one LMS deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteLayout {
    /// Login page (also the portal root after authentication).
    pub base_url: String,

    /// Username text input on the login form.
    pub login_user_selector: String,
    /// Password input on the login form.
    pub login_password_selector: String,
    /// Submit control on the login form.
    pub login_submit_selector: String,
    /// Element that only exists once the user is logged in.
    pub login_landmark_selector: String,

    /// One heading per term on the portal course module.
    pub term_heading_selector: String,
    /// Course links inside a term's course container.
    pub course_link_selector: String,

    /// Course navigation menu; its presence marks a loaded course home page.
    pub course_menu_selector: String,
    /// Links inside the course menu that may lead to a section.
    pub section_link_selector: String,
    /// Menu labels probed as sections, compared case-insensitively.
    pub section_names: Vec<String>,

    /// URL fragment identifying a content (tree) page.
    pub content_page_marker: String,
    /// Container that lists a content page's entries.
    pub item_list_selector: String,
    /// Top-level entries of the item list.
    pub entry_selector: String,
    /// Title heading inside an entry.
    pub entry_title_selector: String,
    /// Link in the entry heading that leads to a child content page.
    pub folder_link_selector: String,
    /// Links in an entry's explicit attachments list.
    pub attachment_link_selector: String,
    /// URL fragment of the internal file-storage route.
    pub file_storage_marker: String,
    /// Link labels that say nothing about the target (compared case-insensitively).
    pub generic_link_labels: Vec<String>,
}

impl Default for SiteLayout {
    fn default() -> Self {
        Self::for_base_url(DEFAULT_BASE_URL)
    }
}

impl SiteLayout {
    /// Builds the Blackboard Learn layout rooted at `base_url`.
    #[must_use]
    pub fn for_base_url(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            login_user_selector: "#user_id".into(),
            login_password_selector: "#password".into(),
            login_submit_selector: "#entry-login".into(),
            login_landmark_selector: "[id='module:_4_1']".into(),
            term_heading_selector: "h3.termHeading-coursefakeclass".into(),
            course_link_selector: "ul.courseListing li a".into(),
            course_menu_selector: "#courseMenuPalette_contents".into(),
            section_link_selector: "#courseMenuPalette_contents a[href]".into(),
            section_names: vec![
                "Course Content".into(),
                "Content".into(),
                "Syllabus".into(),
                "Assignments".into(),
            ],
            content_page_marker: "listContent.jsp".into(),
            item_list_selector: "ul#content_listContainer".into(),
            entry_selector: "ul#content_listContainer > li.liItem".into(),
            entry_title_selector: "div.item > h3".into(),
            folder_link_selector: "div.item > h3 a[href*='listContent.jsp']".into(),
            attachment_link_selector: "ul.attachments a[href]".into(),
            file_storage_marker: "/bbcswebdav/".into(),
            generic_link_labels: vec![
                "view".into(),
                "open".into(),
                "download".into(),
                "click here".into(),
            ],
        }
    }

    /// Host of the LMS itself; links to it are internal.
    #[must_use]
    pub fn site_host(&self) -> Option<String> {
        Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
    }

    /// Returns true if `label` is one of the generic link labels.
    #[must_use]
    pub fn is_generic_label(&self, label: &str) -> bool {
        let label = label.trim();
        self.generic_link_labels
            .iter()
            .any(|generic| generic.eq_ignore_ascii_case(label))
    }
}

/// Bounded waits used during discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitSettings {
    /// Login form and post-login landmark.
    pub login: Duration,
    /// Portal term headings and course containers.
    pub scan: Duration,
    /// Course home navigation landmark.
    pub course_home: Duration,
    /// Item-list container of a content page.
    pub page: Duration,
    /// Pause after back-navigation before re-waiting for the container.
    pub settle: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            login: Duration::from_secs(20),
            scan: Duration::from_secs(20),
            course_home: Duration::from_secs(15),
            page: Duration::from_secs(10),
            settle: Duration::from_secs(1),
        }
    }
}

impl WaitSettings {
    /// Same waits with a different content-page timeout.
    #[must_use]
    pub fn with_page_timeout(mut self, page: Duration) -> Self {
        self.page = page;
        self
    }

    /// Zero settle pause; for tests driving an in-memory browser.
    #[must_use]
    pub fn without_settle(mut self) -> Self {
        self.settle = Duration::ZERO;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_host_is_lowercased() {
        let layout = SiteLayout::for_base_url("https://LMS.Example.edu/");
        assert_eq!(layout.site_host().as_deref(), Some("lms.example.edu"));
    }

    #[test]
    fn test_site_host_none_for_garbage_base_url() {
        let layout = SiteLayout::for_base_url("not a url");
        assert!(layout.site_host().is_none());
    }

    #[test]
    fn test_generic_labels_case_insensitive() {
        let layout = SiteLayout::default();
        assert!(layout.is_generic_label("View"));
        assert!(layout.is_generic_label("  DOWNLOAD "));
        assert!(!layout.is_generic_label("Lecture 3 slides"));
    }

    #[test]
    fn test_without_settle_keeps_other_waits() {
        let waits = WaitSettings::default().without_settle();
        assert_eq!(waits.settle, Duration::ZERO);
        assert_eq!(waits.page, Duration::from_secs(10));
    }
}
