//! Value records produced and consumed within one crawl/materialize run.
//!
//! Nothing here outlives a run: the files written to disk are the only state
//! that persists, and they double as the idempotency ledger.

use std::fmt;
use std::path::{Path, PathBuf};

/// Transport of a discovered leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ItemKind {
    /// Bytes fetched over the authenticated HTTP client.
    File,
    /// External link materialized as an Internet Shortcut file.
    WebLink,
}

impl ItemKind {
    /// Returns the stable label used in status lines.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "File",
            Self::WebLink => "WebLink",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A discovered leaf item.
///
/// `source_url` is the identity key: two items with equal URLs are the same
/// logical resource no matter where they were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentItem {
    /// File or web link.
    pub kind: ItemKind,
    /// Absolute fetch/link target.
    pub source_url: String,
    /// Raw label as discovered (title, link text, or URL basename).
    pub display_name: String,
    /// Sanitized path segments under the course root (empty = course root).
    pub relative_path: Vec<String>,
}

impl ContentItem {
    /// Creates a new content item.
    #[must_use]
    pub fn new(
        kind: ItemKind,
        source_url: impl Into<String>,
        display_name: impl Into<String>,
        relative_path: Vec<String>,
    ) -> Self {
        Self {
            kind,
            source_url: source_url.into(),
            display_name: display_name.into(),
            relative_path,
        }
    }

    /// Joins the relative path and display name for status output.
    #[must_use]
    pub fn display_path(&self) -> String {
        let mut parts: Vec<&str> = self.relative_path.iter().map(String::as_str).collect();
        parts.push(&self.display_name);
        parts.join("/")
    }
}

/// A child folder found on a content page, consumed once by the crawler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    /// Sanitized segment appended to the path of every descendant.
    pub name: String,
    /// Page the browser navigates to in order to list the folder.
    pub target_url: String,
}

/// A named entry point into a course's content tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Menu label as shown on the course home page.
    pub name: String,
    /// Content page listing the section's root entries.
    pub entry_url: String,
}

/// A course listed on the portal page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Course {
    /// Sanitized course name (used as a path segment).
    pub name: String,
    /// Term heading the course was listed under.
    pub term: String,
    /// Course home page.
    pub home_url: String,
}

impl Course {
    /// Returns `{download_root}/{term}/{course_name}`.
    #[must_use]
    pub fn root_dir(&self, download_root: &Path) -> PathBuf {
        course_root(download_root, &self.term, &self.name)
    }
}

/// Builds the on-disk root of a course from already-sanitized segments.
#[must_use]
pub fn course_root(download_root: &Path, term: &str, course_name: &str) -> PathBuf {
    download_root.join(term).join(course_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_path_joins_segments_and_name() {
        let item = ContentItem::new(
            ItemKind::File,
            "https://lms.example.edu/bbcswebdav/a.pdf",
            "slides.pdf",
            vec!["Content".into(), "Week 1".into()],
        );
        assert_eq!(item.display_path(), "Content/Week 1/slides.pdf");
    }

    #[test]
    fn test_display_path_at_root_is_just_name() {
        let item = ContentItem::new(ItemKind::WebLink, "https://x.org", "Docs", Vec::new());
        assert_eq!(item.display_path(), "Docs");
    }

    #[test]
    fn test_course_root_layout() {
        let course = Course {
            name: "CS101".into(),
            term: "Fall 2024".into(),
            home_url: "https://lms.example.edu/course".into(),
        };
        assert_eq!(
            course.root_dir(Path::new("/data")),
            PathBuf::from("/data/Fall 2024/CS101")
        );
    }

    #[test]
    fn test_item_kind_labels() {
        assert_eq!(ItemKind::File.to_string(), "File");
        assert_eq!(ItemKind::WebLink.as_str(), "WebLink");
    }
}
